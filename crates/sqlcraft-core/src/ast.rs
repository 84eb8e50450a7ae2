//! Expression / Method node model (C3) and its lowering
//! (`handleSequelizeMethod`, §4.4).

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::ModelMeta;
use crate::value::Scalar;

/// The logic side of a `Where` node: either a nested Expression, a plain
/// scalar, or a boolean shorthand.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Logic {
    /// A literal `NULL` comparison target.
    Null,
    /// A boolean shorthand (`booleanValue`).
    Bool(bool),
    /// A nested Expression node.
    Expr(Box<Expr>),
    /// A plain scalar value, escaped normally.
    Scalar(Scalar),
}

/// A tagged Expression/Method node (§3).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// Emitted verbatim, never escaped.
    Literal(String),
    /// `NAME(arg, ...)`.
    Fn(String, Vec<Expr>),
    /// `CAST(expr AS TYPE_UPPER)`.
    Cast(Box<Expr>, String),
    /// An identifier path; `Col::Path(vec!["*"])` passes through as `*`.
    Col(ColRef),
    /// An explicit comparator form: `attribute comparator logic`.
    Where {
        /// The left-hand attribute, itself an Expression.
        attribute: Box<Expr>,
        /// The SQL comparator token (e.g. `"="`, `">="`).
        comparator: String,
        /// The right-hand side.
        logic: Logic,
    },
    /// A passthrough raw fragment.
    Raw(String),
}

/// The argument form accepted by `Col`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColRef {
    /// A single dotted path, or the literal `*`.
    Single(String),
    /// A path sequence — only valid inside ORDER BY / GROUP BY.
    Path(Vec<String>),
}

impl Expr {
    /// Shorthand for `Expr::Literal`.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Shorthand for `Expr::Col(ColRef::Single(..))`.
    #[must_use]
    pub fn col(path: impl Into<String>) -> Self {
        Self::Col(ColRef::Single(path.into()))
    }

    /// Shorthand for `Expr::Fn`.
    #[must_use]
    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Fn(name.into(), args)
    }

    /// Shorthand for `Expr::Cast`.
    #[must_use]
    pub fn cast(expr: Expr, ty: impl Into<String>) -> Self {
        Self::Cast(Box::new(expr), ty.into())
    }
}

/// Context threaded through expression lowering: the target dialect and, if
/// a `Col`/`Where` node needs it, the model the path is relative to.
pub struct LowerCtx<'a> {
    /// Target dialect.
    pub dialect: &'a dyn Dialect,
    /// Model the expression is resolved against, if any.
    pub model: Option<&'a dyn ModelMeta>,
    /// Whether a `Col` node may carry a path sequence (true inside
    /// ORDER BY / GROUP BY, false elsewhere — §7 `col-outside-order-group`).
    pub allow_col_path: bool,
}

/// Lowers an Expression node to a SQL fragment (`handleSequelizeMethod`).
pub fn lower_expr(expr: &Expr, ctx: &LowerCtx<'_>) -> Result<String> {
    match expr {
        Expr::Literal(s) | Expr::Raw(s) => Ok(s.clone()),
        Expr::Fn(name, args) => {
            let mut parts = Vec::with_capacity(args.len());
            for arg in args {
                parts.push(lower_expr(arg, ctx)?);
            }
            Ok(format!("{name}({})", parts.join(", ")))
        }
        Expr::Cast(inner, ty) => {
            let lowered = lower_expr(inner, ctx)?;
            Ok(format!("CAST({lowered} AS {})", ty.to_uppercase()))
        }
        Expr::Col(col_ref) => lower_col(col_ref, ctx),
        Expr::Where {
            attribute,
            comparator,
            logic,
        } => lower_where_node(attribute, comparator, logic, ctx),
    }
}

fn lower_col(col_ref: &ColRef, ctx: &LowerCtx<'_>) -> Result<String> {
    match col_ref {
        ColRef::Single(path) => {
            if path == "*" {
                return Ok("*".to_string());
            }
            crate::reference::quote(
                &crate::reference::RefExpr::Path(path.clone()),
                ctx.model,
                ctx.dialect,
            )
        }
        ColRef::Path(segments) => {
            if !ctx.allow_col_path {
                return Err(Error::ColOutsideOrderGroup);
            }
            let joined = segments.join(".");
            Ok(ctx.dialect.quote_identifiers(&joined))
        }
    }
}

fn lower_where_node(attribute: &Expr, comparator: &str, logic: &Logic, ctx: &LowerCtx<'_>) -> Result<String> {
    let key = lower_expr(attribute, ctx)?;
    match logic {
        Logic::Null => Ok(format!("{key} IS NULL")),
        Logic::Bool(b) => {
            let token = if *b {
                ctx.dialect.bool_true()
            } else {
                ctx.dialect.bool_false()
            };
            Ok(format!("{key} {comparator} {token}"))
        }
        Logic::Expr(inner) => {
            let lowered = lower_expr(inner, ctx)?;
            Ok(format!("{key} {comparator} {lowered}"))
        }
        Logic::Scalar(scalar) => {
            let escaped = ctx.dialect.escape_scalar(scalar);
            Ok(format!("{key} {comparator} {escaped}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Generic;

    #[test]
    fn literal_passes_through_unescaped() {
        let d = Generic::default();
        let ctx = LowerCtx {
            dialect: &d,
            model: None,
            allow_col_path: false,
        };
        assert_eq!(lower_expr(&Expr::literal("NOW()"), &ctx).unwrap(), "NOW()");
    }

    #[test]
    fn func_lowers_each_argument() {
        let d = Generic::default();
        let ctx = LowerCtx {
            dialect: &d,
            model: None,
            allow_col_path: false,
        };
        let e = Expr::func("COALESCE", vec![Expr::col("name"), Expr::literal("'x'")]);
        assert_eq!(lower_expr(&e, &ctx).unwrap(), "COALESCE(\"name\", 'x')");
    }

    #[test]
    fn cast_uppercases_type() {
        let d = Generic::default();
        let ctx = LowerCtx {
            dialect: &d,
            model: None,
            allow_col_path: false,
        };
        let e = Expr::cast(Expr::col("age"), "integer");
        assert_eq!(lower_expr(&e, &ctx).unwrap(), "CAST(\"age\" AS INTEGER)");
    }

    #[test]
    fn col_path_outside_order_group_fails() {
        let d = Generic::default();
        let ctx = LowerCtx {
            dialect: &d,
            model: None,
            allow_col_path: false,
        };
        let e = Expr::Col(ColRef::Path(vec!["a".into(), "b".into()]));
        assert!(matches!(lower_expr(&e, &ctx), Err(Error::ColOutsideOrderGroup)));
    }

    #[test]
    fn where_node_with_null_logic_emits_is_null() {
        let d = Generic::default();
        let ctx = LowerCtx {
            dialect: &d,
            model: None,
            allow_col_path: false,
        };
        let e = Expr::Where {
            attribute: Box::new(Expr::col("deleted_at")),
            comparator: "=".into(),
            logic: Logic::Null,
        };
        assert_eq!(lower_expr(&e, &ctx).unwrap(), "\"deleted_at\" IS NULL");
    }
}
