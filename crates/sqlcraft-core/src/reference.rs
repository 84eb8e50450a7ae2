//! Reference resolver `quote` (C4, §4.2).

use crate::ast::{lower_expr, Expr, LowerCtx};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::{ModelMeta, TableRef};

/// One step of an association walk (`M₀, M₁, …, Mₖ₋₁` in §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocStep {
    /// The target model's name.
    pub model: String,
    /// Explicit `as` override for this step, if any.
    pub as_: Option<String>,
}

/// A full association-walk sequence: `[M₀, …, Mₖ₋₁, last, direction?]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// The association steps to walk, in order.
    pub steps: Vec<AssocStep>,
    /// The final path element — a column reference.
    pub last: Box<RefExpr>,
    /// An optional trailing direction token (`ASC`/`DESC`/…), or an
    /// Expression to lower in its place.
    pub direction: Option<RefExpr>,
}

/// The shapes `quote()` accepts (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum RefExpr {
    /// A plain (possibly dotted) identifier string.
    Str(String),
    /// A `{raw}` passthrough.
    Raw(String),
    /// An Expression node.
    Node(Expr),
    /// An association-walk sequence.
    Sequence(Sequence),
}

/// Resolves an ordered path expression into a fully qualified, aliased SQL
/// reference, as used by ORDER BY, GROUP BY, and `Col` nodes.
pub fn quote(expr: &RefExpr, parent_model: Option<&dyn ModelMeta>, dialect: &dyn Dialect) -> Result<String> {
    match expr {
        RefExpr::Str(s) => Ok(dialect.quote_identifiers(s)),
        RefExpr::Raw(s) => Ok(s.clone()),
        RefExpr::Node(e) => lower_expr(
            e,
            &LowerCtx {
                dialect,
                model: parent_model,
                allow_col_path: true,
            },
        ),
        RefExpr::Sequence(seq) => quote_sequence(seq, parent_model, dialect),
    }
}

fn quote_sequence(seq: &Sequence, parent_model: Option<&dyn ModelMeta>, dialect: &dyn Dialect) -> Result<String> {
    let mut table_names: Vec<String> = Vec::with_capacity(seq.steps.len());

    for (i, step) in seq.steps.iter().enumerate() {
        if i == 0 {
            let model = parent_model.ok_or_else(|| Error::InvalidAssociationPath {
                model: "<none>".to_string(),
                path: step.model.clone(),
            })?;
            let association = model
                .association(&step.model, step.as_.as_deref())
                .ok_or_else(|| Error::InvalidAssociationPath {
                    model: model.name().to_string(),
                    path: table_names.join("."),
                })?;
            let alias = step
                .as_
                .clone()
                .unwrap_or_else(|| association.fields().as_.clone());
            table_names.push(alias);
        } else {
            // Deeper hops cannot be validated without a model registry
            // (out of scope for this crate, see DESIGN.md); the alias is
            // still accumulated so the emitted path is correct.
            let alias = step.as_.clone().unwrap_or_else(|| step.model.clone());
            table_names.push(alias);
        }
    }

    let last = quote(&seq.last, None, dialect)?;
    let mut rendered = if table_names.is_empty() {
        last
    } else {
        format!("{}.{last}", dialect.quote_identifiers(&table_names.join(".")))
    };

    if let Some(direction) = &seq.direction {
        let dir_str = match direction {
            RefExpr::Node(e) => lower_expr(
                e,
                &LowerCtx {
                    dialect,
                    model: parent_model,
                    allow_col_path: false,
                },
            )?,
            RefExpr::Str(s) | RefExpr::Raw(s) => s.clone(),
            RefExpr::Sequence(_) => {
                return Err(Error::InvalidOrderStructure {
                    detail: "direction may not itself be a sequence".to_string(),
                })
            }
        };
        rendered = format!("{rendered} {dir_str}");
    }

    Ok(rendered)
}

/// Quotes a table reference, optionally with an alias (`quoteTable`).
///
/// If `ref_` carries schema information and the dialect supports schemas,
/// emits `"schema"."table"`; otherwise the schema, delimiter and table name
/// are concatenated into a single token before quoting. When `as_derived`
/// is `true`, the alias is derived from `alias.or(Some(table_name))`; any
/// explicit `alias` always appends ` AS "alias"`.
#[must_use]
pub fn quote_table(table: &TableRef, alias: Option<&str>, as_derived: bool, dialect: &dyn Dialect) -> String {
    let base = match table {
        TableRef::Bare(name) => dialect.quote_identifier(name),
        TableRef::Qualified {
            schema,
            table_name,
            delimiter,
        } => {
            if dialect.capabilities().schemas {
                format!(
                    "{}.{}",
                    dialect.quote_identifier(schema),
                    dialect.quote_identifier(table_name)
                )
            } else {
                dialect.quote_identifier(&format!("{schema}{delimiter}{table_name}"))
            }
        }
    };

    if let Some(explicit) = alias {
        return format!("{base} AS {}", dialect.quote_identifier(explicit));
    }
    if as_derived {
        return format!("{base} AS {}", dialect.quote_identifier(table.table_name()));
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Generic;

    #[test]
    fn plain_string_is_quoted_as_identifiers() {
        let d = Generic::default();
        let r = quote(&RefExpr::Str("users.name".into()), None, &d).unwrap();
        assert_eq!(r, "\"users\".\"name\"");
    }

    #[test]
    fn raw_passes_through() {
        let d = Generic::default();
        let r = quote(&RefExpr::Raw("COUNT(*)".into()), None, &d).unwrap();
        assert_eq!(r, "COUNT(*)");
    }

    #[test]
    fn quote_table_appends_alias() {
        let d = Generic::default();
        let t = TableRef::Bare("users".into());
        assert_eq!(quote_table(&t, Some("u"), false, &d), "\"users\" AS \"u\"");
    }

    #[test]
    fn quote_table_without_schema_support_concatenates() {
        let d = Generic::default();
        let t = TableRef::Qualified {
            schema: "public".into(),
            table_name: "users".into(),
            delimiter: ".".into(),
        };
        // Generic dialect capabilities().schemas is false by default.
        assert_eq!(quote_table(&t, None, false, &d), "\"public.users\"");
    }

    #[test]
    fn sequence_without_association_requires_parent_model() {
        let d = Generic::default();
        let seq = Sequence {
            steps: vec![AssocStep {
                model: "Profile".into(),
                as_: None,
            }],
            last: Box::new(RefExpr::Str("bio".into())),
            direction: None,
        };
        let err = quote(&RefExpr::Sequence(seq), None, &d).unwrap_err();
        assert!(matches!(err, Error::InvalidAssociationPath { .. }));
    }
}
