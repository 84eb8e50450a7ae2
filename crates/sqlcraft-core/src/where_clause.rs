//! WHERE compiler (C5, §4.3).

use indexmap::IndexMap;

use crate::ast::{lower_expr, Expr, LowerCtx};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::{Attribute, ModelMeta, TableRef};
use crate::value::{EscapeOptions, Scalar};

/// The dynamic condition tree (§3): a mapping, an ordered sequence, a
/// scalar, an Expression node, or null.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    /// A mapping from keys (attribute names, operator tokens, or dotted
    /// JSON paths) to child conditions. Order is preserved and must be
    /// iterated in insertion order (§5).
    Map(IndexMap<String, Condition>),
    /// An ordered sequence of conditions.
    Seq(Vec<Condition>),
    /// A scalar leaf value.
    Scalar(Scalar),
    /// An Expression node.
    Expr(Expr),
    /// No condition at all.
    Null,
}

impl Condition {
    /// Builds a single-key map condition — shorthand for the common case.
    #[must_use]
    pub fn field(key: impl Into<String>, value: Condition) -> Self {
        let mut m = IndexMap::new();
        m.insert(key.into(), value);
        Self::Map(m)
    }

    /// Wraps a scalar value as a leaf condition.
    #[must_use]
    pub fn scalar(value: impl Into<Scalar>) -> Self {
        Self::Scalar(value.into())
    }

    /// Coerces a primary-key scalar into `{pkField: value}`, the thin
    /// wrapper the spec requires run before entering the compiler.
    #[must_use]
    pub fn from_primary_key(pk_field: &str, value: impl Into<Scalar>) -> Self {
        Self::field(pk_field, Self::scalar(value))
    }

    fn is_empty_top(&self) -> bool {
        matches!(self, Self::Null)
            || matches!(self, Self::Seq(v) if v.is_empty())
            || matches!(self, Self::Map(m) if m.is_empty())
    }
}

/// Where a bare table-qualification prefix comes from when emitting a
/// column key (§4.3 item 13).
#[derive(Debug, Clone)]
pub enum Prefix {
    /// Use the context model's own table.
    Model,
    /// An already-lowered literal prefix string (e.g. from an Expression).
    Literal(String),
}

/// Context threaded through the three WHERE entry points.
pub struct WhereContext<'a> {
    /// The model the condition is resolved against, if any.
    pub model: Option<&'a dyn ModelMeta>,
    /// Target dialect.
    pub dialect: &'a dyn Dialect,
    /// Table-qualification prefix for bare column keys.
    pub prefix: Option<Prefix>,
}

impl<'a> WhereContext<'a> {
    /// A context with no model and no prefix, useful for ad hoc fragments.
    #[must_use]
    pub fn bare(dialect: &'a dyn Dialect) -> Self {
        Self {
            model: None,
            dialect,
            prefix: None,
        }
    }
}

/// Canonicalises a legacy operator/key spelling to its `$`-prefixed form.
/// Already-canonical tokens pass through unchanged. Returns `None` for
/// anything not in the closed alias table — callers then treat the key as
/// a plain attribute/column name, per §7's "unrecognised `$…` key is
/// treated as a column key" rule.
#[must_use]
pub fn canonical_operator(key: &str) -> Option<&'static str> {
    Some(match key {
        "$and" | "and" => "$and",
        "$or" | "or" => "$or",
        "$not" | "not" => "$not",
        "$eq" | "eq" => "$eq",
        "$ne" | "ne" => "$ne",
        "$gte" | "gte" => "$gte",
        "$gt" | "gt" => "$gt",
        "$lte" | "lte" => "$lte",
        "$lt" | "lt" => "$lt",
        "$is" | "is" => "$is",
        "$like" | "like" => "$like",
        "$notLike" | "notLike" | "notlike" => "$notLike",
        "$iLike" | "iLike" | "ilike" => "$iLike",
        "$notILike" | "notILike" | "notilike" => "$notILike",
        "$between" | "between" | ".." => "$between",
        "$notBetween" | "notBetween" | "notbetween" => "$notBetween",
        "$in" | "in" => "$in",
        "$notIn" | "notIn" | "notin" => "$notIn",
        "$any" | "any" => "$any",
        "$all" | "all" => "$all",
        "$overlap" | "overlap" => "$overlap",
        "$contains" | "contains" | "@>" => "$contains",
        "$contained" | "contained" | "<@" => "$contained",
        "$adjacent" | "adjacent" => "$adjacent",
        "$strictLeft" | "strictLeft" | "strictleft" => "$strictLeft",
        "$strictRight" | "strictRight" | "strictright" => "$strictRight",
        "$noExtendRight" | "noExtendRight" | "noextendright" => "$noExtendRight",
        "$noExtendLeft" | "noExtendLeft" | "noextendleft" => "$noExtendLeft",
        "$col" | "col" => "$col",
        "$raw" | "raw" => "$raw",
        "$values" | "values" => "$values",
        _ => return None,
    })
}

fn comparator_sql(op: &str) -> Option<&'static str> {
    Some(match op {
        "$eq" => "=",
        "$ne" => "!=",
        "$gte" => ">=",
        "$gt" => ">",
        "$lte" => "<=",
        "$lt" => "<",
        "$is" | "$not" => "IS",
        "$like" => "LIKE",
        "$notLike" => "NOT LIKE",
        "$iLike" => "ILIKE",
        "$notILike" => "NOT ILIKE",
        "$overlap" => "&&",
        "$contains" => "@>",
        "$contained" => "<@",
        "$adjacent" => "-|-",
        "$strictLeft" => "<<",
        "$strictRight" => ">>",
        "$noExtendRight" => "&<",
        "$noExtendLeft" => "&>",
        _ => return None,
    })
}

fn is_like_family(op: &str) -> bool {
    matches!(op, "$like" | "$notLike" | "$iLike" | "$notILike")
}

/// Top-level entry point: `whereQuery`.
pub fn where_query(node: &Condition, ctx: &WhereContext<'_>) -> Result<String> {
    tracing::debug!(dialect = ctx.dialect.name(), "compiling where clause");
    let inner = where_items_query(node, ctx, " AND ")?;
    if inner.is_empty() {
        tracing::trace!("where clause compiled to empty string");
        Ok(String::new())
    } else {
        tracing::trace!(sql = %inner, "where clause compiled");
        Ok(format!("WHERE {inner}"))
    }
}

/// `whereItemsQuery`.
pub fn where_items_query(node: &Condition, ctx: &WhereContext<'_>, binding: &str) -> Result<String> {
    if node.is_empty_top() {
        return Ok(String::new());
    }
    match node {
        Condition::Scalar(_) => Err(Error::RawWhereRemoved),
        Condition::Expr(e) => lower_expr(
            e,
            &LowerCtx {
                dialect: ctx.dialect,
                model: ctx.model,
                allow_col_path: false,
            },
        ),
        Condition::Seq(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                let lowered = where_items_query(item, ctx, " AND ")?;
                if lowered.is_empty() {
                    continue;
                }
                parts.push(lowered);
            }
            Ok(parts.join(binding))
        }
        Condition::Map(m) => {
            let mut parts = Vec::with_capacity(m.len());
            for (k, v) in m {
                let lowered = where_item_query(Some(k), v, ctx)?;
                if lowered.is_empty() {
                    continue;
                }
                parts.push(lowered);
            }
            Ok(parts.join(binding))
        }
        Condition::Null => Ok(String::new()),
    }
}

fn resolve_attribute<'a>(ctx: &WhereContext<'a>, key: &str) -> Option<&'a Attribute> {
    ctx.model
        .and_then(|m| m.attribute(key).or_else(|| m.field_attribute(key)))
}

fn emit_key(key: &str, ctx: &WhereContext<'_>) -> String {
    if let Some(col_string) = key.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return fold_dotted_identifier(col_string, ctx.dialect);
    }
    let quoted = ctx.dialect.quote_identifiers(key);
    match &ctx.prefix {
        None => quoted,
        Some(Prefix::Literal(prefix)) => format!("{prefix}.{quoted}"),
        Some(Prefix::Model) => {
            if let Some(model) = ctx.model {
                format!(
                    "{}.{quoted}",
                    crate::reference::quote_table(model.table(), None, false, ctx.dialect)
                )
            } else {
                quoted
            }
        }
    }
}

/// `$col` / Literal-delimited column keys: fold everything but the last
/// dotted segment into a single identifier, per §4.3 items 12/13.
fn fold_dotted_identifier(path: &str, dialect: &dyn Dialect) -> String {
    dialect.quote_identifiers(path)
}

/// Lowers a leaf condition value into its SQL literal/fragment form,
/// without any operator wrapping.
fn escape_value(value: &Condition, ctx: &WhereContext<'_>) -> Result<String> {
    match value {
        Condition::Scalar(s) => Ok(ctx.dialect.escape_scalar(s)),
        Condition::Expr(e) => lower_expr(
            e,
            &LowerCtx {
                dialect: ctx.dialect,
                model: ctx.model,
                allow_col_path: false,
            },
        ),
        Condition::Null => Ok("NULL".to_string()),
        Condition::Seq(items) => {
            let mut scalars = Vec::with_capacity(items.len());
            for item in items {
                scalars.push(escape_value(item, ctx)?);
            }
            Ok(format!("({})", scalars.join(", ")))
        }
        Condition::Map(_) => Err(Error::InvalidOrderStructure {
            detail: "a mapping is not a valid scalar value".to_string(),
        }),
    }
}

fn is_null_scalar(value: &Condition) -> bool {
    matches!(value, Condition::Null) || matches!(value, Condition::Scalar(Scalar::Null))
}

/// Every element of `items` is itself a mapping (`canTreatArrayAsAnd`).
fn can_treat_array_as_and(items: &[Condition]) -> bool {
    !items.is_empty() && items.iter().all(|item| matches!(item, Condition::Map(_)))
}

/// `whereItemQuery(key, value, opts)`.
pub fn where_item_query(key: Option<&str>, value: &Condition, ctx: &WhereContext<'_>) -> Result<String> {
    // Rule 6: key absent, value is a sequence.
    if key.is_none() {
        if let Condition::Seq(items) = value {
            if can_treat_array_as_and(items) {
                let mut m = IndexMap::new();
                m.insert("$and".to_string(), Condition::Seq(items.clone()));
                return where_item_query(None, &Condition::Map(m), ctx);
            }
            // Raw fragment form `[sql, ...bindings]` — first element is the
            // fragment, the rest are already-escaped inline.
            if let Some(Condition::Scalar(Scalar::Text(sql))) = items.first() {
                return Ok(sql.clone());
            }
        }
        if let Condition::Expr(_) = value {
            return lower_expr(
                match value {
                    Condition::Expr(e) => e,
                    _ => unreachable!(),
                },
                &LowerCtx {
                    dialect: ctx.dialect,
                    model: ctx.model,
                    allow_col_path: false,
                },
            );
        }
    }

    let Some(raw_key) = key else {
        return escape_value(value, ctx);
    };

    // Rule 3: canonicalise the key itself if it names an operator.
    let canonical_key = canonical_operator(raw_key);

    // A raw/literal Expression value bypasses `key = value` wrapping
    // entirely and is emitted verbatim; the key exists only to keep the
    // enclosing map's keys unique (e.g. the synthetic `__<as>` predicate
    // the SELECT planner attaches for a subquery-split required include).
    if canonical_key.is_none() {
        if let Condition::Expr(Expr::Raw(s) | Expr::Literal(s)) = value {
            return Ok(s.clone());
        }
    }

    // Rule 7: logical combinators.
    if let Some(op @ ("$and" | "$or" | "$not")) = canonical_key {
        return logical_combinator(op, value, ctx);
    }

    let attribute = resolve_attribute(ctx, raw_key);

    // Rule 2: JSON path rewrite when the key itself is dotted.
    if canonical_key.is_none() {
        if let Some((head, tail)) = raw_key.split_once('.') {
            if resolve_attribute(ctx, head).is_some_and(Attribute::is_json) {
                let nested = Condition::field(tail, value.clone());
                return where_item_json(head, &[], &nested, ctx);
            }
        }
    }

    // Attribute is JSON-typed and the value is a nested mapping: descend.
    if canonical_key.is_none() {
        if let Some(attr) = attribute {
            if attr.is_json() {
                if let Condition::Map(m) = value {
                    if m.keys().next().is_some_and(|k| canonical_operator(k).is_none()) {
                        return where_item_json(raw_key, &[], value, ctx);
                    }
                }
            }
        }
    }

    // Rule 8/10/11: value is a mapping of (possibly multiple) operators.
    if let Condition::Map(m) = value {
        if !m.is_empty() {
            let is_array_attr = attribute.is_some_and(Attribute::is_array);
            let mut conjuncts = Vec::with_capacity(m.len());
            for (inner_key, inner_value) in m {
                let canon = canonical_operator(inner_key).unwrap_or(inner_key.as_str());
                conjuncts.push(emit_operator(raw_key, canon, inner_value, is_array_attr, ctx)?);
            }
            conjuncts.retain(|c| !c.is_empty());
            return Ok(match conjuncts.len() {
                0 => String::new(),
                1 => conjuncts.remove(0),
                _ => format!("({})", conjuncts.join(" AND ")),
            });
        }
    }

    // Rule 11: bare sequence value that isn't an ARRAY-typed column -> $in.
    if let Condition::Seq(_) = value {
        let is_array_attr = attribute.is_some_and(Attribute::is_array);
        if !is_array_attr {
            return emit_operator(raw_key, "$in", value, false, ctx);
        }
    }

    // Plain equality (possibly promoted to IS NULL).
    emit_operator(raw_key, "$eq", value, false, ctx)
}

fn logical_combinator(op: &str, value: &Condition, ctx: &WhereContext<'_>) -> Result<String> {
    let binding = if op == "$or" { " OR " } else { " AND " };

    let items: Vec<Condition> = match value {
        Condition::Seq(items) => items.clone(),
        Condition::Map(m) => m
            .iter()
            .map(|(k, v)| Condition::field(k.clone(), v.clone()))
            .collect(),
        Condition::Null => Vec::new(),
        other => vec![other.clone()],
    };

    if items.is_empty() {
        // Empty $or / $not -> vacuously false; $not of nothing negates
        // "everything", which the spec also pins to `0 = 1`.
        if op == "$and" {
            return Ok(String::new());
        }
        return Ok("0 = 1".to_string());
    }

    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        let lowered = where_items_query(item, ctx, " AND ")?;
        if lowered.is_empty() {
            continue;
        }
        let composite = matches!(item, Condition::Map(m) if m.len() > 1) || matches!(item, Condition::Seq(_));
        if composite {
            parts.push(format!("({lowered})"));
        } else {
            parts.push(lowered);
        }
    }

    let joined = parts.join(binding);
    let wrapped = if parts.len() > 1 {
        format!("({joined})")
    } else {
        joined
    };

    if op == "$not" {
        Ok(format!("NOT {wrapped}"))
    } else {
        Ok(wrapped)
    }
}

fn emit_operator(
    raw_key: &str,
    op: &str,
    value: &Condition,
    is_list: bool,
    ctx: &WhereContext<'_>,
) -> Result<String> {
    let key_sql = emit_key(raw_key, ctx);

    match op {
        "$in" | "$notIn" => {
            let items = match value {
                Condition::Seq(items) => items.clone(),
                Condition::Expr(Expr::Literal(lit)) => {
                    return Ok(format!(
                        "{key_sql} {} ({lit})",
                        if op == "$in" { "IN" } else { "NOT IN" }
                    ))
                }
                other => vec![other.clone()],
            };
            if items.is_empty() {
                return if op == "$in" {
                    Ok(format!("{key_sql} IN (NULL)"))
                } else {
                    Ok(String::new())
                };
            }
            let mut escaped = Vec::with_capacity(items.len());
            for item in &items {
                escaped.push(escape_value(item, ctx)?);
            }
            let verb = if op == "$in" { "IN" } else { "NOT IN" };
            Ok(format!("{key_sql} {verb} ({})", escaped.join(", ")))
        }
        "$between" | "$notBetween" => {
            let Condition::Seq(items) = value else {
                return Err(Error::InvalidOrderStructure {
                    detail: format!("{op} requires exactly two bounds"),
                });
            };
            if items.len() != 2 {
                return Err(Error::InvalidOrderStructure {
                    detail: format!("{op} requires exactly two bounds"),
                });
            }
            let low = escape_value(&items[0], ctx)?;
            let high = escape_value(&items[1], ctx)?;
            let verb = if op == "$between" { "BETWEEN" } else { "NOT BETWEEN" };
            Ok(format!("{key_sql} {verb} {low} AND {high}"))
        }
        "$raw" => {
            if let Condition::Scalar(Scalar::Text(s)) = value {
                Ok(s.clone())
            } else {
                escape_value(value, ctx)
            }
        }
        "$col" => {
            let Condition::Scalar(Scalar::Text(path)) = value else {
                return Err(Error::InvalidOrderStructure {
                    detail: "$col requires a string path".to_string(),
                });
            };
            let folded = fold_dotted_identifier(path, ctx.dialect);
            Ok(format!("{key_sql} = {folded}"))
        }
        "$any" | "$all" => {
            let verb = if op == "$any" { "ANY" } else { "ALL" };
            if let Condition::Map(m) = value {
                if let Some(values_cond) = m.get("$values") {
                    let rows = match values_cond {
                        Condition::Seq(items) => items
                            .iter()
                            .map(|i| escape_value(i, ctx))
                            .collect::<Result<Vec<_>>>()?,
                        other => vec![escape_value(other, ctx)?],
                    };
                    let values_list = rows
                        .iter()
                        .map(|v| format!("({v})"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Ok(format!("{key_sql} = {verb} (VALUES {values_list})"));
                }
            }
            let escaped = escape_value(value, ctx)?;
            Ok(format!("{key_sql} = {verb} ({escaped})"))
        }
        _ => {
            if is_null_scalar(value) {
                let (is_null, negated) = match op {
                    "$eq" | "$is" => (true, false),
                    "$ne" | "$not" => (true, true),
                    _ => (false, false),
                };
                if is_null {
                    return Ok(format!(
                        "{key_sql} IS {}NULL",
                        if negated { "NOT " } else { "" }
                    ));
                }
            }

            let mut comparator = comparator_sql(op).unwrap_or("=").to_string();
            let mut value_sql = if let Condition::Scalar(s) = value {
                crate::value::escape(
                    s,
                    raw_key,
                    resolve_attribute(ctx, raw_key),
                    &EscapeOptions::default(),
                    ctx.dialect.bool_true(),
                    ctx.dialect.bool_false(),
                )?
            } else {
                escape_value(value, ctx)?
            };

            if is_like_family(op) {
                if is_list {
                    value_sql = format!("({value_sql})");
                }
            }
            if is_list {
                comparator.push_str(" ANY");
            }

            Ok(format!("{key_sql} {comparator} {value_sql}"))
        }
    }
}

/// Simplified JSON path lowering (§4.3 item 9): descends a nested mapping
/// on a JSON-typed attribute, emitting `(col #>> '{p1,p2}')[::CAST] op val`
/// at each leaf. `path` accumulates the traversed segments.
fn where_item_json(field: &str, path: &[String], value: &Condition, ctx: &WhereContext<'_>) -> Result<String> {
    if let Condition::Map(m) = value {
        if m.keys().next().is_some_and(|k| canonical_operator(k).is_none()) {
            let mut parts = Vec::with_capacity(m.len());
            for (seg, child) in m {
                let mut next_path = path.to_vec();
                next_path.push(seg.clone());
                parts.push(where_item_json(field, &next_path, child, ctx)?);
            }
            return Ok(if parts.len() == 1 {
                parts.remove(0)
            } else {
                format!("({})", parts.join(" AND "))
            });
        }
    }

    let col_sql = emit_key(field, ctx);
    let mut path = path.to_vec();
    let mut explicit_cast = None;
    if let Some(last) = path.last_mut() {
        if let Some((seg, cast)) = last.split_once("::") {
            explicit_cast = Some(cast.to_uppercase());
            *last = seg.to_string();
        }
    }
    let accessor = if path.is_empty() {
        col_sql
    } else {
        format!("({col_sql} #>> '{{{}}}')", path.join(","))
    };

    // value is either an operator map ({$gte: 5}) or a plain scalar.
    let (op, leaf) = match value {
        Condition::Map(m) if m.len() == 1 => {
            let (k, v) = m.iter().next().unwrap();
            (canonical_operator(k).unwrap_or("$eq"), v.clone())
        }
        other => ("$eq", other.clone()),
    };

    let cast = explicit_cast.unwrap_or_else(|| infer_json_cast(&leaf));
    let comparator = comparator_sql(op).unwrap_or("=");
    let value_sql = escape_value(&leaf, ctx)?;
    Ok(format!("{accessor}::{cast} {comparator} {value_sql}"))
}

fn infer_json_cast(value: &Condition) -> String {
    match value {
        Condition::Scalar(Scalar::Int(_) | Scalar::Float(_)) => "double precision".to_string(),
        Condition::Scalar(Scalar::Bool(_)) => "boolean".to_string(),
        Condition::Scalar(Scalar::DateTime(_)) => "timestamptz".to_string(),
        _ => "text".to_string(),
    }
}

#[allow(dead_code)]
fn table_ref_unused(_t: &TableRef) {}
