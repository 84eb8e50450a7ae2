//! SELECT planner (C6, §4.5).

use crate::ast::{lower_expr, Expr, LowerCtx};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::{Association, ModelMeta, TableRef};
use crate::reference::{quote, quote_table, AssocStep, RefExpr, Sequence};
use crate::value::Scalar;
use crate::where_clause::{where_items_query, where_query, Condition, Prefix, WhereContext};

/// A single SELECT-list entry.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectAttr {
    /// A bare column/attribute name, passed through `quoteIdentifiers`.
    Name(String),
    /// An Expression node, emitted as-is (no alias).
    Expr(Expr),
    /// An Expression or identifier paired with an explicit alias.
    Aliased(Box<SelectAttr>, String),
}

/// One item of an ORDER BY / GROUP BY list (§4.5 `getQueryOrders`).
#[derive(Debug, Clone, PartialEq)]
pub enum OrderItem {
    /// A plain column name with an optional direction.
    Column(String, Option<String>),
    /// An Expression, lowered directly.
    Expr(Expr),
    /// A path through an association chain to a column, with direction.
    Association {
        /// Association steps to walk.
        steps: Vec<AssocStep>,
        /// Final column name.
        last: String,
        /// Optional direction token.
        direction: Option<String>,
    },
}

const VALID_DIRECTIONS: &[&str] = &[
    "ASC",
    "DESC",
    "ASC NULLS FIRST",
    "DESC NULLS FIRST",
    "ASC NULLS LAST",
    "DESC NULLS LAST",
    "NULLS FIRST",
    "NULLS LAST",
];

/// Row-locking mode (`options.lock`).
#[derive(Debug, Clone, PartialEq)]
pub enum LockMode {
    /// `FOR UPDATE`.
    Update,
    /// `FOR SHARE`.
    Share,
    /// `FOR KEY SHARE`.
    KeyShare,
    /// `FOR NO KEY UPDATE`.
    NoKeyUpdate,
}

impl LockMode {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Update => "FOR UPDATE",
            Self::Share => "FOR SHARE",
            Self::KeyShare => "FOR KEY SHARE",
            Self::NoKeyUpdate => "FOR NO KEY UPDATE",
        }
    }
}

/// Through-table specification for a `BelongsToMany` include.
#[derive(Debug, Clone)]
pub struct ThroughSpec {
    /// Through table reference.
    pub table: TableRef,
    /// Alias for the through table; derived from the association name if
    /// absent.
    pub as_: Option<String>,
    /// Extra WHERE applied to the through table's rows.
    pub where_: Option<Condition>,
}

/// A declarative include (eager load) node (§3).
#[derive(Debug, Clone)]
pub struct Include {
    /// The association this include traverses.
    pub association: Association,
    /// Target table.
    pub table: TableRef,
    /// Alias this include is joined under.
    pub as_: String,
    /// `INNER JOIN` when `true`, `LEFT OUTER JOIN` otherwise.
    pub required: bool,
    /// Whether this include's attributes belong in the subquery SELECT
    /// list rather than the outer one.
    pub sub_query: bool,
    /// Attributes to pull from the included table; `None` = all columns.
    pub attributes: Option<Vec<SelectAttr>>,
    /// Extra join-predicate condition.
    pub where_: Option<Condition>,
    /// Combine `where_` with `OR` instead of `AND`.
    pub or: bool,
    /// Replaces the join predicate entirely when present.
    pub on: Option<Condition>,
    /// Through-table spec for many-to-many associations.
    pub through: Option<ThroughSpec>,
    /// Nested includes.
    pub include: Vec<Include>,
}

/// Grouped-limit UNION spec (§4.5).
#[derive(Debug, Clone)]
pub struct GroupedLimit {
    /// Column the values are matched against.
    pub on: String,
    /// One sub-SELECT is generated per value.
    pub values: Vec<Scalar>,
    /// Limit applied within each sub-SELECT.
    pub limit: i64,
}

/// Top-level SELECT options.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// `SELECT DISTINCT`.
    pub distinct: bool,
    /// Explicit attribute list; `None` means `*`.
    pub attributes: Option<Vec<SelectAttr>>,
    /// WHERE condition.
    pub where_: Option<Condition>,
    /// Eager-load includes.
    pub include: Vec<Include>,
    /// GROUP BY items.
    pub group_by: Vec<OrderItem>,
    /// HAVING condition.
    pub having: Option<Condition>,
    /// ORDER BY items.
    pub order: Vec<OrderItem>,
    /// Row limit.
    pub limit: Option<i64>,
    /// Row offset.
    pub offset: Option<i64>,
    /// Explicit override of the subquery decision; `None` derives it.
    pub subquery: Option<bool>,
    /// Grouped-limit UNION spec.
    pub grouped_limit: Option<GroupedLimit>,
    /// Row-locking mode.
    pub lock: Option<LockMode>,
    /// `FOR UPDATE OF` table list.
    pub lock_of: Vec<String>,
}

fn has_multi_association(includes: &[Include]) -> bool {
    includes.iter().any(|inc| {
        matches!(
            inc.association,
            Association::HasMany(_) | Association::BelongsToMany { .. }
        ) || has_multi_association(&inc.include)
    })
}

fn render_select_attr(attr: &SelectAttr, ctx: &AttrCtx<'_>) -> Result<String> {
    match attr {
        SelectAttr::Name(name) => {
            if name.contains('`') || name.contains('"') {
                Ok(name.clone())
            } else {
                let qualified = if !name.contains('.') && ctx.qualify_with.is_some() {
                    format!("{}.{name}", ctx.qualify_with.unwrap())
                } else {
                    name.clone()
                };
                Ok(ctx.dialect.quote_identifiers(&qualified))
            }
        }
        SelectAttr::Expr(e) => lower_expr(
            e,
            &LowerCtx {
                dialect: ctx.dialect,
                model: ctx.model,
                allow_col_path: false,
            },
        ),
        SelectAttr::Aliased(inner, alias) => {
            let lowered = render_select_attr(inner, ctx)?;
            Ok(format!("{lowered} AS {}", ctx.dialect.quote_identifier(alias)))
        }
    }
}

struct AttrCtx<'a> {
    dialect: &'a dyn Dialect,
    model: Option<&'a dyn ModelMeta>,
    qualify_with: Option<&'a str>,
}

/// Renders a single include attribute as `quoted(as).quoted(attr) AS
/// quoted(as.attrAs)`, where `attrAs` is the raw attribute/alias name (not
/// its rendered SQL). Literal/raw expressions pass through verbatim; a
/// bare `Cast`/`Fn` without an explicit alias has no name to derive
/// `attrAs` from and is rejected (§4.5).
fn render_include_attr(attr: &SelectAttr, as_: &str, ctx: &AttrCtx<'_>) -> Result<String> {
    match attr {
        SelectAttr::Name(name) => Ok(format!(
            "{}.{} AS {}",
            ctx.dialect.quote_identifier(as_),
            ctx.dialect.quote_identifier(name),
            ctx.dialect.quote_identifier(&format!("{as_}.{name}"))
        )),
        SelectAttr::Aliased(inner, alias) => {
            let lowered = render_include_attr_value(inner, as_, ctx)?;
            Ok(format!(
                "{lowered} AS {}",
                ctx.dialect.quote_identifier(&format!("{as_}.{alias}"))
            ))
        }
        SelectAttr::Expr(Expr::Literal(s) | Expr::Raw(s)) => Ok(s.clone()),
        SelectAttr::Expr(e @ (Expr::Cast(..) | Expr::Fn(..))) => {
            let rendered = lower_expr(
                e,
                &LowerCtx {
                    dialect: ctx.dialect,
                    model: ctx.model,
                    allow_col_path: false,
                },
            )?;
            Err(Error::MissingAliasForComputedAttribute { detail: rendered })
        }
        SelectAttr::Expr(e) => lower_expr(
            e,
            &LowerCtx {
                dialect: ctx.dialect,
                model: ctx.model,
                allow_col_path: false,
            },
        ),
    }
}

/// The left-hand side (no trailing `AS ...`) of an include attribute,
/// used when it is wrapped in an explicit [`SelectAttr::Aliased`].
fn render_include_attr_value(attr: &SelectAttr, as_: &str, ctx: &AttrCtx<'_>) -> Result<String> {
    match attr {
        SelectAttr::Name(name) => Ok(format!(
            "{}.{}",
            ctx.dialect.quote_identifier(as_),
            ctx.dialect.quote_identifier(name)
        )),
        SelectAttr::Expr(e) => lower_expr(
            e,
            &LowerCtx {
                dialect: ctx.dialect,
                model: ctx.model,
                allow_col_path: false,
            },
        ),
        SelectAttr::Aliased(inner, _) => render_include_attr_value(inner, as_, ctx),
    }
}

/// Assembles a full SELECT statement, terminated by `;`.
pub fn select_query(
    table: &TableRef,
    opts: &SelectOptions,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
) -> Result<String> {
    tracing::debug!(
        table = table.table_name(),
        dialect = dialect.name(),
        includes = opts.include.len(),
        "planning select query"
    );

    if let Some(grouped) = &opts.grouped_limit {
        return select_grouped_limit(table, opts, grouped, model, dialect);
    }

    let main_table_as = table.table_name().to_string();
    let subquery = opts
        .subquery
        .unwrap_or_else(|| opts.limit.is_some() && has_multi_association(&opts.include));

    let attr_ctx = AttrCtx {
        dialect,
        model,
        qualify_with: if opts.include.is_empty() {
            None
        } else {
            Some(main_table_as.as_str())
        },
    };

    let mut main_attributes: Vec<String> = match &opts.attributes {
        Some(attrs) => {
            let mut rendered = Vec::with_capacity(attrs.len());
            for a in attrs {
                rendered.push(render_select_attr(a, &attr_ctx)?);
            }
            rendered
        }
        None => {
            if opts.include.is_empty() {
                vec!["*".to_string()]
            } else {
                vec![format!("{}.*", dialect.quote_identifier(&main_table_as))]
            }
        }
    };

    if subquery {
        if let Some(m) = model {
            for pk in m.primary_keys() {
                let rendered = dialect.quote_identifiers(pk);
                if !main_attributes.iter().any(|a| a == &rendered) {
                    main_attributes.push(rendered);
                }
            }
        }
    }

    let mut sub_query_attributes: Vec<String> = Vec::new();
    let mut join_strings: Vec<String> = Vec::new();
    let mut synthetic_wheres: Vec<Condition> = Vec::new();
    for include in &opts.include {
        generate_join_queries(
            include,
            &main_table_as,
            table,
            &main_table_as,
            subquery,
            model,
            dialect,
            &mut join_strings,
            &mut main_attributes,
            &mut sub_query_attributes,
            &mut synthetic_wheres,
        )?;
    }

    let where_ctx = WhereContext {
        model,
        dialect,
        prefix: Some(Prefix::Literal(dialect.quote_identifier(&main_table_as))),
    };
    let combined_where = if synthetic_wheres.is_empty() {
        opts.where_.clone()
    } else {
        let mut items = synthetic_wheres;
        if let Some(existing) = &opts.where_ {
            items.insert(0, existing.clone());
        }
        Some(if items.len() == 1 {
            items.remove(0)
        } else {
            let mut m = indexmap::IndexMap::new();
            m.insert("$and".to_string(), Condition::Seq(items));
            Condition::Map(m)
        })
    };
    let where_fragment = match &combined_where {
        Some(cond) => where_query(cond, &where_ctx)?,
        None => String::new(),
    };

    let group_by_fragment = render_order_or_group(&opts.group_by, model, dialect, false)?;
    let having_fragment = match &opts.having {
        Some(cond) => {
            let inner = where_items_query(cond, &where_ctx, " AND ")?;
            if inner.is_empty() {
                String::new()
            } else {
                format!("HAVING {inner}")
            }
        }
        None => String::new(),
    };
    let order_fragment = get_query_orders(&opts.order, model, dialect)?;
    let limit_offset = add_limit_and_offset(opts.limit, opts.offset, dialect);
    let lock_fragment = render_lock(opts, dialect);

    let select_list = if subquery {
        main_attributes.join(", ")
    } else {
        let mut all = main_attributes;
        all.extend(sub_query_attributes);
        all.join(", ")
    };

    let mut stmt = String::new();
    stmt.push_str("SELECT ");
    if opts.distinct {
        stmt.push_str("DISTINCT ");
    }
    stmt.push_str(&select_list);
    stmt.push_str(" FROM ");
    stmt.push_str(&quote_table(table, None, false, dialect));
    if !main_table_as.is_empty() && main_table_as != table.table_name() {
        stmt.push_str(" AS ");
        stmt.push_str(&dialect.quote_identifier(&main_table_as));
    }
    for j in &join_strings {
        stmt.push(' ');
        stmt.push_str(j);
    }
    if !where_fragment.is_empty() {
        stmt.push(' ');
        stmt.push_str(&where_fragment);
    }
    if !group_by_fragment.is_empty() {
        stmt.push_str(" GROUP BY ");
        stmt.push_str(&group_by_fragment);
    }
    if !having_fragment.is_empty() {
        stmt.push(' ');
        stmt.push_str(&having_fragment);
    }
    if !order_fragment.is_empty() {
        stmt.push_str(" ORDER BY ");
        stmt.push_str(&order_fragment);
    }
    if !limit_offset.is_empty() {
        stmt.push(' ');
        stmt.push_str(&limit_offset);
    }
    if !lock_fragment.is_empty() {
        stmt.push(' ');
        stmt.push_str(&lock_fragment);
    }
    stmt.push(';');
    tracing::trace!(sql = %stmt, "select query planned");
    Ok(stmt)
}

#[allow(clippy::too_many_arguments)]
fn generate_join_queries(
    include: &Include,
    parent_as: &str,
    top_table: &TableRef,
    main_table_as: &str,
    subquery: bool,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
    joins: &mut Vec<String>,
    main_attributes: &mut Vec<String>,
    sub_query_attributes: &mut Vec<String>,
    synthetic_wheres: &mut Vec<Condition>,
) -> Result<()> {
    let as_ = if parent_as != top_table.table_name() && parent_as != main_table_as {
        format!("{parent_as}.{}", include.as_)
    } else {
        include.as_.clone()
    };

    let attr_ctx = AttrCtx {
        dialect,
        model,
        qualify_with: None,
    };
    let target_attrs = match &include.attributes {
        Some(attrs) => {
            let mut out = Vec::with_capacity(attrs.len());
            for a in attrs {
                out.push(render_include_attr(a, &as_, &attr_ctx)?);
            }
            out
        }
        None => vec![format!("{}.*", dialect.quote_identifier(&as_))],
    };

    if include.sub_query && subquery {
        sub_query_attributes.extend(target_attrs);
    } else {
        main_attributes.extend(target_attrs);
    }

    if let Some(through) = &include.through {
        joins.push(join_through(include, through, &as_, parent_as, dialect)?);

        if subquery && include.required {
            if let Some(sql) = synthesize_exists_subquery(include, through, &as_, main_table_as, model, dialect)? {
                synthetic_wheres.push(Condition::field(format!("__{as_}"), Condition::Expr(Expr::Raw(sql))));
            }
        }
    } else {
        joins.push(join_simple(include, &as_, parent_as, model, dialect)?);
    }

    for nested in &include.include {
        generate_join_queries(
            nested,
            &as_,
            top_table,
            main_table_as,
            subquery,
            model,
            dialect,
            joins,
            main_attributes,
            sub_query_attributes,
            synthetic_wheres,
        )?;
    }

    Ok(())
}

/// Synthesizes the EXISTS-style correlated subquery a required, subquery-split
/// many-to-many include attaches to `options.where` (§4.5). Returns `None`
/// when there is no model (and therefore no primary key to correlate on).
fn synthesize_exists_subquery(
    include: &Include,
    through: &ThroughSpec,
    as_: &str,
    main_table_as: &str,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
) -> Result<Option<String>> {
    let Some(pk) = model.and_then(|m| m.primary_keys().first()) else {
        return Ok(None);
    };

    let fields = include.association.fields();
    let through_as = through
        .as_
        .clone()
        .unwrap_or_else(|| through.table.table_name().to_string());

    let correlate_pred = format!(
        "{}.{} = {}.{}",
        dialect.quote_identifier(&through_as),
        dialect.quote_identifier(&fields.identifier_field),
        dialect.quote_identifier(main_table_as),
        dialect.quote_identifier(pk),
    );
    let target_field = fields
        .foreign_identifier_field
        .as_deref()
        .unwrap_or(&fields.target_identifier);
    let target_pred = format!(
        "{}.{} = {}.{}",
        dialect.quote_identifier(&through_as),
        dialect.quote_identifier(target_field),
        dialect.quote_identifier(as_),
        dialect.quote_identifier(&fields.target_identifier),
    );

    let through_table_sql = quote_table(&through.table, Some(&through_as), false, dialect);
    let target_table_sql = quote_table(&include.table, Some(as_), false, dialect);

    let mut where_parts = vec![correlate_pred];
    if let Some(cond) = &through.where_ {
        let ctx = WhereContext {
            model,
            dialect,
            prefix: Some(Prefix::Literal(dialect.quote_identifier(&through_as))),
        };
        let extra = where_items_query(cond, &ctx, " AND ")?;
        if !extra.is_empty() {
            where_parts.push(extra);
        }
    }
    if let Some(cond) = &include.where_ {
        let ctx = WhereContext {
            model,
            dialect,
            prefix: Some(Prefix::Literal(dialect.quote_identifier(as_))),
        };
        let extra = where_items_query(cond, &ctx, " AND ")?;
        if !extra.is_empty() {
            where_parts.push(extra);
        }
    }
    let where_sql = where_parts.join(" AND ");

    Ok(Some(format!(
        "(SELECT 1 FROM {through_table_sql} INNER JOIN {target_table_sql} ON {target_pred} WHERE {where_sql} LIMIT 1) IS NOT NULL"
    )))
}

fn join_verb(required: bool) -> &'static str {
    if required {
        "INNER JOIN"
    } else {
        "LEFT OUTER JOIN"
    }
}

fn join_simple(
    include: &Include,
    as_: &str,
    parent_as: &str,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
) -> Result<String> {
    let fields = include.association.fields();
    let (field_left, field_right) = match &include.association {
        Association::BelongsTo(_) => (fields.identifier_field.as_str(), fields.target_identifier.as_str()),
        _ => (fields.target_identifier.as_str(), fields.identifier_field.as_str()),
    };

    let predicate = if let Some(on) = &include.on {
        let ctx = WhereContext {
            model,
            dialect,
            prefix: Some(Prefix::Literal(dialect.quote_identifier(as_))),
        };
        where_items_query(on, &ctx, " AND ")?
    } else {
        format!(
            "{}.{} = {}.{}",
            dialect.quote_identifier(parent_as),
            dialect.quote_identifier(field_left),
            dialect.quote_identifier(as_),
            dialect.quote_identifier(field_right)
        )
    };

    let mut predicate = predicate;
    if let Some(cond) = &include.where_ {
        let ctx = WhereContext {
            model,
            dialect,
            prefix: Some(Prefix::Literal(dialect.quote_identifier(as_))),
        };
        let extra = where_items_query(cond, &ctx, " AND ")?;
        if !extra.is_empty() {
            let joiner = if include.or { " OR " } else { " AND " };
            predicate = format!("{predicate}{joiner}{extra}");
        }
    }

    Ok(format!(
        "{} {} ON {predicate}",
        join_verb(include.required),
        quote_table(&include.table, Some(as_), false, dialect),
    ))
}

fn join_through(include: &Include, through: &ThroughSpec, as_: &str, parent_as: &str, dialect: &dyn Dialect) -> Result<String> {
    let fields = include.association.fields();
    let through_as = through
        .as_
        .clone()
        .unwrap_or_else(|| through.table.table_name().to_string());

    let source_pred = format!(
        "{}.{} = {}.{}",
        dialect.quote_identifier(parent_as),
        dialect.quote_identifier(&fields.identifier_field),
        dialect.quote_identifier(&through_as),
        dialect.quote_identifier(&fields.identifier_field),
    );
    let target_field = fields
        .foreign_identifier_field
        .as_deref()
        .unwrap_or(&fields.target_identifier);
    let target_pred = format!(
        "{}.{} = {}.{}",
        dialect.quote_identifier(&through_as),
        dialect.quote_identifier(target_field),
        dialect.quote_identifier(as_),
        dialect.quote_identifier(&fields.target_identifier),
    );

    let through_table_sql = quote_table(&through.table, Some(&through_as), false, dialect);
    let target_table_sql = quote_table(&include.table, Some(as_), false, dialect);
    let verb = join_verb(include.required);

    if dialect.capabilities().join_table_dependent {
        Ok(format!(
            "{verb} ({through_table_sql} INNER JOIN {target_table_sql} ON {target_pred}) ON {source_pred}"
        ))
    } else {
        Ok(format!(
            "{verb} {through_table_sql} ON {source_pred} {verb} {target_table_sql} ON {target_pred}"
        ))
    }
}

fn render_order_or_group(
    items: &[OrderItem],
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
    _is_order: bool,
) -> Result<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(render_order_item(item, model, dialect)?);
    }
    Ok(parts.join(", "))
}

fn validate_direction(direction: &str) -> Result<()> {
    if VALID_DIRECTIONS.contains(&direction.to_uppercase().as_str()) {
        Ok(())
    } else {
        Err(Error::InvalidOrderDirection {
            direction: direction.to_string(),
        })
    }
}

fn render_order_item(item: &OrderItem, model: Option<&dyn ModelMeta>, dialect: &dyn Dialect) -> Result<String> {
    match item {
        OrderItem::Column(name, direction) => {
            let quoted = dialect.quote_identifiers(name);
            match direction {
                Some(dir) => {
                    validate_direction(dir)?;
                    Ok(format!("{quoted} {}", dir.to_uppercase()))
                }
                None => Ok(quoted),
            }
        }
        OrderItem::Expr(e) => lower_expr(
            e,
            &LowerCtx {
                dialect,
                model,
                allow_col_path: false,
            },
        ),
        OrderItem::Association {
            steps,
            last,
            direction,
        } => {
            if let Some(dir) = direction {
                validate_direction(dir)?;
            }
            let seq = Sequence {
                steps: steps.clone(),
                last: Box::new(RefExpr::Str(last.clone())),
                direction: direction.clone().map(RefExpr::Str),
            };
            quote(&RefExpr::Sequence(seq), model, dialect)
        }
    }
}

/// `getQueryOrders`.
pub fn get_query_orders(order: &[OrderItem], model: Option<&dyn ModelMeta>, dialect: &dyn Dialect) -> Result<String> {
    render_order_or_group(order, model, dialect, true)
}

/// `addLimitAndOffset`.
#[must_use]
pub fn add_limit_and_offset(limit: Option<i64>, offset: Option<i64>, dialect: &dyn Dialect) -> String {
    match (limit, offset) {
        (None, None) => String::new(),
        (Some(l), None) => format!("LIMIT {l}"),
        (Some(l), Some(o)) => {
            if dialect.capabilities().offset_fetch {
                format!("OFFSET {o} ROWS FETCH NEXT {l} ROWS ONLY")
            } else {
                format!("LIMIT {o}, {l}")
            }
        }
        (None, Some(o)) => {
            if dialect.capabilities().offset_fetch {
                format!("OFFSET {o} ROWS")
            } else {
                format!("LIMIT {o}, 10000000000000")
            }
        }
    }
}

fn render_lock(opts: &SelectOptions, dialect: &dyn Dialect) -> String {
    let Some(mode) = &opts.lock else {
        return String::new();
    };
    if !dialect.capabilities().lock {
        return String::new();
    }
    let mut s = mode.as_sql().to_string();
    if !opts.lock_of.is_empty() && dialect.capabilities().lock_of {
        let tables: Vec<String> = opts.lock_of.iter().map(|t| dialect.quote_identifier(t)).collect();
        s.push_str(" OF ");
        s.push_str(&tables.join(", "));
    }
    s
}

fn select_grouped_limit(
    table: &TableRef,
    opts: &SelectOptions,
    grouped: &GroupedLimit,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
) -> Result<String> {
    let main_table_as = table.table_name().to_string();
    let union_kw = if dialect.capabilities().union_all {
        "UNION ALL"
    } else {
        "UNION"
    };

    let mut branches = Vec::with_capacity(grouped.values.len());
    for value in &grouped.values {
        let mut sub_opts = opts.clone();
        sub_opts.grouped_limit = None;
        sub_opts.limit = Some(grouped.limit);
        let extra = Condition::field(grouped.on.clone(), Condition::Scalar(value.clone()));
        sub_opts.where_ = Some(match sub_opts.where_.take() {
            Some(existing) => {
                let mut m = indexmap::IndexMap::new();
                m.insert("$and".to_string(), Condition::Seq(vec![existing, extra]));
                Condition::Map(m)
            }
            None => extra,
        });
        let sub_sql = select_query(table, &sub_opts, model, dialect)?;
        let trimmed = sub_sql.trim_end_matches(';');
        branches.push(format!("({trimmed})"));
    }

    Ok(format!(
        "SELECT * FROM ( {} ) AS {};",
        branches.join(&format!(" {union_kw} ")),
        dialect.quote_identifier(&main_table_as)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Generic;
    use crate::model::{AssociationFields, StaticModel};

    #[test]
    fn simple_select_matches_concrete_scenario() {
        let d = Generic::default();
        let table = TableRef::Bare("users".into());
        let mut opts = SelectOptions::default();
        opts.where_ = Some(Condition::field("id", Condition::scalar(1i64)));
        let sql = select_query(&table, &opts, None, &d).unwrap();
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE \"users\".\"id\" = 1;");
    }

    #[test]
    fn select_statement_has_exactly_one_trailing_semicolon() {
        let d = Generic::default();
        let table = TableRef::Bare("users".into());
        let opts = SelectOptions::default();
        let sql = select_query(&table, &opts, None, &d).unwrap();
        assert_eq!(sql.matches(';').count(), 1);
        assert!(sql.ends_with(';'));
    }

    #[test]
    fn grouped_limit_produces_one_branch_per_value() {
        let d = postgres_for_test();
        let table = TableRef::Bare("posts".into());
        let mut opts = SelectOptions::default();
        opts.grouped_limit = Some(GroupedLimit {
            on: "author_id".into(),
            values: vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)],
            limit: 5,
        });
        let sql = select_query(&table, &opts, None, &d).unwrap();
        assert_eq!(sql.matches("UNION ALL").count(), 2);
        assert_eq!(sql.matches('(').count() - sql.matches(')').count(), 0);
    }

    fn postgres_for_test() -> crate::dialect::Postgres {
        crate::dialect::Postgres::default()
    }

    #[test]
    fn belongs_to_many_joins_through_table() {
        let d = postgres_for_test();
        let table = TableRef::Bare("posts".into());
        let model = StaticModel {
            name: "Post".into(),
            table: TableRef::Bare("posts".into()),
            primary_keys: vec!["id".into()],
            ..Default::default()
        };
        let include = Include {
            association: Association::BelongsToMany {
                fields: AssociationFields {
                    target_model: "Tag".into(),
                    identifier_field: "post_id".into(),
                    foreign_identifier_field: Some("tag_id".into()),
                    target_identifier: "id".into(),
                    as_: "tags".into(),
                    on_delete: None,
                },
                through: "post_tags".into(),
            },
            table: TableRef::Bare("tags".into()),
            as_: "tags".into(),
            required: false,
            sub_query: false,
            attributes: None,
            where_: None,
            or: false,
            on: None,
            through: Some(ThroughSpec {
                table: TableRef::Bare("post_tags".into()),
                as_: None,
                where_: None,
            }),
            include: vec![],
        };
        let mut opts = SelectOptions::default();
        opts.include = vec![include];
        let sql = select_query(&table, &opts, Some(&model), &d).unwrap();
        assert!(sql.contains("post_tags"));
        assert!(sql.contains("LEFT OUTER JOIN"));
    }

    fn tags_include(attributes: Option<Vec<SelectAttr>>, required: bool) -> Include {
        Include {
            association: Association::BelongsToMany {
                fields: AssociationFields {
                    target_model: "Tag".into(),
                    identifier_field: "post_id".into(),
                    foreign_identifier_field: Some("tag_id".into()),
                    target_identifier: "id".into(),
                    as_: "tags".into(),
                    on_delete: None,
                },
                through: "post_tags".into(),
            },
            table: TableRef::Bare("tags".into()),
            as_: "tags".into(),
            required,
            sub_query: false,
            attributes,
            where_: None,
            or: false,
            on: None,
            through: Some(ThroughSpec {
                table: TableRef::Bare("post_tags".into()),
                as_: None,
                where_: None,
            }),
            include: vec![],
        }
    }

    #[test]
    fn include_attribute_alias_uses_raw_name_not_rendered_sql() {
        let d = Generic::default();
        let table = TableRef::Bare("posts".into());
        let mut opts = SelectOptions::default();
        opts.include = vec![tags_include(Some(vec![SelectAttr::Name("title".into())]), false)];
        let sql = select_query(&table, &opts, None, &d).unwrap();
        assert!(
            sql.contains("\"tags\".\"title\" AS \"tags.title\""),
            "unexpected include attribute rendering: {sql}"
        );
    }

    #[test]
    fn include_attribute_explicit_alias_uses_the_alias_not_the_expression() {
        let d = Generic::default();
        let table = TableRef::Bare("posts".into());
        let mut opts = SelectOptions::default();
        let attr = SelectAttr::Aliased(Box::new(SelectAttr::Name("title".into())), "tagTitle".into());
        opts.include = vec![tags_include(Some(vec![attr]), false)];
        let sql = select_query(&table, &opts, None, &d).unwrap();
        assert!(
            sql.contains("\"tags\".\"title\" AS \"tags.tagTitle\""),
            "unexpected aliased include attribute rendering: {sql}"
        );
    }

    #[test]
    fn include_literal_attribute_passes_through_verbatim() {
        let d = Generic::default();
        let table = TableRef::Bare("posts".into());
        let mut opts = SelectOptions::default();
        opts.include = vec![tags_include(Some(vec![SelectAttr::Expr(Expr::Literal("COUNT(*)".into()))]), false)];
        let sql = select_query(&table, &opts, None, &d).unwrap();
        assert!(sql.contains("COUNT(*)"));
        assert!(!sql.contains("COUNT(*) AS"));
    }

    #[test]
    fn include_bare_fn_attribute_without_alias_is_rejected() {
        let d = Generic::default();
        let table = TableRef::Bare("posts".into());
        let mut opts = SelectOptions::default();
        let attr = SelectAttr::Expr(Expr::func("COUNT", vec![Expr::col("*")]));
        opts.include = vec![tags_include(Some(vec![attr]), false)];
        let err = select_query(&table, &opts, None, &d).unwrap_err();
        assert!(matches!(err, Error::MissingAliasForComputedAttribute { .. }));
    }

    #[test]
    fn required_subquery_include_attaches_synthetic_exists_predicate() {
        let d = postgres_for_test();
        let table = TableRef::Bare("posts".into());
        let model = StaticModel {
            name: "Post".into(),
            table: TableRef::Bare("posts".into()),
            primary_keys: vec!["id".into()],
            ..Default::default()
        };
        let mut opts = SelectOptions::default();
        opts.subquery = Some(true);
        opts.include = vec![tags_include(None, true)];
        let sql = select_query(&table, &opts, Some(&model), &d).unwrap();
        assert!(sql.contains("WHERE"));
        assert!(sql.contains("IS NOT NULL"));
        assert!(sql.contains("SELECT 1 FROM"));
    }
}
