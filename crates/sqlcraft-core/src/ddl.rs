//! DDL builders (C8, §4.7 `addIndex` plus the SPEC_FULL.md §9 supplement:
//! create/drop/rename table, add/drop/rename column).

use crate::ast::{lower_expr, Expr, LowerCtx};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::{ForeignKeyAction, ModelMeta, TableRef};
use crate::reference::quote_table;
use crate::value::Scalar;
use crate::where_clause::{where_query, Condition, WhereContext};

/// A column definition for `create_table`/`add_column`.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Column/field name.
    pub name: String,
    /// Already-resolved SQL type (type definitions themselves are out of
    /// scope for this crate — see spec.md §1).
    pub sql_type: String,
    /// Whether `NULL` is allowed.
    pub nullable: bool,
    /// Whether this column is (part of) the primary key.
    pub primary_key: bool,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Whether a `UNIQUE` constraint applies.
    pub unique: bool,
    /// A literal `DEFAULT` value, if any.
    pub default: Option<Scalar>,
    /// Foreign-key reference, if any: `(table, column, on_delete)`.
    pub references: Option<(TableRef, String, Option<ForeignKeyAction>)>,
}

fn render_column(col: &ColumnSpec, dialect: &dyn Dialect) -> String {
    let mut sql = format!("{} {}", dialect.quote_identifier(&col.name), col.sql_type);
    if col.primary_key {
        sql.push_str(" PRIMARY KEY");
    } else if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if col.unique && !col.primary_key {
        sql.push_str(" UNIQUE");
    }
    if let Some(default) = &col.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&dialect.escape_scalar(default));
    }
    if let Some((ref_table, ref_col, on_delete)) = &col.references {
        sql.push_str(" REFERENCES ");
        sql.push_str(&quote_table(ref_table, None, false, dialect));
        sql.push_str(" (");
        sql.push_str(&dialect.quote_identifier(ref_col));
        sql.push(')');
        if let Some(action) = on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
    }
    sql
}

/// `CREATE TABLE t (...);`.
#[must_use]
pub fn create_table_query(table: &TableRef, columns: &[ColumnSpec], dialect: &dyn Dialect) -> String {
    let cols_sql: Vec<String> = columns.iter().map(|c| render_column(c, dialect)).collect();
    format!(
        "CREATE TABLE {} ({});",
        quote_table(table, None, false, dialect),
        cols_sql.join(", ")
    )
}

/// `DROP TABLE [IF EXISTS] t;`.
#[must_use]
pub fn drop_table_query(table: &TableRef, if_exists: bool, dialect: &dyn Dialect) -> String {
    let if_exists_kw = if if_exists { "IF EXISTS " } else { "" };
    format!("DROP TABLE {if_exists_kw}{};", quote_table(table, None, false, dialect))
}

/// `ALTER TABLE old RENAME TO new;`.
#[must_use]
pub fn rename_table_query(from: &TableRef, to: &TableRef, dialect: &dyn Dialect) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {};",
        quote_table(from, None, false, dialect),
        quote_table(to, None, false, dialect)
    )
}

/// `ALTER TABLE t ADD COLUMN col ...;`.
#[must_use]
pub fn add_column_query(table: &TableRef, column: &ColumnSpec, dialect: &dyn Dialect) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {};",
        quote_table(table, None, false, dialect),
        render_column(column, dialect)
    )
}

/// `ALTER TABLE t DROP COLUMN col;`.
#[must_use]
pub fn drop_column_query(table: &TableRef, column_name: &str, dialect: &dyn Dialect) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {};",
        quote_table(table, None, false, dialect),
        dialect.quote_identifier(column_name)
    )
}

/// `ALTER TABLE t RENAME COLUMN old TO new;`.
#[must_use]
pub fn rename_column_query(table: &TableRef, from: &str, to: &str, dialect: &dyn Dialect) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {};",
        quote_table(table, None, false, dialect),
        dialect.quote_identifier(from),
        dialect.quote_identifier(to)
    )
}

/// One entry of an `addIndex` field list.
#[derive(Debug, Clone)]
pub enum IndexField {
    /// A bare column name.
    Name(String),
    /// An Expression, lowered directly.
    Expr(Expr),
    /// A field with `COLLATE`/length/direction modifiers.
    Detailed {
        /// Column name.
        name: String,
        /// `COLLATE` clause, gated by `index.collate`.
        collate: Option<String>,
        /// `(length)` prefix, gated by `index.length`.
        length: Option<u32>,
        /// Trailing direction (`ASC`/`DESC`), unconditional.
        direction: Option<String>,
    },
}

/// Options accepted by `addIndex`, after legacy-alias normalisation
/// (`indexName`→`name`, `indicesType`→`type`, `indexType|method`→`using`
/// happen upstream of this struct, per spec.md §4.7).
#[derive(Debug, Clone, Default)]
pub struct AddIndexOptions {
    /// Explicit index name; derived via [`name_index`] when absent.
    pub name: Option<String>,
    /// `UNIQUE INDEX`.
    pub unique: bool,
    /// Index method/type name (e.g. `FULLTEXT`, `SPATIAL`), gated by
    /// `index.type`.
    pub r#type: Option<String>,
    /// `USING` method (e.g. `btree`, `hash`), gated by `index.using`.
    pub using: Option<String>,
    /// `WITH PARSER p`, gated by `index.parser`.
    pub parser: Option<String>,
    /// `CONCURRENTLY`, gated by `index.concurrently`.
    pub concurrently: bool,
    /// Partial-index predicate, gated by `index.where`.
    pub where_: Option<Condition>,
}

/// Derives an index name from a table prefix and its fields, snake-casing
/// `prefix_attr1_attr2_…` (§4.7 `nameIndexes`).
#[must_use]
pub fn name_index(prefix: &str, field_names: &[String]) -> String {
    let cleaned_prefix = prefix.replace(['.', '"', '`', '[', ']'], "");
    let mut parts = vec![cleaned_prefix];
    parts.extend(field_names.iter().cloned());
    parts.join("_").to_lowercase()
}

fn render_index_field(field: &IndexField, position: usize, dialect: &dyn Dialect, model: Option<&dyn ModelMeta>) -> Result<(String, String)> {
    let caps = dialect.capabilities().index;
    match field {
        IndexField::Name(name) => Ok((dialect.quote_identifier(name), name.clone())),
        IndexField::Expr(expr) => {
            let ctx = LowerCtx {
                dialect,
                model,
                allow_col_path: false,
            };
            let lowered = lower_expr(expr, &ctx)?;
            Ok((lowered.clone(), lowered))
        }
        IndexField::Detailed {
            name,
            collate,
            length,
            direction,
        } => {
            if name.is_empty() {
                return Err(Error::MissingIndexFieldName { position });
            }
            let mut sql = dialect.quote_identifier(name);
            if caps.length {
                if let Some(len) = length {
                    sql.push_str(&format!(" ({len})"));
                }
            }
            if caps.collate {
                if let Some(collation) = collate {
                    sql.push_str(&format!(" COLLATE {}", dialect.quote_identifier(collation)));
                }
            }
            if let Some(dir) = direction {
                sql.push(' ');
                sql.push_str(&dir.to_uppercase());
            }
            Ok((sql, name.clone()))
        }
    }
}

/// Assembles an `addIndex` statement, either `ALTER TABLE ... ADD INDEX`
/// (when `indexViaAlter`) or a standalone `CREATE INDEX` (§4.7).
pub fn add_index_query(
    table_name: &str,
    fields: &[IndexField],
    opts: &AddIndexOptions,
    raw_tablename: Option<&str>,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
) -> Result<String> {
    let caps = dialect.capabilities();
    let prefix = raw_tablename.unwrap_or(table_name);

    let mut field_sqls = Vec::with_capacity(fields.len());
    let mut field_names = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let (sql, name) = render_index_field(field, i, dialect, model)?;
        field_sqls.push(sql);
        field_names.push(name);
    }

    let name = opts
        .name
        .clone()
        .unwrap_or_else(|| name_index(prefix, &field_names));

    let unique_kw = if opts.unique { "UNIQUE " } else { "" };
    let type_kw = opts
        .r#type
        .as_ref()
        .filter(|_| caps.index.r#type)
        .map(|t| format!("{t} "))
        .unwrap_or_default();
    let using_kw = opts
        .using
        .as_ref()
        .map(|u| format!("USING {u} "))
        .unwrap_or_default();
    let parser_kw = opts
        .parser
        .as_ref()
        .filter(|_| caps.index.parser)
        .map(|p| format!(" WITH PARSER {p}"))
        .unwrap_or_default();
    let concurrently_kw = if opts.concurrently && caps.index.concurrently {
        "CONCURRENTLY "
    } else {
        ""
    };

    let where_fragment = match &opts.where_ {
        Some(cond) if caps.index.r#where => {
            let ctx = WhereContext {
                model,
                dialect,
                prefix: None,
            };
            let w = where_query(cond, &ctx)?;
            if w.is_empty() {
                String::new()
            } else {
                format!(" {w}")
            }
        }
        _ => String::new(),
    };

    let table_quoted = dialect.quote_identifier(table_name);
    let quoted_name = dialect.quote_identifier(&name);
    let using_placement = caps.index.using;

    if caps.index_via_alter {
        let using_part = if using_placement == Some(1) { using_kw.as_str() } else { "" };
        Ok(format!(
            "ALTER TABLE {table_quoted} ADD {unique_kw}{type_kw}INDEX {quoted_name} {using_part}({})",
            field_sqls.join(", ")
        ))
    } else {
        let using_before = if using_placement == Some(1) { using_kw.as_str() } else { "" };
        let using_after = if using_placement == Some(2) { format!(" {using_kw}") } else { String::new() };
        Ok(format!(
            "CREATE {unique_kw}{type_kw}INDEX {concurrently_kw}{quoted_name} {using_before}ON {table_quoted}{using_after} ({}){parser_kw}{where_fragment}",
            field_sqls.join(", ")
        ))
    }
}
