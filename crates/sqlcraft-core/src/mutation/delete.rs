//! DELETE and TRUNCATE builders (§4.6). Dialect-specific per spec.md; this
//! module supplies the generic/ANSI-ish rendering every dialect preset
//! falls back to.

use crate::dialect::Dialect;
use crate::error::Result;
use crate::model::{ModelMeta, TableRef};
use crate::reference::quote_table;
use crate::where_clause::{where_query, Condition, WhereContext};

/// Options controlling a DELETE.
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// WHERE condition.
    pub where_: Option<Condition>,
    /// Row cap, honoured only when the dialect supports a `LIMIT` on
    /// DELETE (mirrors `limitOnUpdate`'s MySQL-only availability).
    pub limit: Option<i64>,
    /// `DELETE IGNORE`.
    pub ignore: bool,
}

/// Assembles a DELETE statement, terminated by `;`.
pub fn delete_query(
    table: &TableRef,
    opts: &DeleteOptions,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
) -> Result<String> {
    tracing::debug!(table = table.table_name(), dialect = dialect.name(), "building delete statement");
    let caps = dialect.capabilities();
    let table_sql = quote_table(table, None, false, dialect);
    let ignore_kw = if opts.ignore && caps.ignore { " IGNORE" } else { "" };

    let where_ctx = WhereContext {
        model,
        dialect,
        prefix: None,
    };
    let where_fragment = match &opts.where_ {
        Some(cond) => where_query(cond, &where_ctx)?,
        None => String::new(),
    };

    let mut body = format!("DELETE{ignore_kw} FROM {table_sql}");
    if !where_fragment.is_empty() {
        body.push(' ');
        body.push_str(&where_fragment);
    }
    if caps.limit_on_update {
        if let Some(limit) = opts.limit {
            body.push_str(&format!(" LIMIT {limit}"));
        }
    }
    body.push(';');
    Ok(body)
}

/// `TRUNCATE TABLE t;` — ignores `limit` and `where` per spec.md §4.6.
#[must_use]
pub fn truncate_query(table: &TableRef, dialect: &dyn Dialect) -> String {
    format!("TRUNCATE TABLE {};", quote_table(table, None, false, dialect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Generic;

    #[test]
    fn delete_with_where() {
        let d = Generic::default();
        let table = TableRef::Bare("t".into());
        let opts = DeleteOptions {
            where_: Some(Condition::field("id", Condition::scalar(1i64))),
            ..Default::default()
        };
        let sql = delete_query(&table, &opts, None, &d).unwrap();
        assert_eq!(sql, "DELETE FROM \"t\" WHERE \"id\" = 1;");
    }

    #[test]
    fn truncate_ignores_limit_and_where() {
        let d = Generic::default();
        let table = TableRef::Bare("t".into());
        assert_eq!(truncate_query(&table, &d), "TRUNCATE TABLE \"t\";");
    }
}
