//! UPDATE builder (§4.6).

use crate::dialect::Dialect;
use crate::error::Result;
use crate::model::{ModelMeta, TableRef};
use crate::reference::quote_table;
use crate::where_clause::{where_query, Condition, WhereContext};

use super::{is_auto_increment, returning_suffix, tmp_table_trigger_parts, Row};

/// Options controlling an UPDATE beyond the assignments themselves.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// WHERE condition.
    pub where_: Option<Condition>,
    /// Row cap, honoured only when the dialect supports `UPDATE ... LIMIT`.
    pub limit: Option<i64>,
    /// Whether to request `RETURNING *` / `OUTPUT INSERTED.*`.
    pub returning: bool,
    /// Whether the target table carries a trigger requiring the MSSQL
    /// temp-table rewrite.
    pub has_trigger: bool,
}

/// Assembles an UPDATE statement. Returns the empty string when `values` is
/// empty (a no-op, per spec.md §8 scenario 7) or when every column in
/// `values` turns out to be an auto-increment column the dialect forbids
/// updating.
pub fn update_query(
    table: &TableRef,
    values: &Row,
    opts: &UpdateOptions,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
) -> Result<String> {
    tracing::debug!(
        table = table.table_name(),
        dialect = dialect.name(),
        assignments = values.len(),
        "building update statement"
    );
    if values.is_empty() {
        tracing::trace!("update with no assignments is a no-op");
        return Ok(String::new());
    }

    let caps = dialect.capabilities();
    let mut assignments = Vec::with_capacity(values.len());
    for (field, value) in values {
        if is_auto_increment(model, field) && !caps.auto_increment.update {
            continue;
        }
        assignments.push(format!(
            "{}={}",
            dialect.quote_identifier(field),
            dialect.escape_scalar(value)
        ));
    }
    if assignments.is_empty() {
        return Ok(String::new());
    }

    let table_sql = quote_table(table, None, false, dialect);
    let where_ctx = WhereContext {
        model,
        dialect,
        prefix: None,
    };
    let where_fragment = match &opts.where_ {
        Some(cond) => where_query(cond, &where_ctx)?,
        None => String::new(),
    };

    let mut body = format!("UPDATE {table_sql} SET {}", assignments.join(","));
    if !where_fragment.is_empty() {
        body.push(' ');
        body.push_str(&where_fragment);
    }
    if caps.limit_on_update {
        if let Some(limit) = opts.limit {
            body.push_str(&format!(" LIMIT {limit}"));
        }
    }

    if opts.has_trigger && caps.tmp_table_trigger {
        let (declare, output_clause, select_suffix) = tmp_table_trigger_parts(model);
        let spliced = splice_output_clause(&body, output_clause);
        return Ok(format!("{declare}{spliced}{select_suffix};"));
    }

    body.push_str(returning_suffix(opts.returning, dialect));
    if opts.returning && !caps.return_values.returning && caps.return_values.output {
        body = splice_output_clause(&body, " OUTPUT INSERTED.*");
    }

    body.push(';');
    Ok(body)
}

/// Inserts `clause` immediately before ` SET`, matching MSSQL's
/// `UPDATE t OUTPUT INSERTED.* SET ...` placement.
fn splice_output_clause(stmt: &str, clause: &str) -> String {
    if let Some(pos) = stmt.find(" SET ") {
        let (head, tail) = stmt.split_at(pos);
        format!("{head}{clause}{tail}")
    } else {
        format!("{stmt}{clause}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Generic;
    use crate::value::Scalar;
    use indexmap::indexmap;

    #[test]
    fn empty_values_is_a_no_op() {
        let d = Generic::default();
        let table = TableRef::Bare("t".into());
        let row: Row = indexmap! {};
        let opts = UpdateOptions {
            where_: Some(Condition::field("id", Condition::scalar(1i64))),
            ..Default::default()
        };
        assert_eq!(update_query(&table, &row, &opts, None, &d).unwrap(), "");
    }

    #[test]
    fn basic_update_matches_shape() {
        let d = Generic::default();
        let table = TableRef::Bare("t".into());
        let row: Row = indexmap! { "name".to_string() => Scalar::Text("x".into()) };
        let opts = UpdateOptions {
            where_: Some(Condition::field("id", Condition::scalar(1i64))),
            ..Default::default()
        };
        let sql = update_query(&table, &row, &opts, None, &d).unwrap();
        assert_eq!(sql, "UPDATE \"t\" SET \"name\"='x' WHERE \"id\" = 1;");
    }

    #[test]
    fn mysql_limit_on_update_is_appended() {
        let d = crate::dialect::MySql::default();
        let table = TableRef::Bare("t".into());
        let row: Row = indexmap! { "name".to_string() => Scalar::Text("x".into()) };
        let opts = UpdateOptions {
            limit: Some(1),
            ..Default::default()
        };
        let sql = update_query(&table, &row, &opts, None, &d).unwrap();
        assert!(sql.contains("LIMIT 1"));
    }
}
