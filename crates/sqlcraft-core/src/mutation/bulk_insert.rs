//! Bulk INSERT builder (§4.6).

use indexmap::IndexSet;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::model::{ModelMeta, TableRef};
use crate::reference::quote_table;
use crate::value::Scalar;

use super::{is_auto_increment, Row};

/// Options controlling a bulk INSERT beyond the rows themselves.
#[derive(Debug, Clone, Default)]
pub struct BulkInsertOptions {
    /// `INSERT IGNORE` / `ON CONFLICT DO NOTHING`.
    pub ignore: bool,
    /// Whether to request `RETURNING *`.
    pub returning: bool,
    /// Columns to upsert via `ON DUPLICATE KEY UPDATE col=VALUES(col)`.
    pub update_on_duplicate: Option<Vec<String>>,
}

/// Assembles a multi-row INSERT statement, terminated by `;`. The column
/// list is the union of every row's keys, in first-seen order; a row
/// missing a column emits `DEFAULT` (serial column + `bulkDefault`
/// support) or `NULL` (everything else) in that position.
pub fn bulk_insert_query(
    table: &TableRef,
    rows: &[Row],
    model: Option<&dyn ModelMeta>,
    opts: &BulkInsertOptions,
    dialect: &dyn Dialect,
) -> Result<String> {
    tracing::debug!(
        table = table.table_name(),
        dialect = dialect.name(),
        rows = rows.len(),
        "building bulk insert statement"
    );
    let caps = dialect.capabilities();

    let mut columns: IndexSet<String> = IndexSet::new();
    for row in rows {
        for key in row.keys() {
            columns.insert(key.clone());
        }
    }

    let table_sql = quote_table(table, None, false, dialect);
    let ignore_kw = if opts.ignore && caps.ignore { " IGNORE" } else { "" };

    if columns.is_empty() || rows.is_empty() {
        let body = if caps.default_values {
            format!("INSERT{ignore_kw} INTO {table_sql} DEFAULT VALUES")
        } else {
            format!("INSERT{ignore_kw} INTO {table_sql} VALUES ()")
        };
        return Ok(format!("{body};"));
    }

    let mut row_strs: Vec<String> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(columns.len());
        for col in &columns {
            match row.get(col) {
                Some(value) => values.push(dialect.escape_scalar(value)),
                None => {
                    if is_auto_increment(model, col) && caps.bulk_default {
                        values.push("DEFAULT".to_string());
                    } else {
                        values.push(dialect.escape_scalar(&Scalar::Null));
                    }
                }
            }
        }
        row_strs.push(format!("({})", values.join(",")));
    }

    let cols_sql = columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(",");

    let mut body = format!(
        "INSERT{ignore_kw} INTO {table_sql} ({cols_sql}) VALUES {}",
        row_strs.join(",")
    );

    if opts.ignore && !caps.ignore && caps.ignore_duplicates {
        body.push_str(" ON CONFLICT DO NOTHING");
    }

    if let Some(dup_cols) = &opts.update_on_duplicate {
        if caps.update_on_duplicate && caps.on_duplicate_key && !dup_cols.is_empty() {
            let clause: Vec<String> = dup_cols
                .iter()
                .map(|c| {
                    let q = dialect.quote_identifier(c);
                    format!("{q}=VALUES({q})")
                })
                .collect();
            body.push_str(" ON DUPLICATE KEY UPDATE ");
            body.push_str(&clause.join(", "));
        }
    }

    if opts.returning && caps.return_values.returning {
        body.push_str(" RETURNING *");
    }

    body.push(';');
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MsSql;
    use indexmap::indexmap;

    #[test]
    fn missing_column_defaults_to_null_matching_scenario_six() {
        let d = MsSql::default();
        let table = TableRef::Bare("t".into());
        let rows = vec![
            indexmap! { "a".to_string() => Scalar::Int(1) },
            indexmap! { "a".to_string() => Scalar::Int(2), "b".to_string() => Scalar::Int(3) },
        ];
        let sql = bulk_insert_query(&table, &rows, None, &BulkInsertOptions::default(), &d).unwrap();
        assert_eq!(sql, "INSERT INTO [t] ([a],[b]) VALUES (1,NULL),(2,3);");
    }

    #[test]
    fn update_on_duplicate_appended_when_supported() {
        let d = crate::dialect::MySql::default();
        let table = TableRef::Bare("t".into());
        let rows = vec![indexmap! { "a".to_string() => Scalar::Int(1) }];
        let opts = BulkInsertOptions {
            update_on_duplicate: Some(vec!["a".to_string()]),
            ..Default::default()
        };
        let sql = bulk_insert_query(&table, &rows, None, &opts, &d).unwrap();
        assert!(sql.contains("ON DUPLICATE KEY UPDATE `a`=VALUES(`a`)"));
    }
}
