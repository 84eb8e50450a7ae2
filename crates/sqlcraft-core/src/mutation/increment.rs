//! Increment (`SET col = col + n`) builder (§4.6).

use crate::dialect::Dialect;
use crate::error::Result;
use crate::model::{ModelMeta, TableRef};
use crate::reference::quote_table;
use crate::value::Scalar;
use crate::where_clause::{where_query, Condition, WhereContext};

use super::{returning_suffix, Row};

/// One `col = col + value` increment (or decrement, for a negative value).
#[derive(Debug, Clone)]
pub struct IncrementSpec {
    /// Column to increment.
    pub attribute: String,
    /// Amount added (a literal scalar, already the right sign).
    pub amount: Scalar,
}

/// Assembles an increment UPDATE: every [`IncrementSpec`] becomes
/// `col = col + escape(amount)`; every entry of `extra_sets` becomes a
/// plain `col = escape(value)` assignment alongside it.
pub fn increment_query(
    table: &TableRef,
    increments: &[IncrementSpec],
    extra_sets: &Row,
    where_: Option<&Condition>,
    returning: bool,
    model: Option<&dyn ModelMeta>,
    dialect: &dyn Dialect,
) -> Result<String> {
    let table_sql = quote_table(table, None, false, dialect);

    let mut assignments = Vec::with_capacity(increments.len() + extra_sets.len());
    for inc in increments {
        let quoted = dialect.quote_identifier(&inc.attribute);
        let amount = dialect.escape_scalar(&inc.amount);
        assignments.push(format!("{quoted}={quoted} + {amount}"));
    }
    for (field, value) in extra_sets {
        assignments.push(format!(
            "{}={}",
            dialect.quote_identifier(field),
            dialect.escape_scalar(value)
        ));
    }

    let where_ctx = WhereContext {
        model,
        dialect,
        prefix: None,
    };
    let where_fragment = match where_ {
        Some(cond) => where_query(cond, &where_ctx)?,
        None => String::new(),
    };

    let mut body = format!("UPDATE {table_sql} SET {}", assignments.join(","));
    if !where_fragment.is_empty() {
        body.push(' ');
        body.push_str(&where_fragment);
    }
    body.push_str(returning_suffix(returning, dialect));
    body.push(';');
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Generic;
    use indexmap::indexmap;

    #[test]
    fn increment_emits_col_plus_amount() {
        let d = Generic::default();
        let table = TableRef::Bare("counters".into());
        let increments = vec![IncrementSpec {
            attribute: "views".into(),
            amount: Scalar::Int(1),
        }];
        let extra: Row = indexmap! {};
        let cond = Condition::field("id", Condition::scalar(1i64));
        let sql = increment_query(&table, &increments, &extra, Some(&cond), false, None, &d).unwrap();
        assert_eq!(
            sql,
            "UPDATE \"counters\" SET \"views\"=\"views\" + 1 WHERE \"id\" = 1;"
        );
    }

    #[test]
    fn extra_sets_are_plain_assignments() {
        let d = Generic::default();
        let table = TableRef::Bare("counters".into());
        let increments = vec![IncrementSpec {
            attribute: "views".into(),
            amount: Scalar::Int(1),
        }];
        let extra: Row = indexmap! { "updated_at".to_string() => Scalar::Text("now".into()) };
        let sql = increment_query(&table, &increments, &extra, None, false, None, &d).unwrap();
        assert_eq!(
            sql,
            "UPDATE \"counters\" SET \"views\"=\"views\" + 1,\"updated_at\"='now';"
        );
    }
}
