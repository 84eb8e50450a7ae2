//! Mutation builders (C7, §4.6): INSERT, bulk INSERT, UPDATE, increment,
//! DELETE.
//!
//! Row values are kept in an [`indexmap::IndexMap`] rather than a
//! `HashMap`, for the same reason the WHERE compiler's condition maps are:
//! the generated column list must follow the order the caller supplied it
//! in (§5).

pub mod bulk_insert;
pub mod delete;
pub mod increment;
pub mod insert;
pub mod update;

pub use bulk_insert::{bulk_insert_query, BulkInsertOptions};
pub use delete::{delete_query, truncate_query, DeleteOptions};
pub use increment::{increment_query, IncrementSpec};
pub use insert::{insert_query, InsertOptions};
pub use update::{update_query, UpdateOptions};

use indexmap::IndexMap;

use crate::dialect::Dialect;
use crate::model::ModelMeta;
use crate::value::Scalar;

/// A row of column-name to value pairs, in caller-supplied order.
pub type Row = IndexMap<String, Scalar>;

/// `true` when `field` names an auto-increment column on `model`.
pub(crate) fn is_auto_increment(model: Option<&dyn ModelMeta>, field: &str) -> bool {
    model
        .and_then(|m| m.field_attribute(field))
        .is_some_and(|a| a.auto_increment)
}

/// Appends the dialect's RETURNING/OUTPUT clause to an assembled DML
/// statement, per §4.6. MSSQL's `OUTPUT INSERTED.*` is inserted *before*
/// `VALUES (...)`/`WHERE ...` by the caller (it is not a trailing clause
/// like `RETURNING`), so this only handles the `RETURNING *` case; MSSQL
/// callers build the `OUTPUT` clause inline.
pub(crate) fn returning_suffix(wants: bool, dialect: &dyn Dialect) -> &'static str {
    if wants && dialect.capabilities().return_values.returning {
        " RETURNING *"
    } else {
        ""
    }
}

/// Declares a `@tmp` table mirroring every non-virtual attribute of `model`
/// and redirects `OUTPUT INSERTED.*` into it, per the MSSQL
/// `tmpTableTrigger` rewrite. Returns `(declare_prefix, output_clause,
/// select_suffix)`.
pub(crate) fn tmp_table_trigger_parts(model: Option<&dyn ModelMeta>) -> (String, &'static str, &'static str) {
    let Some(model) = model else {
        return (String::new(), " OUTPUT INSERTED.*", "");
    };
    let mut attrs = model.all_attributes();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    if attrs.is_empty() {
        return (String::new(), " OUTPUT INSERTED.*", "");
    }
    let columns: Vec<String> = attrs
        .iter()
        .map(|(field, attr)| {
            let ty = attr.r#type.as_deref().unwrap_or("NVARCHAR(MAX)");
            format!("[{field}] {ty}")
        })
        .collect();
    let declare = format!("DECLARE @tmp TABLE ({});", columns.join(", "));
    (declare, " OUTPUT INSERTED.* INTO @tmp", ";select * from @tmp")
}

/// Wraps an already-assembled INSERT (without its trailing `;`) in a
/// transient `pg_temp` function that swallows `unique_violation`, per
/// §4.6's PostgreSQL `EXCEPTION` rewrite. The function name carries a UUID
/// to avoid collisions between concurrent callers.
#[must_use]
pub fn wrap_pg_exception(insert_stmt_no_semi: &str) -> String {
    let fn_name = format!("testfunc_{}", uuid::Uuid::new_v4().simple());
    format!(
        "CREATE OR REPLACE FUNCTION pg_temp.{fn_name}() RETURNS TABLE (result RECORD, errmsg TEXT) AS $body$ \
BEGIN RETURN QUERY SELECT r, NULL::text FROM ({insert_stmt_no_semi} RETURNING *) AS r; \
EXCEPTION WHEN unique_violation THEN \
GET STACKED DIAGNOSTICS errmsg = MESSAGE_TEXT; \
RETURN QUERY SELECT NULL::record, errmsg; END; \
$body$ LANGUAGE plpgsql; \
SELECT * FROM pg_temp.{fn_name}(); \
DROP FUNCTION pg_temp.{fn_name}();"
    )
}
