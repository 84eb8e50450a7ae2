//! Dialect capability registry (C2).

/// Identifier-quoting and literal-token style for a concrete dialect.
///
/// The quoting itself lives in [`crate::value`]; this trait supplies the
/// per-dialect characters and tokens that the rest of the crate consults.
pub trait Dialect {
    /// Name used in error messages (`undefined-dialect-method`).
    fn name(&self) -> &'static str;

    /// Opening identifier delimiter (`"` for ANSI/Postgres/SQLite, `` ` ``
    /// for MySQL, `[` for MSSQL).
    fn identifier_open(&self) -> char;

    /// Closing identifier delimiter (`]` for MSSQL, otherwise equal to
    /// `identifier_open`).
    fn identifier_close(&self) -> char;

    /// Token used for a boolean `TRUE` literal.
    fn bool_true(&self) -> &'static str {
        "true"
    }

    /// Token used for a boolean `FALSE` literal.
    fn bool_false(&self) -> &'static str {
        "false"
    }

    /// The capability flags for this dialect.
    fn capabilities(&self) -> &Capabilities;

    /// Quotes a single identifier.
    fn quote_identifier(&self, id: &str) -> String {
        crate::value::quote_identifier(id, self.identifier_open(), self.identifier_close())
    }

    /// Quotes a dotted identifier path (see [`crate::value::quote_identifiers`]).
    fn quote_identifiers(&self, dotted: &str) -> String {
        crate::value::quote_identifiers(dotted, self.identifier_open(), self.identifier_close())
    }

    /// Escapes a scalar value using this dialect's boolean tokens.
    fn escape_scalar(&self, value: &crate::value::Scalar) -> String {
        crate::value::escape_scalar(value, self.bool_true(), self.bool_false())
    }
}

/// RETURNING/OUTPUT support flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReturnValues {
    /// `RETURNING *` (PostgreSQL, SQLite ≥ 3.35).
    pub returning: bool,
    /// `OUTPUT INSERTED.*` (MSSQL).
    pub output: bool,
}

/// Auto-increment column handling flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoIncrement {
    /// Whether `DEFAULT` may be used as the assigned value for an
    /// auto-increment column.
    pub default_value: bool,
    /// Whether explicitly assigning an auto-increment column requires an
    /// `IDENTITY_INSERT` toggle (MSSQL).
    pub identity_insert: bool,
    /// Whether the dialect allows `UPDATE`ing an auto-increment column.
    pub update: bool,
}

/// Index-definition feature flags, gating the optional clauses `addIndex`
/// may emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCaps {
    /// `COLLATE` clause per field.
    pub collate: bool,
    /// `(length)` prefix per field.
    pub length: bool,
    /// `WITH PARSER` clause.
    pub parser: bool,
    /// `CONCURRENTLY` keyword.
    pub concurrently: bool,
    /// Index method/type (`USING btree`, `HASH`, ...).
    pub r#type: bool,
    /// `USING` clause placement: `None` = unsupported, `Some(1)` = before
    /// the column list, `Some(2)` = after the table name.
    pub using: Option<u8>,
    /// `WHERE` clause (partial indexes).
    pub r#where: bool,
}

/// Static per-dialect capability flags consulted by every builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether `schema.table` qualification is supported.
    pub schemas: bool,
    /// RETURNING/OUTPUT support.
    pub return_values: ReturnValues,
    /// Whether INSERT must redirect through a `@tmp` table to coexist with
    /// triggers (MSSQL `OUTPUT ... INTO`).
    pub tmp_table_trigger: bool,
    /// Auto-increment handling.
    pub auto_increment: AutoIncrement,
    /// Whether the literal `DEFAULT` keyword may appear as a value.
    pub default_keyword: bool,
    /// Whether `DEFAULT VALUES` is the empty-insert form.
    pub default_values: bool,
    /// Whether `VALUES ()` is the empty-insert form.
    pub values_empty_parens: bool,
    /// `INSERT IGNORE` / `DELETE ... IGNORE` support.
    pub ignore: bool,
    /// Whether duplicate-key ignoring uses a different spelling than plain
    /// `IGNORE` (e.g. `ON CONFLICT DO NOTHING`).
    pub ignore_duplicates: bool,
    /// `ON DUPLICATE KEY UPDATE` support.
    pub update_on_duplicate: bool,
    /// Whether `ON DUPLICATE KEY` is the exact clause spelling used.
    pub on_duplicate_key: bool,
    /// PostgreSQL-style `EXCEPTION WHEN unique_violation` wrapper support.
    pub exception: bool,
    /// Whether `UPDATE ... LIMIT n` is supported.
    pub limit_on_update: bool,
    /// Row locking support (`FOR UPDATE` family).
    pub lock: bool,
    /// `FOR UPDATE OF table` support.
    pub lock_of: bool,
    /// `FOR KEY SHARE` / `FOR NO KEY UPDATE` support.
    pub lock_key: bool,
    /// `FOR SHARE` support.
    pub for_share: bool,
    /// `UNION ALL` support (as opposed to falling back to plain `UNION`).
    pub union_all: bool,
    /// Index feature flags.
    pub index: IndexCaps,
    /// Whether `addIndex` must go through `ALTER TABLE ... ADD INDEX`
    /// rather than a standalone `CREATE INDEX`.
    pub index_via_alter: bool,
    /// Whether many-to-many joins may depend on the through table (permits
    /// the single wrapped-join form instead of two sequential joins).
    pub join_table_dependent: bool,
    /// Whether bulk insert may use `DEFAULT` for missing serial columns.
    pub bulk_default: bool,
    /// Whether `OFFSET ... FETCH NEXT n ROWS ONLY` is preferred over the
    /// sentinel-large-limit trick when only an offset is given.
    pub offset_fetch: bool,
}

/// Generic/ANSI dialect. Used as the baseline for builders that have no
/// concrete dialect override, and as the default in tests.
pub struct Generic {
    caps: Capabilities,
}

impl Default for Generic {
    fn default() -> Self {
        Self {
            caps: Capabilities {
                return_values: ReturnValues {
                    returning: false,
                    output: false,
                },
                default_keyword: true,
                index: IndexCaps {
                    using: None,
                    ..IndexCaps::default()
                },
                ..Capabilities::default()
            },
        }
    }
}

impl Dialect for Generic {
    fn name(&self) -> &'static str {
        "generic"
    }
    fn identifier_open(&self) -> char {
        '"'
    }
    fn identifier_close(&self) -> char {
        '"'
    }
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }
}

/// PostgreSQL dialect capabilities.
pub struct Postgres {
    caps: Capabilities,
}

impl Default for Postgres {
    fn default() -> Self {
        Self {
            caps: Capabilities {
                schemas: true,
                return_values: ReturnValues {
                    returning: true,
                    output: false,
                },
                default_keyword: true,
                default_values: true,
                ignore_duplicates: true,
                exception: true,
                lock: true,
                lock_of: true,
                lock_key: true,
                for_share: true,
                union_all: true,
                index: IndexCaps {
                    collate: true,
                    concurrently: true,
                    r#type: true,
                    using: Some(2),
                    r#where: true,
                    ..IndexCaps::default()
                },
                bulk_default: true,
                offset_fetch: true,
                ..Capabilities::default()
            },
        }
    }
}

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }
    fn identifier_open(&self) -> char {
        '"'
    }
    fn identifier_close(&self) -> char {
        '"'
    }
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }
}

/// MySQL dialect capabilities.
pub struct MySql {
    caps: Capabilities,
}

impl Default for MySql {
    fn default() -> Self {
        Self {
            caps: Capabilities {
                schemas: true,
                return_values: ReturnValues::default(),
                default_keyword: true,
                values_empty_parens: true,
                ignore: true,
                update_on_duplicate: true,
                on_duplicate_key: true,
                limit_on_update: true,
                lock: true,
                union_all: true,
                index: IndexCaps {
                    length: true,
                    parser: true,
                    r#type: true,
                    using: Some(2),
                    ..IndexCaps::default()
                },
                auto_increment: AutoIncrement {
                    default_value: true,
                    update: true,
                    ..AutoIncrement::default()
                },
                bulk_default: true,
                ..Capabilities::default()
            },
        }
    }
}

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }
    fn identifier_open(&self) -> char {
        '`'
    }
    fn identifier_close(&self) -> char {
        '`'
    }
    fn bool_true(&self) -> &'static str {
        "true"
    }
    fn bool_false(&self) -> &'static str {
        "false"
    }
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }
}

/// Microsoft SQL Server dialect capabilities.
pub struct MsSql {
    caps: Capabilities,
}

impl Default for MsSql {
    fn default() -> Self {
        Self {
            caps: Capabilities {
                schemas: true,
                return_values: ReturnValues {
                    returning: false,
                    output: true,
                },
                tmp_table_trigger: true,
                auto_increment: AutoIncrement {
                    identity_insert: true,
                    ..AutoIncrement::default()
                },
                default_keyword: true,
                default_values: true,
                lock: false,
                index: IndexCaps {
                    r#where: true,
                    using: None,
                    ..IndexCaps::default()
                },
                index_via_alter: true,
                offset_fetch: true,
                ..Capabilities::default()
            },
        }
    }
}

impl Dialect for MsSql {
    fn name(&self) -> &'static str {
        "mssql"
    }
    fn identifier_open(&self) -> char {
        '['
    }
    fn identifier_close(&self) -> char {
        ']'
    }
    fn bool_true(&self) -> &'static str {
        "1"
    }
    fn bool_false(&self) -> &'static str {
        "0"
    }
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }
}

/// SQLite dialect capabilities.
pub struct Sqlite {
    caps: Capabilities,
}

impl Default for Sqlite {
    fn default() -> Self {
        Self {
            caps: Capabilities {
                schemas: false,
                return_values: ReturnValues {
                    returning: true,
                    output: false,
                },
                default_keyword: true,
                default_values: true,
                ignore: true,
                ignore_duplicates: true,
                union_all: true,
                join_table_dependent: true,
                index: IndexCaps {
                    r#where: true,
                    using: None,
                    ..IndexCaps::default()
                },
                ..Capabilities::default()
            },
        }
    }
}

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }
    fn identifier_open(&self) -> char {
        '"'
    }
    fn identifier_close(&self) -> char {
        '"'
    }
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_quotes_with_double_quotes() {
        let d = Generic::default();
        assert_eq!(d.quote_identifier("users"), "\"users\"");
    }

    #[test]
    fn mysql_quotes_with_backticks() {
        let d = MySql::default();
        assert_eq!(d.quote_identifier("users"), "`users`");
    }

    #[test]
    fn mssql_quotes_with_brackets() {
        let d = MsSql::default();
        assert_eq!(d.quote_identifier("users"), "[users]");
    }

    #[test]
    fn postgres_supports_returning_not_output() {
        let d = Postgres::default();
        assert!(d.capabilities().return_values.returning);
        assert!(!d.capabilities().return_values.output);
    }
}
