//! Transaction builders (C9, §4.7).

use crate::dialect::Dialect;

/// Isolation levels accepted by `setIsolationLevelQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// `READ UNCOMMITTED`.
    ReadUncommitted,
    /// `READ COMMITTED`.
    ReadCommitted,
    /// `REPEATABLE READ`.
    RepeatableRead,
    /// `SERIALIZABLE`.
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// A transaction context: whether this transaction is nested inside a
/// parent (i.e. should use savepoints) and, for the nested case, the
/// savepoint name.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    /// Name of the parent transaction's savepoint scope, if this is a
    /// nested transaction.
    pub parent: Option<String>,
    /// Savepoint/transaction name used in `SAVEPOINT`/`ROLLBACK TO
    /// SAVEPOINT`.
    pub name: String,
}

impl TransactionContext {
    /// A top-level (non-nested) transaction.
    #[must_use]
    pub fn top_level(name: impl Into<String>) -> Self {
        Self {
            parent: None,
            name: name.into(),
        }
    }

    /// A nested transaction (savepoint) under `parent`.
    #[must_use]
    pub fn nested(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            name: name.into(),
        }
    }

    fn is_nested(&self) -> bool {
        self.parent.is_some()
    }
}

/// `START TRANSACTION` or, for a nested transaction, `SAVEPOINT name`.
#[must_use]
pub fn start_transaction_query(tx: &TransactionContext, dialect: &dyn Dialect) -> String {
    if tx.is_nested() {
        format!("SAVEPOINT {}", dialect.quote_identifier(&tx.name))
    } else {
        "START TRANSACTION".to_string()
    }
}

/// `COMMIT`; a no-op (empty string) for a nested transaction, which commits
/// implicitly when its parent commits.
#[must_use]
pub fn commit_transaction_query(tx: &TransactionContext) -> String {
    if tx.is_nested() {
        String::new()
    } else {
        "COMMIT".to_string()
    }
}

/// `ROLLBACK TO SAVEPOINT name` for a nested transaction, else `ROLLBACK`.
#[must_use]
pub fn rollback_transaction_query(tx: &TransactionContext, dialect: &dyn Dialect) -> String {
    if tx.is_nested() {
        format!("ROLLBACK TO SAVEPOINT {}", dialect.quote_identifier(&tx.name))
    } else {
        "ROLLBACK".to_string()
    }
}

/// `SET AUTOCOMMIT = {0,1}`; a no-op inside a nested transaction, which has
/// no autocommit semantics of its own.
#[must_use]
pub fn set_autocommit_query(value: bool, tx: &TransactionContext) -> String {
    if tx.is_nested() {
        String::new()
    } else {
        format!("SET AUTOCOMMIT = {}", i32::from(value))
    }
}

/// `SET SESSION TRANSACTION ISOLATION LEVEL level`; a no-op inside a
/// nested transaction.
#[must_use]
pub fn set_isolation_level_query(level: IsolationLevel, tx: &TransactionContext) -> String {
    if tx.is_nested() {
        String::new()
    } else {
        format!("SET SESSION TRANSACTION ISOLATION LEVEL {}", level.as_sql())
    }
}

/// `SET CONSTRAINTS ALL DEFERRED` — a no-op at the abstract layer; only
/// PostgreSQL actually emits this (per spec.md §4.7's "PostgreSQL
/// overrides").
#[must_use]
pub fn defer_constraints_query(dialect: &dyn Dialect) -> String {
    if dialect.name() == "postgres" {
        "SET CONSTRAINTS ALL DEFERRED".to_string()
    } else {
        String::new()
    }
}

/// `SET CONSTRAINTS ALL IMMEDIATE` — the counterpart to
/// [`defer_constraints_query`].
#[must_use]
pub fn set_constraints_immediate_query(dialect: &dyn Dialect) -> String {
    if dialect.name() == "postgres" {
        "SET CONSTRAINTS ALL IMMEDIATE".to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Generic, Postgres};

    #[test]
    fn top_level_start_is_start_transaction() {
        let d = Generic::default();
        let tx = TransactionContext::top_level("t1");
        assert_eq!(start_transaction_query(&tx, &d), "START TRANSACTION");
    }

    #[test]
    fn nested_start_is_savepoint() {
        let d = Generic::default();
        let tx = TransactionContext::nested("sp1", "t1");
        assert_eq!(start_transaction_query(&tx, &d), "SAVEPOINT \"sp1\"");
    }

    #[test]
    fn nested_commit_is_a_no_op() {
        let tx = TransactionContext::nested("sp1", "t1");
        assert_eq!(commit_transaction_query(&tx), "");
    }

    #[test]
    fn nested_rollback_goes_to_savepoint() {
        let d = Generic::default();
        let tx = TransactionContext::nested("sp1", "t1");
        assert_eq!(rollback_transaction_query(&tx, &d), "ROLLBACK TO SAVEPOINT \"sp1\"");
    }

    #[test]
    fn defer_constraints_only_on_postgres() {
        let pg = Postgres::default();
        let generic = Generic::default();
        assert_eq!(defer_constraints_query(&pg), "SET CONSTRAINTS ALL DEFERRED");
        assert_eq!(defer_constraints_query(&generic), "");
    }
}
