//! Error kinds raised by the generator.

use thiserror::Error;

/// Everything that can go wrong while lowering a request into SQL.
///
/// All variants are raised synchronously; nothing in this crate retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// An abstract dialect method was invoked without a concrete override.
    #[error("{method} is not implemented for dialect {dialect}")]
    UndefinedDialectMethod {
        /// The method name that has no override.
        method: String,
        /// The dialect that was asked for it.
        dialect: String,
    },

    /// `quote()` reached a path shape it does not recognise.
    #[error("unknown order/group structure: {detail}")]
    InvalidOrderStructure {
        /// Description of the offending shape.
        detail: String,
    },

    /// An ORDER/GROUP path referenced a non-existent association.
    #[error("not a valid association for {model} with alias path {path}")]
    InvalidAssociationPath {
        /// The model that was asked for the association.
        model: String,
        /// The alias path accumulated so far.
        path: String,
    },

    /// A top-level raw string was supplied to `where_query`.
    #[error("a raw string may not be used as a top-level where condition")]
    RawWhereRemoved,

    /// A `Col` node with a sequence argument was used outside ORDER/GROUP.
    #[error("a column path list may only be used inside ORDER BY or GROUP BY")]
    ColOutsideOrderGroup,

    /// A computed `Cast`/`Fn` attribute had no alias in an eager load.
    #[error("computed attribute requires an alias: {detail}")]
    MissingAliasForComputedAttribute {
        /// Rendered form of the offending attribute.
        detail: String,
    },

    /// An index field entry lacked both `name` and `attribute`.
    #[error("index field entry at position {position} is missing a name")]
    MissingIndexFieldName {
        /// Zero-based position of the offending field.
        position: usize,
    },

    /// A direction string fell outside the closed ASC/DESC/NULLS set.
    #[error("invalid order direction: {direction}")]
    InvalidOrderDirection {
        /// The rejected token.
        direction: String,
    },

    /// `NULL` was supplied for an attribute declared as non-nullable, with
    /// type validation enabled.
    #[error("attribute {attribute} does not allow NULL")]
    NullNotAllowedForAttribute {
        /// The attribute that rejected the value.
        attribute: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
