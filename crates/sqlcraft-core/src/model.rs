//! Model metadata interfaces consumed by the generator (§3).
//!
//! Everything here is a *consumed* interface: declaration, validation and
//! derivation of this metadata happen upstream of this crate.

use std::collections::HashMap;

/// A table reference: either a bare name or an explicit schema-qualified
/// triple, with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TableRef {
    /// A plain table name.
    Bare(String),
    /// A schema-qualified reference. When the dialect lacks schema
    /// support, `schema`, `delimiter` and `table_name` are concatenated
    /// into a single quoted identifier rather than quoted independently.
    Qualified {
        /// Schema name.
        schema: String,
        /// Table name.
        table_name: String,
        /// Separator used when schema support is absent.
        delimiter: String,
    },
}

impl TableRef {
    /// The bare table name regardless of variant.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::Bare(name) => name,
            Self::Qualified { table_name, .. } => table_name,
        }
    }
}

/// A table reference paired with an optional alias, as passed to
/// `quoteTable`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AliasedTable {
    /// The underlying reference.
    pub table: TableRef,
    /// Explicit alias, if any.
    pub alias: Option<String>,
}

/// Per-attribute metadata consulted by escaping and the WHERE compiler.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    /// The underlying SQL column name (`field`), if it differs from the
    /// attribute name.
    pub field: Option<String>,
    /// Dialect/type-system type name (e.g. `"JSON"`, `"ARRAY"`).
    pub r#type: Option<String>,
    /// Whether this is an auto-increment column.
    pub auto_increment: bool,
    /// Whether `NULL` is an allowed value.
    pub allow_null: bool,
    /// Whether this attribute is part of the primary key.
    pub primary_key: bool,
}

impl Attribute {
    /// `true` when `r#type` names an ARRAY type.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.r#type.as_deref() == Some("ARRAY")
    }

    /// `true` when `r#type` names a JSON/JSONB type.
    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self.r#type.as_deref(), Some("JSON") | Some("JSONB"))
    }

    /// The SQL column name, falling back to the attribute name passed in.
    #[must_use]
    pub fn field_or<'a>(&'a self, attribute_name: &'a str) -> &'a str {
        self.field.as_deref().unwrap_or(attribute_name)
    }
}

/// Referential action taken on delete/update of a foreign key's target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ForeignKeyAction {
    /// `NO ACTION`.
    NoAction,
    /// `RESTRICT`.
    Restrict,
    /// `CASCADE`.
    Cascade,
    /// `SET NULL`.
    SetNull,
    /// `SET DEFAULT`.
    SetDefault,
}

impl ForeignKeyAction {
    /// SQL spelling of the action.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// An association between two models (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Association {
    /// Source holds the foreign key.
    BelongsTo(AssociationFields),
    /// Target holds the foreign key, cardinality one.
    HasOne(AssociationFields),
    /// Target holds the foreign key, cardinality many.
    HasMany(AssociationFields),
    /// Many-to-many through a join table.
    BelongsToMany {
        /// Shared association fields.
        fields: AssociationFields,
        /// Name of the through (join) table/model.
        through: String,
    },
}

impl Association {
    /// The fields shared by every variant.
    #[must_use]
    pub fn fields(&self) -> &AssociationFields {
        match self {
            Self::BelongsTo(f) | Self::HasOne(f) | Self::HasMany(f) => f,
            Self::BelongsToMany { fields, .. } => fields,
        }
    }

    /// The through-table name, if this is a `BelongsToMany`.
    #[must_use]
    pub fn through(&self) -> Option<&str> {
        match self {
            Self::BelongsToMany { through, .. } => Some(through),
            _ => None,
        }
    }
}

/// Fields common to every association variant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssociationFields {
    /// Name of the target model.
    pub target_model: String,
    /// FK column on the source side.
    pub identifier_field: String,
    /// FK column on the target side (relevant for through associations).
    pub foreign_identifier_field: Option<String>,
    /// Primary-key column identified on the target side.
    pub target_identifier: String,
    /// The `as` label this association is known by.
    pub as_: String,
    /// Referential action applied to the foreign key, if declared.
    pub on_delete: Option<ForeignKeyAction>,
}

/// Model metadata, consumed at runtime by the generator. Implementors
/// typically wrap a static or lazily-built description of a table.
pub trait ModelMeta: Send + Sync {
    /// The model's name (distinct from its table name).
    fn name(&self) -> &str;

    /// The underlying table reference.
    fn table(&self) -> &TableRef;

    /// Primary-key attribute names, in declaration order.
    fn primary_keys(&self) -> &[String];

    /// Looks up an attribute by its declared (model-level) name.
    fn attribute(&self, name: &str) -> Option<&Attribute>;

    /// Looks up an attribute by its underlying SQL field name
    /// (`fieldRawAttributesMap`).
    fn field_attribute(&self, field: &str) -> Option<&Attribute>;

    /// Looks up an association by target model name and optional `as`
    /// label.
    fn association(&self, target_model: &str, as_: Option<&str>) -> Option<&Association>;

    /// Every declared attribute, keyed by its SQL field name. Used by the
    /// MSSQL trigger temp-table rewrite (§4.6), which needs the full column
    /// list of the target table, not just the columns touched by a given
    /// statement. Defaults to empty for implementors that never exercise
    /// that path.
    fn all_attributes(&self) -> Vec<(&str, &Attribute)> {
        Vec::new()
    }
}

/// A simple, in-memory `ModelMeta` implementation, useful for tests and for
/// callers that already hold their metadata as plain maps.
#[derive(Debug, Clone, Default)]
pub struct StaticModel {
    /// Model name.
    pub name: String,
    /// Table reference.
    pub table: TableRef,
    /// Primary-key attribute names.
    pub primary_keys: Vec<String>,
    /// Attribute-name → attribute map.
    pub attributes: HashMap<String, Attribute>,
    /// Field-name → attribute map.
    pub field_attributes: HashMap<String, Attribute>,
    /// `(target_model, as_label)` → association.
    pub associations: HashMap<(String, Option<String>), Association>,
}

impl Default for TableRef {
    fn default() -> Self {
        Self::Bare(String::new())
    }
}

impl ModelMeta for StaticModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> &TableRef {
        &self.table
    }

    fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    fn field_attribute(&self, field: &str) -> Option<&Attribute> {
        self.field_attributes.get(field)
    }

    fn association(&self, target_model: &str, as_: Option<&str>) -> Option<&Association> {
        self.associations
            .get(&(target_model.to_string(), as_.map(str::to_string)))
    }

    fn all_attributes(&self) -> Vec<(&str, &Attribute)> {
        self.field_attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }
}
