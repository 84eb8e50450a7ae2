//! Identifier and scalar value escaping (C1).

use chrono::{DateTime, Utc};

/// A scalar value ready to be escaped into a SQL literal.
///
/// This is the inline-literal counterpart of a parameter-binding value
/// type: nothing here ever becomes a `?` placeholder, it is always folded
/// directly into the generated SQL text.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scalar {
    /// SQL `NULL`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed integer literal.
    Int(i64),
    /// Floating point literal. Must be finite; `escape_scalar` rejects
    /// `NaN`/`inf` by falling back to `NULL`, mirroring no dialect having a
    /// literal spelling for them.
    Float(f64),
    /// String literal.
    Text(String),
    /// Binary literal.
    Bytes(Vec<u8>),
    /// Timestamp literal, rendered as ISO 8601 with an explicit offset.
    DateTime(DateTime<Utc>),
    /// A sequence of scalars, rendered as a parenthesised comma list.
    List(Vec<Scalar>),
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Options threaded through `escape` — the target dialect's identifier
/// style plus whatever ambient settings affect literal rendering.
#[derive(Debug, Clone, Copy)]
pub struct EscapeOptions {
    /// Whether to validate field values before escaping (unused at the
    /// scalar-escape layer itself; consumed by `escape` in higher-level
    /// callers that hold a field's type capability).
    pub type_validation: bool,
}

impl Default for EscapeOptions {
    fn default() -> Self {
        Self {
            type_validation: true,
        }
    }
}

/// Escapes a scalar into a SQL literal.
///
/// This is the direct analogue of `scalarEscape(value, timezone, dialect)`:
/// strings are single-quoted with internal quotes doubled, booleans use the
/// dialect's token, dates are ISO 8601, sequences become a parenthesised
/// list, and bytes become a dialect-specific hex literal.
#[must_use]
pub fn escape_scalar(value: &Scalar, bool_true: &str, bool_false: &str) -> String {
    match value {
        Scalar::Null => "NULL".to_string(),
        Scalar::Bool(true) => bool_true.to_string(),
        Scalar::Bool(false) => bool_false.to_string(),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) if f.is_finite() => {
            if f.fract() == 0.0 {
                format!("{f:.1}")
            } else {
                f.to_string()
            }
        }
        Scalar::Float(_) => "NULL".to_string(),
        Scalar::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Scalar::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
        Scalar::DateTime(dt) => format!("'{}'", dt.to_rfc3339()),
        Scalar::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| escape_scalar(item, bool_true, bool_false))
                .collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Escapes a scalar for a specific attribute, honouring `options`.
///
/// This is the config-aware counterpart of [`escape_scalar`]: when
/// `options.type_validation` is set and `attr` is known to disallow `NULL`,
/// an explicit `Scalar::Null` is rejected rather than silently rendered as
/// the `NULL` literal.
pub fn escape(
    value: &Scalar,
    attribute_name: &str,
    attr: Option<&crate::model::Attribute>,
    options: &EscapeOptions,
    bool_true: &str,
    bool_false: &str,
) -> crate::error::Result<String> {
    if options.type_validation && matches!(value, Scalar::Null) {
        if let Some(attr) = attr {
            if !attr.allow_null {
                return Err(crate::error::Error::NullNotAllowedForAttribute {
                    attribute: attribute_name.to_string(),
                });
            }
        }
    }
    Ok(escape_scalar(value, bool_true, bool_false))
}

/// Quotes a single identifier, doubling any internal occurrence of the
/// delimiter. `force` is accepted for parity with the abstract method
/// signature; dialects that always quote ignore it.
#[must_use]
pub fn quote_identifier(id: &str, open: char, close: char) -> String {
    if open == close {
        let doubled = id.replace(open, &format!("{open}{open}"));
        format!("{open}{doubled}{close}")
    } else {
        format!("{open}{id}{close}")
    }
}

/// Splits a dotted identifier on the *last* `.` only: everything before it
/// is quoted as one token, the final segment is quoted separately. This
/// preserves schema-qualified names (`schema.table`) without over-splitting
/// alias paths that are already dot-joined.
#[must_use]
pub fn quote_identifiers(dotted: &str, open: char, close: char) -> String {
    match dotted.rsplit_once('.') {
        Some((head, tail)) => {
            format!(
                "{}.{}",
                quote_identifier(head, open, close),
                quote_identifier(tail, open, close)
            )
        }
        None => quote_identifier(dotted, open, close),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_strings_with_doubled_quotes() {
        let s = Scalar::Text("O'Brien".to_string());
        assert_eq!(escape_scalar(&s, "TRUE", "FALSE"), "'O''Brien'");
    }

    #[test]
    fn escapes_null_and_bool() {
        assert_eq!(escape_scalar(&Scalar::Null, "TRUE", "FALSE"), "NULL");
        assert_eq!(escape_scalar(&Scalar::Bool(true), "1", "0"), "1");
        assert_eq!(escape_scalar(&Scalar::Bool(false), "1", "0"), "0");
    }

    #[test]
    fn escapes_bytes_as_hex() {
        let s = Scalar::Bytes(vec![0xDE, 0xAD]);
        assert_eq!(escape_scalar(&s, "TRUE", "FALSE"), "X'DEAD'");
    }

    #[test]
    fn escapes_list_as_parenthesised_csv() {
        let s = Scalar::List(vec![Scalar::Int(1), Scalar::Int(2)]);
        assert_eq!(escape_scalar(&s, "TRUE", "FALSE"), "(1, 2)");
    }

    #[test]
    fn escape_rejects_null_for_non_nullable_attribute_when_validating() {
        let attr = crate::model::Attribute {
            allow_null: false,
            ..Default::default()
        };
        let err = escape(&Scalar::Null, "age", Some(&attr), &EscapeOptions::default(), "TRUE", "FALSE")
            .unwrap_err();
        assert_eq!(
            err,
            crate::error::Error::NullNotAllowedForAttribute {
                attribute: "age".to_string(),
            }
        );
    }

    #[test]
    fn escape_allows_null_when_type_validation_is_disabled() {
        let attr = crate::model::Attribute {
            allow_null: false,
            ..Default::default()
        };
        let options = EscapeOptions { type_validation: false };
        let sql = escape(&Scalar::Null, "age", Some(&attr), &options, "TRUE", "FALSE").unwrap();
        assert_eq!(sql, "NULL");
    }

    #[test]
    fn quote_identifiers_splits_on_last_dot_only() {
        assert_eq!(
            quote_identifiers("users.profile.name", '"', '"'),
            "\"users.profile\".\"name\""
        );
        assert_eq!(quote_identifiers("name", '"', '"'), "\"name\"");
    }

    #[test]
    fn quote_identifier_doubles_internal_delimiter() {
        assert_eq!(quote_identifier("a\"b", '"', '"'), "\"a\"\"b\"");
    }
}
