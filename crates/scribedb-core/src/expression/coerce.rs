//! Value coercion: converting runtime literals into the store's typed value
//! representation.
//!
//! Numbers stay string-encoded to preserve precision. All numeric and
//! timestamp formatting is fixed and locale-independent. A property's format
//! specifier, when configured, switches floats and timestamps to formatted
//! strings.

use chrono::format::{Item, StrftimeItems};
use scribedb_model::AttributeValue;

use super::ast::LiteralValue;
use super::error::TranslationError;
use crate::schema::{PropertyMetadata, PropertyType};

/// Default timestamp rendering: ISO-8601, fixed-width milliseconds, `Z`
/// zone suffix.
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Coerce a runtime literal into the store's value representation.
///
/// The target property, when known, supplies the format specifier and the
/// container kind for collections.
///
/// # Errors
///
/// Returns [`TranslationError::FormatError`] for an invalid format
/// specifier, and [`TranslationError::TranslationFailure`] when a set
/// element does not coerce to the set's element kind.
pub fn coerce_literal(
    value: &LiteralValue,
    property: Option<&PropertyMetadata>,
) -> Result<AttributeValue, TranslationError> {
    match value {
        LiteralValue::Null => Ok(AttributeValue::Null(true)),
        LiteralValue::Bool(b) => Ok(AttributeValue::Bool(*b)),
        LiteralValue::String(s) => Ok(AttributeValue::S(s.clone())),
        LiteralValue::Int(i) => Ok(AttributeValue::N(i.to_string())),
        LiteralValue::Float(v) => coerce_float(*v, property),
        LiteralValue::Timestamp(ts) => coerce_timestamp(*ts, property),
        LiteralValue::Id(id) => Ok(AttributeValue::S(id.to_string())),
        LiteralValue::Enum {
            member,
            ordinal,
            captured,
        } => {
            if *captured {
                Ok(AttributeValue::S(member.clone()))
            } else {
                Ok(AttributeValue::N(ordinal.to_string()))
            }
        }
        LiteralValue::Collection(items) => coerce_collection(items, property),
    }
}

fn coerce_float(
    v: f64,
    property: Option<&PropertyMetadata>,
) -> Result<AttributeValue, TranslationError> {
    if let Some(property) = property {
        if let Some(format) = property.format.as_deref() {
            let Some(precision) = fixed_decimal_precision(format) else {
                return Err(format_error(format, property));
            };
            return Ok(AttributeValue::S(format!("{v:.precision$}")));
        }
    }
    Ok(AttributeValue::N(format_float(v)))
}

fn coerce_timestamp(
    ts: chrono::DateTime<chrono::Utc>,
    property: Option<&PropertyMetadata>,
) -> Result<AttributeValue, TranslationError> {
    if let Some(property) = property {
        if let Some(format) = property.format.as_deref() {
            let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
            if items.iter().any(|item| matches!(item, Item::Error)) {
                return Err(format_error(format, property));
            }
            return Ok(AttributeValue::S(
                ts.format_with_items(items.iter()).to_string(),
            ));
        }
    }
    Ok(AttributeValue::S(
        ts.format(DEFAULT_TIMESTAMP_FORMAT).to_string(),
    ))
}

fn coerce_collection(
    items: &[LiteralValue],
    property: Option<&PropertyMetadata>,
) -> Result<AttributeValue, TranslationError> {
    let container = property.map(|p| p.value_type);
    match container {
        Some(PropertyType::StringSet) => {
            let mut set = Vec::with_capacity(items.len());
            for item in items {
                match coerce_literal(item, property)? {
                    AttributeValue::S(s) => set.push(s),
                    other => {
                        return Err(TranslationError::failure(format!(
                            "string set element for property '{}' coerced to {} instead of S",
                            property_name(property),
                            other.type_descriptor()
                        )));
                    }
                }
            }
            Ok(AttributeValue::Ss(set))
        }
        Some(PropertyType::NumberSet) => {
            let mut set = Vec::with_capacity(items.len());
            for item in items {
                match coerce_literal(item, property)? {
                    AttributeValue::N(n) => set.push(n),
                    other => {
                        return Err(TranslationError::failure(format!(
                            "number set element for property '{}' coerced to {} instead of N",
                            property_name(property),
                            other.type_descriptor()
                        )));
                    }
                }
            }
            Ok(AttributeValue::Ns(set))
        }
        // Ordered list when the target is a list or the container kind is
        // unknown.
        _ => {
            let coerced: Result<Vec<_>, _> = items
                .iter()
                .map(|item| coerce_literal(item, property))
                .collect();
            Ok(AttributeValue::L(coerced?))
        }
    }
}

/// Parse a fixed-decimal format pattern (`0` or `0.` followed by zeros),
/// returning the number of fractional digits.
fn fixed_decimal_precision(format: &str) -> Option<usize> {
    let rest = format.strip_prefix('0')?;
    if rest.is_empty() {
        return Some(0);
    }
    let digits = rest.strip_prefix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b == b'0') {
        return None;
    }
    Some(digits.len())
}

/// Format a float as natural base-10 text, preferring the integer form when
/// the value is integral.
fn format_float(v: f64) -> String {
    // Safe to truncate: the value is integral and within i64 range.
    #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

fn format_error(format: &str, property: &PropertyMetadata) -> TranslationError {
    TranslationError::FormatError {
        format: format.to_owned(),
        property: property.name.clone(),
        value_type: property.value_type.name(),
    }
}

fn property_name(property: Option<&PropertyMetadata>) -> &str {
    property.map_or("<unmapped>", |p| p.name.as_str())
}
