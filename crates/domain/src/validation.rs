//! Field-level validation helpers shared by every content record.

use std::collections::HashSet;

use crate::DomainError;

/// Contract for records that arrive from an untrusted generator.
///
/// Deserialization only proves the JSON had the right shape; `validate`
/// enforces the content rules on top of it.
pub trait Validate {
    fn validate(&self) -> Result<(), DomainError>;
}

/// Validate a string is non-empty after trimming.
pub fn require_non_empty(value: &str, field_name: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field_name} cannot be empty")));
    }
    Ok(())
}

/// Validate a numeric rating lies within an inclusive range.
pub fn require_range(
    value: i64,
    min: i64,
    max: i64,
    field_name: &'static str,
) -> Result<(), DomainError> {
    if value < min || value > max {
        return Err(DomainError::validation(format!(
            "{field_name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

/// Validate a glyph has something visible to draw.
///
/// Renderers draw the first character, so multi-codepoint glyphs such as an
/// emoji with a variation selector are accepted as is.
pub fn require_glyph(value: &str, field_name: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!(
            "{field_name} must not be blank, got {value:?}"
        )));
    }
    Ok(())
}

/// Validate that every entry of a name list is non-empty.
pub fn require_names(names: &[String], field_name: &'static str) -> Result<(), DomainError> {
    if names.iter().any(|name| name.trim().is_empty()) {
        return Err(DomainError::validation(format!(
            "{field_name} contains an empty name"
        )));
    }
    Ok(())
}

/// Validate that names are unique within one entity list.
pub fn require_unique<'a>(
    names: impl IntoIterator<Item = &'a str>,
    entity_type: &'static str,
) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(DomainError::validation(format!(
                "duplicate {entity_type} name: {name}"
            )));
        }
    }
    Ok(())
}
