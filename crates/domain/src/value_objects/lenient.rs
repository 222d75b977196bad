//! Lenient decoding for closed vocabularies.
//!
//! Generated content routinely names colors and types that are not in the
//! palette. Those values are replaced by the vocabulary's default instead of
//! failing the whole record.

use std::str::FromStr;

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// Deserialize `T` from any JSON value, substituting `T::default()` when the
/// value is not a string or does not name a known variant.
pub(crate) fn deserialize_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let parsed = match RawValue::deserialize(deserializer)? {
        RawValue::Text(text) => text.trim().to_ascii_lowercase().parse().ok(),
        RawValue::Other(_) => None,
    };
    Ok(parsed.unwrap_or_default())
}
