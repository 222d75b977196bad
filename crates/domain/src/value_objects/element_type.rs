//! Elemental type vocabulary used for monsters, bosses, items and attacks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::lenient::deserialize_or_default;
use crate::DomainError;

/// Elemental affinity. Drives the damage matrix in the game client.
///
/// Deserialization is lenient: unknown types become [`ElementType::Normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    #[default]
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl ElementType {
    pub const ALL: [ElementType; 18] = [
        ElementType::Normal,
        ElementType::Fire,
        ElementType::Water,
        ElementType::Electric,
        ElementType::Grass,
        ElementType::Ice,
        ElementType::Fighting,
        ElementType::Poison,
        ElementType::Ground,
        ElementType::Flying,
        ElementType::Psychic,
        ElementType::Bug,
        ElementType::Rock,
        ElementType::Ghost,
        ElementType::Dragon,
        ElementType::Dark,
        ElementType::Steel,
        ElementType::Fairy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Normal => "normal",
            ElementType::Fire => "fire",
            ElementType::Water => "water",
            ElementType::Electric => "electric",
            ElementType::Grass => "grass",
            ElementType::Ice => "ice",
            ElementType::Fighting => "fighting",
            ElementType::Poison => "poison",
            ElementType::Ground => "ground",
            ElementType::Flying => "flying",
            ElementType::Psychic => "psychic",
            ElementType::Bug => "bug",
            ElementType::Rock => "rock",
            ElementType::Ghost => "ghost",
            ElementType::Dragon => "dragon",
            ElementType::Dark => "dark",
            ElementType::Steel => "steel",
            ElementType::Fairy => "fairy",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementType::ALL
            .into_iter()
            .find(|element| element.as_str() == s)
            .ok_or_else(|| DomainError::parse(format!("unknown element type: {s}")))
    }
}

impl<'de> Deserialize<'de> for ElementType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_or_default(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_coerced_to_normal() {
        let element: ElementType = serde_json::from_str("\"cosmic\"").unwrap();
        assert_eq!(element, ElementType::Normal);
    }

    #[test]
    fn optional_type_keeps_null_as_none() {
        let element: Option<ElementType> = serde_json::from_str("null").unwrap();
        assert_eq!(element, None);

        let element: Option<ElementType> = serde_json::from_str("\"laser\"").unwrap();
        assert_eq!(element, Some(ElementType::Normal));
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ElementType::Psychic).unwrap(), "\"psychic\"");
    }
}
