//! Monster entity - a regular enemy definition

use serde::{Deserialize, Serialize};

use crate::validation::{require_glyph, require_non_empty, require_range, Validate};
use crate::value_objects::{Color, ElementType};
use crate::DomainError;

/// A regular enemy, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub name: String,
    /// Drawn on the map; renderers use the first character
    #[serde(rename = "char")]
    pub glyph: String,
    /// Power tier, 1..=3
    pub level: i64,
    pub color: Color,
    pub type1: ElementType,
    #[serde(default)]
    pub type2: Option<ElementType>,
    pub attack_type: ElementType,
    pub description: String,
    /// Message shown when the monster first comes into view
    pub seen: String,
    /// Message shown when the monster attacks
    pub attack: String,
    /// Message shown when the monster dies
    pub death: String,
    pub ranged: bool,
    /// Movement rating, 1..=3
    pub speed: i64,
}

impl Validate for Monster {
    fn validate(&self) -> Result<(), DomainError> {
        let check = || -> Result<(), DomainError> {
            require_non_empty(&self.name, "name")?;
            require_glyph(&self.glyph, "char")?;
            require_range(self.level, 1, 3, "level")?;
            require_range(self.speed, 1, 3, "speed")
        };
        check().map_err(|e| e.in_context(format!("monster '{}'", self.name)))
    }
}
