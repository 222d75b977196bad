//! Boss entity - the single final enemy

use serde::{Deserialize, Serialize};

use crate::validation::{require_glyph, require_non_empty, Validate};
use crate::value_objects::{Color, ElementType};
use crate::DomainError;

/// The final boss. A game has at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boss {
    pub name: String,
    #[serde(rename = "char")]
    pub glyph: String,
    pub color: Color,
    pub type1: ElementType,
    #[serde(default)]
    pub type2: Option<ElementType>,
    pub attack_type: ElementType,
    pub description: String,
    pub intro_message: String,
    /// Randomly sampled when the boss attacks
    pub attack_messages: Vec<String>,
    /// Randomly sampled while the boss is on the level
    pub periodic_messages: Vec<String>,
    pub game_victory_paragraph: String,
}

impl Validate for Boss {
    fn validate(&self) -> Result<(), DomainError> {
        let check = || -> Result<(), DomainError> {
            require_non_empty(&self.name, "name")?;
            require_glyph(&self.glyph, "char")?;
            require_non_empty(&self.game_victory_paragraph, "game_victory_paragraph")
        };
        check().map_err(|e| e.in_context(format!("boss '{}'", self.name)))
    }
}
