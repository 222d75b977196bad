//! Item entity - equipment, weapons and food

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validation::{require_non_empty, Validate};
use crate::value_objects::ElementType;
use crate::DomainError;

/// Which slot or use an item has in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Armor,
    MeleeWeapon,
    RangedWeapon,
    Food,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Armor,
        ItemKind::MeleeWeapon,
        ItemKind::RangedWeapon,
        ItemKind::Food,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Armor => "armor",
            ItemKind::MeleeWeapon => "melee_weapon",
            ItemKind::RangedWeapon => "ranged_weapon",
            ItemKind::Food => "food",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item definition, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    /// Power tier. Crafted items may exceed the regular 1..=3 band.
    pub level: i64,
    #[serde(rename = "type")]
    pub element: ElementType,
    pub description: String,
    pub kind: ItemKind,
}

impl Validate for Item {
    fn validate(&self) -> Result<(), DomainError> {
        let check = || -> Result<(), DomainError> {
            require_non_empty(&self.name, "name")?;
            if self.level < 1 {
                return Err(DomainError::validation(format!(
                    "level must be at least 1, got {}",
                    self.level
                )));
            }
            Ok(())
        };
        check().map_err(|e| e.in_context(format!("item '{}'", self.name)))
    }
}
