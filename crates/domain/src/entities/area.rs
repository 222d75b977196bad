//! Area entity - one dungeon level

use serde::{Deserialize, Serialize};

use crate::validation::{require_names, require_non_empty, Validate};
use crate::value_objects::MapStyle;
use crate::DomainError;

/// One dungeon level.
///
/// The name lists are references by name into the game's monster and item
/// definitions. An area may be stored while those references dangle; closing
/// them is what the requirement analysis drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    /// Unique key within the game's area list
    pub name: String,
    /// Moody message shown when the player enters the level
    pub blurb: String,
    #[serde(rename = "mapgen")]
    pub map_style: MapStyle,
    pub enemies: Vec<String>,
    /// Armor and accessories
    pub equipment: Vec<String>,
    pub melee_weapons: Vec<String>,
    pub ranged_weapons: Vec<String>,
    pub food: Vec<String>,
}

impl Area {
    /// Every item name this area references, in list order:
    /// equipment, melee weapons, ranged weapons, food.
    pub fn item_names(&self) -> impl Iterator<Item = &str> {
        self.equipment
            .iter()
            .chain(&self.melee_weapons)
            .chain(&self.ranged_weapons)
            .chain(&self.food)
            .map(String::as_str)
    }
}

impl Validate for Area {
    fn validate(&self) -> Result<(), DomainError> {
        let check = || -> Result<(), DomainError> {
            require_non_empty(&self.name, "name")?;
            require_names(&self.enemies, "enemies")?;
            require_names(&self.equipment, "equipment")?;
            require_names(&self.melee_weapons, "melee_weapons")?;
            require_names(&self.ranged_weapons, "ranged_weapons")?;
            require_names(&self.food, "food")
        };
        check().map_err(|e| e.in_context(format!("area '{}'", self.name)))
    }
}
