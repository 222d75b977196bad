//! EditOperation - one proposed change to a game, as emitted by the generator
//!
//! On the wire this is a sparse record: every field is optional and normally
//! exactly one is populated. An operation carrying several fields applies each
//! of them independently.

use serde::{Deserialize, Serialize};

use crate::entities::{Area, Boss, Character, Item, Monster};
use crate::validation::{require_non_empty, Validate};
use crate::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditOperation {
    /// Several player-facing paragraphs introducing the setting and tone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_setting_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_area: Option<Area>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_monster_def: Option<Monster>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_item_def: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_boss: Option<Boss>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_character: Option<Character>,
}

impl EditOperation {
    pub fn setting_description(text: impl Into<String>) -> Self {
        Self {
            set_setting_desc: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn area(area: Area) -> Self {
        Self {
            add_area: Some(area),
            ..Self::default()
        }
    }

    pub fn monster(monster: Monster) -> Self {
        Self {
            add_monster_def: Some(monster),
            ..Self::default()
        }
    }

    pub fn item(item: Item) -> Self {
        Self {
            add_item_def: Some(item),
            ..Self::default()
        }
    }

    pub fn boss(boss: Boss) -> Self {
        Self {
            set_boss: Some(boss),
            ..Self::default()
        }
    }

    pub fn character(character: Character) -> Self {
        Self {
            add_character: Some(character),
            ..Self::default()
        }
    }

    /// True when no field is populated.
    pub fn is_empty(&self) -> bool {
        self.set_setting_desc.is_none()
            && self.add_area.is_none()
            && self.add_monster_def.is_none()
            && self.add_item_def.is_none()
            && self.set_boss.is_none()
            && self.add_character.is_none()
    }
}

impl Validate for EditOperation {
    fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::validation("edit operation has no populated field"));
        }
        if let Some(text) = &self.set_setting_desc {
            require_non_empty(text, "set_setting_desc")?;
        }
        if let Some(area) = &self.add_area {
            area.validate()?;
        }
        if let Some(monster) = &self.add_monster_def {
            monster.validate()?;
        }
        if let Some(item) = &self.add_item_def {
            item.validate()?;
        }
        if let Some(boss) = &self.set_boss {
            boss.validate()?;
        }
        if let Some(character) = &self.add_character {
            character.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_only_populated_fields() {
        let edit = EditOperation::setting_description("Salt and smoke.");
        assert_eq!(
            serde_json::to_string(&edit).unwrap(),
            r#"{"set_setting_desc":"Salt and smoke."}"#
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let edit: EditOperation =
            serde_json::from_str(r#"{"set_setting_desc":"Fog.","comment":"hi"}"#).unwrap();
        assert_eq!(edit, EditOperation::setting_description("Fog."));
    }

    #[test]
    fn empty_operation_fails_validation() {
        let edit: EditOperation = serde_json::from_str("{}").unwrap();
        assert!(edit.is_empty());
        assert!(edit.validate().is_err());
    }

    #[test]
    fn blank_setting_description_fails_validation() {
        assert!(EditOperation::setting_description("   ").validate().is_err());
    }
}
