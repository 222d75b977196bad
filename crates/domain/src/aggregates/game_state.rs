//! GameState aggregate - all generated content for one session

use serde::{Deserialize, Serialize};

use crate::edit_operation::EditOperation;
use crate::entities::{Area, Boss, Character, Item, Monster};
use crate::events::GameStateEvent;
use crate::requirements::{missing_requirements, Requirement};
use crate::validation::{require_non_empty, require_unique, Validate};
use crate::DomainError;

/// The mutable document the generator converges.
///
/// Area, monster and item names are keys within their lists. Adding a record
/// whose name is already present replaces the existing record in place
/// (last write wins); otherwise the record is appended. Characters are always
/// appended.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameState {
    theme: String,
    #[serde(default)]
    setting_desc: Option<String>,
    #[serde(default)]
    areas: Vec<Area>,
    #[serde(default)]
    monsters: Vec<Monster>,
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    boss: Option<Boss>,
    #[serde(default)]
    characters: Vec<Character>,
}

enum Upsert {
    Inserted,
    Replaced,
}

fn upsert_by_name<T>(records: &mut Vec<T>, record: T, name: impl Fn(&T) -> &str) -> Upsert {
    match records.iter().position(|existing| name(existing) == name(&record)) {
        Some(index) => {
            records[index] = record;
            Upsert::Replaced
        }
        None => {
            records.push(record);
            Upsert::Inserted
        }
    }
}

impl GameState {
    /// An otherwise-empty game for `theme`.
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            ..Self::default()
        }
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn setting_desc(&self) -> Option<&str> {
        self.setting_desc.as_deref()
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn monsters(&self) -> &[Monster] {
        &self.monsters
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn boss(&self) -> Option<&Boss> {
        self.boss.as_ref()
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn area(&self, name: &str) -> Option<&Area> {
        self.areas.iter().find(|area| area.name == name)
    }

    pub fn monster(&self, name: &str) -> Option<&Monster> {
        self.monsters.iter().find(|monster| monster.name == name)
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.name == name)
    }

    /// True when nothing has been generated yet.
    pub fn is_blank(&self) -> bool {
        self.setting_desc.is_none()
            && self.areas.is_empty()
            && self.monsters.is_empty()
            && self.items.is_empty()
            && self.boss.is_none()
            && self.characters.is_empty()
    }

    /// Content still missing before the game is playable.
    pub fn missing_requirements(&self) -> Vec<Requirement> {
        missing_requirements(self)
    }

    pub fn is_complete(&self) -> bool {
        self.missing_requirements().is_empty()
    }

    /// Apply one edit. Each populated field takes effect independently.
    pub fn apply(&mut self, edit: EditOperation) -> Vec<GameStateEvent> {
        let mut events = Vec::new();

        if let Some(text) = edit.set_setting_desc {
            if !text.trim().is_empty() {
                self.setting_desc = Some(text);
                events.push(GameStateEvent::SettingDescriptionSet);
            }
        }

        if let Some(area) = edit.add_area {
            let name = area.name.clone();
            events.push(match upsert_by_name(&mut self.areas, area, |a| &a.name) {
                Upsert::Inserted => GameStateEvent::AreaAdded { name },
                Upsert::Replaced => GameStateEvent::AreaReplaced { name },
            });
        }

        if let Some(monster) = edit.add_monster_def {
            let name = monster.name.clone();
            events.push(match upsert_by_name(&mut self.monsters, monster, |m| &m.name) {
                Upsert::Inserted => GameStateEvent::MonsterDefined { name },
                Upsert::Replaced => GameStateEvent::MonsterReplaced { name },
            });
        }

        if let Some(item) = edit.add_item_def {
            let name = item.name.clone();
            events.push(match upsert_by_name(&mut self.items, item, |i| &i.name) {
                Upsert::Inserted => GameStateEvent::ItemDefined { name },
                Upsert::Replaced => GameStateEvent::ItemReplaced { name },
            });
        }

        if let Some(boss) = edit.set_boss {
            let name = boss.name.clone();
            self.boss = Some(boss);
            events.push(GameStateEvent::BossSet { name });
        }

        if let Some(character) = edit.add_character {
            let name = character.name.clone();
            self.characters.push(character);
            events.push(GameStateEvent::CharacterAdded { name });
        }

        events
    }

    /// Decompose the state into the edits that rebuild it from `GameState::new(theme)`.
    pub fn to_edits(&self) -> Vec<EditOperation> {
        let mut edits = Vec::new();
        if let Some(text) = &self.setting_desc {
            edits.push(EditOperation::setting_description(text.clone()));
        }
        edits.extend(self.areas.iter().cloned().map(EditOperation::area));
        edits.extend(self.monsters.iter().cloned().map(EditOperation::monster));
        edits.extend(self.items.iter().cloned().map(EditOperation::item));
        if let Some(boss) = &self.boss {
            edits.push(EditOperation::boss(boss.clone()));
        }
        edits.extend(self.characters.iter().cloned().map(EditOperation::character));
        edits
    }
}

impl Validate for GameState {
    fn validate(&self) -> Result<(), DomainError> {
        require_non_empty(&self.theme, "theme")?;
        if let Some(text) = &self.setting_desc {
            require_non_empty(text, "setting_desc")?;
        }
        for area in &self.areas {
            area.validate()?;
        }
        for monster in &self.monsters {
            monster.validate()?;
        }
        for item in &self.items {
            item.validate()?;
        }
        if let Some(boss) = &self.boss {
            boss.validate()?;
        }
        for character in &self.characters {
            character.validate()?;
        }
        require_unique(self.areas.iter().map(|a| a.name.as_str()), "area")?;
        require_unique(self.monsters.iter().map(|m| m.name.as_str()), "monster")?;
        require_unique(self.items.iter().map(|i| i.name.as_str()), "item")?;
        Ok(())
    }
}
