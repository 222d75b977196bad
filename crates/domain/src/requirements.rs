//! Requirement analysis - what a game still needs before it is playable
//!
//! Pure function of the state. The analyzer never mutates anything, and
//! applying edits can only shrink (or keep) the list for any requirement that
//! an edit satisfies.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::aggregates::GameState;

/// Number of areas a complete game has.
pub const REQUIRED_AREAS: usize = 3;

/// Number of starting characters a complete game offers.
pub const REQUIRED_CHARACTERS: usize = 3;

/// One unmet content requirement.
///
/// `Display` renders the human-readable bullet that is fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    SettingDescription,
    Areas { have: usize },
    MonsterDefinition { name: String },
    ItemDefinition { name: String },
    Boss,
    Characters { have: usize },
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SettingDescription => write!(f, "a setting description"),
            Self::Areas { have } => {
                write!(f, "{REQUIRED_AREAS} areas in total (currently {have})")
            }
            Self::MonsterDefinition { name } => write!(f, "a monster definition for {name}"),
            Self::ItemDefinition { name } => write!(f, "an item definition for {name}"),
            Self::Boss => write!(f, "a boss"),
            Self::Characters { have } => write!(
                f,
                "{REQUIRED_CHARACTERS} starting characters in total (currently {have})"
            ),
        }
    }
}

/// List every unmet requirement of `state`, in a stable order:
/// setting, areas, undefined monsters, undefined items, boss, characters.
///
/// Dangling references are reported once each, in the order they are first
/// seen. Item references are collected from areas first, then from starting
/// inventories.
pub fn missing_requirements(state: &GameState) -> Vec<Requirement> {
    let mut missing = Vec::new();

    if state.setting_desc().map_or(true, |text| text.trim().is_empty()) {
        missing.push(Requirement::SettingDescription);
    }

    if state.areas().len() < REQUIRED_AREAS {
        missing.push(Requirement::Areas {
            have: state.areas().len(),
        });
    }

    let mut seen = HashSet::new();
    for name in state.areas().iter().flat_map(|area| area.enemies.iter()) {
        if state.monster(name).is_none() && seen.insert(name.as_str()) {
            missing.push(Requirement::MonsterDefinition { name: name.clone() });
        }
    }

    let mut seen = HashSet::new();
    let item_refs = state
        .areas()
        .iter()
        .flat_map(|area| area.item_names())
        .chain(
            state
                .characters()
                .iter()
                .flat_map(|character| character.starting_items.iter().map(String::as_str)),
        );
    for name in item_refs {
        if state.item(name).is_none() && seen.insert(name) {
            missing.push(Requirement::ItemDefinition {
                name: name.to_string(),
            });
        }
    }

    if state.boss().is_none() {
        missing.push(Requirement::Boss);
    }

    if state.characters().len() < REQUIRED_CHARACTERS {
        missing.push(Requirement::Characters {
            have: state.characters().len(),
        });
    }

    missing
}
