//! Domain events returned from game state mutations.

use serde::Serialize;

/// What a single applied edit changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameStateEvent {
    SettingDescriptionSet,
    AreaAdded { name: String },
    AreaReplaced { name: String },
    MonsterDefined { name: String },
    MonsterReplaced { name: String },
    ItemDefined { name: String },
    ItemReplaced { name: String },
    BossSet { name: String },
    CharacterAdded { name: String },
}
