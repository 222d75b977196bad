//! Test fixtures and scripted gateways shared by the engine's unit tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_fixtures::{pregen_state, ScriptedLlm};
//!
//! #[tokio::test]
//! async fn test_seed_applies_edits() {
//!     let llm = ScriptedLlm::texts([edit_lines(&pregen_state().to_edits())]);
//!     // ... test logic
//! }
//! ```

mod scripted_llm;

pub use scripted_llm::{RequirementAnsweringLlm, ScriptedLlm};

use roguegen_domain::{
    Area, Color, EditOperation, ElementType, GameState, Item, ItemKind, MapStyle, Monster,
};

// =============================================================================
// Fixture Loading
// =============================================================================

/// The bundled complete Pirates game from `data/pregen.json`.
///
/// # Panics
///
/// Panics if the bundled fixture does not parse.
pub fn pregen_state() -> GameState {
    let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/pregen.json"));
    serde_json::from_str(content)
        .unwrap_or_else(|e| panic!("Failed to parse bundled pregen.json: {e}"))
}

/// Serialize edits as a JSON Lines response body.
pub fn edit_lines(edits: &[EditOperation]) -> String {
    edits
        .iter()
        .map(|edit| serde_json::to_string(edit).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Record Builders
// =============================================================================

pub fn area(name: &str, enemies: &[&str], items: &[&str]) -> Area {
    Area {
        name: name.to_string(),
        blurb: format!("You arrive at {name}."),
        map_style: MapStyle::Caves,
        enemies: enemies.iter().map(ToString::to_string).collect(),
        equipment: items.iter().map(ToString::to_string).collect(),
        melee_weapons: Vec::new(),
        ranged_weapons: Vec::new(),
        food: Vec::new(),
    }
}

pub fn monster(name: &str) -> Monster {
    Monster {
        name: name.to_string(),
        glyph: "m".to_string(),
        level: 1,
        color: Color::Red,
        type1: ElementType::Normal,
        type2: None,
        attack_type: ElementType::Normal,
        description: format!("A {name}."),
        seen: "It sees you.".to_string(),
        attack: "It attacks.".to_string(),
        death: "It dies.".to_string(),
        ranged: false,
        speed: 2,
    }
}

pub fn item(name: &str, level: i64, kind: ItemKind) -> Item {
    Item {
        name: name.to_string(),
        level,
        element: ElementType::Steel,
        description: format!("A {name}."),
        kind,
    }
}
