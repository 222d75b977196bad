//! Machine-readable descriptions of the records the model is asked to emit.
//!
//! The schemas are embedded in prompts, so they describe the wire names
//! (`char`, `type`, `mapgen`) rather than the Rust field names.

use roguegen_domain::{
    Area, Boss, Character, Color, EditOperation, ElementType, Item, ItemKind, MapStyle, Monster,
};
use serde_json::{json, Value};

/// A record type that can describe its own JSON shape to the model.
pub trait RecordSchema {
    /// Short name used in log lines.
    const NAME: &'static str;

    fn json_schema() -> Value;
}

fn string_list() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn element_types() -> Value {
    json!({
        "type": "string",
        "enum": ElementType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
    })
}

fn colors() -> Value {
    json!({
        "type": "string",
        "enum": Color::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
    })
}

fn level(description: &str) -> Value {
    json!({ "type": "integer", "minimum": 1, "maximum": 3, "description": description })
}

impl RecordSchema for Area {
    const NAME: &'static str = "area";

    fn json_schema() -> Value {
        json!({
            "title": "Area",
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "blurb": {
                    "type": "string",
                    "description": "A moody message presented to the player on entering the level",
                },
                "mapgen": {
                    "type": "string",
                    "enum": MapStyle::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
                },
                "enemies": string_list(),
                "equipment": string_list(),
                "melee_weapons": string_list(),
                "ranged_weapons": string_list(),
                "food": string_list(),
            },
            "required": [
                "name", "blurb", "mapgen", "enemies", "equipment",
                "melee_weapons", "ranged_weapons", "food",
            ],
        })
    }
}

impl RecordSchema for Monster {
    const NAME: &'static str = "monster";

    fn json_schema() -> Value {
        json!({
            "title": "Monster",
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "char": { "type": "string", "minLength": 1, "maxLength": 1 },
                "level": level("How powerful the monster is"),
                "color": colors(),
                "type1": element_types(),
                "type2": { "anyOf": [element_types(), { "type": "null" }] },
                "attack_type": element_types(),
                "description": { "type": "string" },
                "seen": { "type": "string" },
                "attack": { "type": "string" },
                "death": { "type": "string" },
                "ranged": { "type": "boolean" },
                "speed": level("How fast the monster is"),
            },
            "required": [
                "name", "char", "level", "color", "type1", "attack_type",
                "description", "seen", "attack", "death", "ranged", "speed",
            ],
        })
    }
}

impl RecordSchema for Item {
    const NAME: &'static str = "item";

    fn json_schema() -> Value {
        json!({
            "title": "Item",
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "level": { "type": "integer", "minimum": 1 },
                "type": element_types(),
                "description": { "type": "string" },
                "kind": {
                    "type": "string",
                    "enum": ItemKind::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
                },
            },
            "required": ["name", "level", "type", "description", "kind"],
        })
    }
}

impl RecordSchema for Boss {
    const NAME: &'static str = "boss";

    fn json_schema() -> Value {
        json!({
            "title": "Boss",
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "char": { "type": "string", "minLength": 1, "maxLength": 1 },
                "color": colors(),
                "type1": element_types(),
                "type2": { "anyOf": [element_types(), { "type": "null" }] },
                "attack_type": element_types(),
                "description": { "type": "string" },
                "intro_message": { "type": "string" },
                "attack_messages": string_list(),
                "periodic_messages": string_list(),
                "game_victory_paragraph": { "type": "string" },
            },
            "required": [
                "name", "char", "color", "type1", "attack_type", "description",
                "intro_message", "attack_messages", "periodic_messages",
                "game_victory_paragraph",
            ],
        })
    }
}

impl RecordSchema for Character {
    const NAME: &'static str = "character";

    fn json_schema() -> Value {
        json!({
            "title": "Character",
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "backstory": { "type": "string" },
                "starting_items": string_list(),
            },
            "required": ["name", "backstory", "starting_items"],
        })
    }
}

impl RecordSchema for EditOperation {
    const NAME: &'static str = "edit";

    fn json_schema() -> Value {
        json!({
            "title": "EditOperation",
            "description": "Populate exactly one field per edit",
            "type": "object",
            "properties": {
                "set_setting_desc": {
                    "type": "string",
                    "description": "Several player-facing paragraphs introducing the setting and tone",
                },
                "add_area": Area::json_schema(),
                "add_monster_def": Monster::json_schema(),
                "add_item_def": Item::json_schema(),
                "set_boss": Boss::json_schema(),
                "add_character": Character::json_schema(),
            },
            "minProperties": 1,
        })
    }
}
