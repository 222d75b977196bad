//! Prompt text for the edit-driven generators.

use roguegen_domain::{
    Color, EditOperation, ElementType, GameState, MapStyle, Requirement, REQUIRED_AREAS,
    REQUIRED_CHARACTERS,
};

use super::schema::RecordSchema;

/// Instruction for the first request of a session on an empty game.
pub const SEED_INSTRUCTION: &str = "Generate everything";

pub(super) fn joined<T>(values: &[T], name: impl Fn(&T) -> &'static str) -> String {
    values.iter().map(name).collect::<Vec<_>>().join(" ")
}

/// Fixed game mechanics and content quotas shared by every edit request.
pub fn system_prompt() -> String {
    format!(
        "You are the game master for a difficult permadeath roguelike with a crafting system. \
The game has {areas} levels followed by a special final level that holds only the boss. \
Players pick one of the starting characters, fight with melee and ranged weapons, wear armor, \
eat food to heal, and may combine any two items of the same level into a new item one level higher.\n\
\n\
Content quotas:\n\
- exactly {areas} areas\n\
- each area lists at least 5 enemies, 5 pieces of equipment (armor or accessories), \
3 melee weapons, 2 ranged weapons and 3 food items, all referenced by name\n\
- every enemy name used by an area needs a monster definition, and every item name used by \
an area or a character needs an item definition\n\
- one final boss\n\
- at least {characters} starting characters, each starting with 5 items: at least one armor \
and exactly one melee weapon\n\
\n\
Monster and item levels and monster speeds are numbers from 1 to 3. \
Valid types are pokemon types, i.e. one of: {types}. \
Valid colors are: {colors}. \
Valid map generators are: {maps}. \
Descriptions focus on appearance and lore, never on gameplay mechanics.",
        areas = REQUIRED_AREAS,
        characters = REQUIRED_CHARACTERS,
        types = joined(&ElementType::ALL, ElementType::as_str),
        colors = joined(&Color::ALL, Color::as_str),
        maps = joined(&MapStyle::ALL, MapStyle::as_str),
    )
}

/// Turn analyzer output into a bulleted instruction.
pub fn requirements_instruction(requirements: &[Requirement]) -> String {
    let mut instruction = String::from("The game is still missing:\n");
    for requirement in requirements {
        instruction.push_str("- ");
        instruction.push_str(&requirement.to_string());
        instruction.push('\n');
    }
    instruction.push_str("Add exactly what is listed. Do not rename or remove existing content.");
    instruction
}

/// The big-prompt request body: current game, edit schema and instruction.
///
/// Edits are requested as JSON Lines so a streamed response can be applied
/// line by line as it arrives.
pub fn edit_prompt(state: &GameState, instruction: &str) -> String {
    let state_json = serde_json::to_string(state).unwrap_or_default();
    let schema = EditOperation::json_schema().to_string();
    format!(
        "Current game state:\n{state_json}\n\
--\n\
Each edit is a JSON object matching this schema: {schema}\n\
--\n\
Instruction: {instruction}\n\
--\n\
Respond with one compact JSON edit per line and nothing else: no markdown fences, \
no commentary, no blank lines. Populate exactly one field in each edit."
    )
}
