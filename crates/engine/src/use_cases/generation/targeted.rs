//! Targeted generators: one kind of record per request.
//!
//! These back the per-entity endpoints (setting, areas, monsters, items,
//! boss, crafting). Everything except the setting description goes through
//! structured extraction with few-shot examples from the fixture repository.
//! The `pregen` theme short-circuits every generator with fixture content.

use std::collections::BTreeSet;
use std::sync::Arc;

use roguegen_domain::{Area, Boss, Color, ElementType, Item, Monster, REQUIRED_AREAS};
use serde::Deserialize;
use serde_json::json;

use super::error::GenerationError;
use super::extraction::{ExtractionRequest, StructuredExtractor};
use super::prompt::joined;
use crate::infrastructure::fixtures::{ExampleSet, FewShotExample, FixtureRepository};
use crate::infrastructure::ports::{LlmPort, LlmRequest};

/// Theme that serves fixture content without calling the model.
pub const PREGEN_THEME: &str = "pregen";

pub fn is_pregen(theme: &str) -> bool {
    theme.trim().eq_ignore_ascii_case(PREGEN_THEME)
}

const GAME_MASTER: &str = "You are the game master for a difficult permadeath roguelike.";

fn type_rule() -> String {
    format!(
        "Valid types are pokemon types, i.e. one of: {}.",
        joined(&ElementType::ALL, ElementType::as_str)
    )
}

fn color_rule() -> String {
    format!("Valid colors are: {}.", joined(&Color::ALL, Color::as_str))
}

fn areas_instructions() -> String {
    format!(
        "{GAME_MASTER} Based on the provided theme and high-level setting description, produce \
JSON data describing the contents of each of the levels: name, blurb (a moody message presented \
to the user as they enter the level), mapgen (the map generation algorithm for this level, one \
of: 'simple_rooms_and_corridors', 'caves', 'hive', or 'dense_rooms'), names of 20 possible \
enemies, names of 5 pieces of equipment (i.e. armor or accessories), names of 3 melee weapons, \
names of 2 ranged weapons, and names of 3 food items that may be found on that level. DO NOT \
generate the final boss; the final boss will be on a special fourth level. Output each level \
JSON on its own line."
    )
}

fn monsters_instructions() -> String {
    format!(
        "{GAME_MASTER} For each input enemy name, output a JSON monster definition. {types} \
{colors} Output fields include name, the name of the monster; level, a number between 1 and 3 \
indicating how powerful the monster is; char, the single character to represent it as; color, \
one of the valid colors above; type1, the pokemon type of the monster; type2, an optional second \
type; attack_type, the type the creature attacks as; description, a two sentence description of \
the monster; seen, one sentence of narration or dialogue when the enemy sees the player; attack, \
one sentence of narration when the enemy attacks the player; death, one sentence of dialogue or \
narration when the enemy dies; ranged, whether the enemy performs ranged attacks; and speed, a \
number from 1 to 3 indicating how fast the enemy is. Output each monster JSON on its own line.",
        types = type_rule(),
        colors = color_rule(),
    )
}

fn items_instructions() -> String {
    format!(
        "{GAME_MASTER} Output JSON item definitions for each given item name. {types} \
Output fields include name, the name of the item; level, a number between 1 and 3 indicating \
how powerful the item is; type, the pokemon type of the equipment or weapon; kind, one of: \
melee_weapon ranged_weapon armor food; and description, a two sentence description of the item. \
Output each item JSON on its own line. DO NOT mention abilities or gameplay mechanics in the \
description; instead, focus on appearance or lore.",
        types = type_rule(),
    )
}

fn boss_instructions() -> String {
    format!(
        "{GAME_MASTER} Based on the provided theme and high-level setting description, produce \
JSON data describing the final boss of the game. The final boss is a slow enemy with a ranged \
attack that may appear with other monsters. {types} {colors} Output fields include name, \
the name of the boss; char, the single character to represent it as; color, one of the valid \
colors above; type1, the pokemon type of the boss; type2, an optional second type; attack_type, \
the type the boss attacks as; description, a two sentence description of the boss; \
intro_message, presented when the player encounters the boss; attack_messages, messages of which \
one is shown when the boss attacks; periodic_messages, messages shown randomly throughout the \
fight; and game_victory_paragraph, a long-form message presented when the boss is defeated and \
the game is won.",
        types = type_rule(),
        colors = color_rule(),
    )
}

fn craft_instructions() -> String {
    format!(
        "{GAME_MASTER} The game has a crafting system: the player may combine any two items in \
the game to create a third item. As input, you will be given a theme, a long-form description \
of the setting, descriptions of each item, and a list of items already in the game (do not copy \
any of these). Output a JSON item definition for the result. {types} DO NOT output \
multiple types. Output fields include name; level; type; kind, one of: melee_weapon \
ranged_weapon armor food; and description, a two sentence description of the item. Focus on \
appearance and lore. The two input items are the same level; the output item is one level \
higher, e.g. 2xL1->L2, 2xL2->L3.",
        types = type_rule(),
    )
}

fn setting_prompt(theme: &str) -> String {
    format!(
        "Write a two paragraph setting description for a roguelike game based off of the \
following theme: {theme}. The game has three levels and features melee attacks, ranged attacks, \
and crafting. The description should describe the setting and discuss the kinds of monsters, \
items, the setting of each level, and the final boss."
    )
}

/// Two items to combine, plus the context the model needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CraftRequest {
    pub theme: String,
    #[serde(default)]
    pub setting: String,
    /// Names already in the game, which the result must not copy
    #[serde(default)]
    pub items: Vec<String>,
    pub item1: Item,
    pub item2: Item,
}

/// Deterministic crafting result served for the `pregen` theme.
fn pregen_craft(first: &Item) -> Item {
    Item {
        name: "PREGEN".to_string(),
        level: first.level + 1,
        element: first.element,
        description: "who knows".to_string(),
        kind: first.kind,
    }
}

fn unique_names(names: &[String]) -> Vec<String> {
    let unique: BTreeSet<&str> = names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    unique.into_iter().map(str::to_string).collect()
}

pub struct TargetedGenerators {
    llm: Arc<dyn LlmPort>,
    extractor: StructuredExtractor,
    fixtures: Arc<FixtureRepository>,
}

impl TargetedGenerators {
    pub fn new(llm: Arc<dyn LlmPort>, fixtures: Arc<FixtureRepository>) -> Self {
        Self {
            extractor: StructuredExtractor::new(Arc::clone(&llm)),
            llm,
            fixtures,
        }
    }

    fn examples(&self, set: ExampleSet) -> &[FewShotExample] {
        self.fixtures
            .example(set)
            .map(std::slice::from_ref)
            .unwrap_or_default()
    }

    /// Plain-text setting description for `theme`.
    pub async fn setting_description(&self, theme: &str) -> Result<String, GenerationError> {
        if is_pregen(theme) {
            return Ok(self
                .fixtures
                .pregen()
                .setting_desc()
                .unwrap_or_default()
                .to_string());
        }

        let response = self
            .llm
            .generate(LlmRequest::prompt(setting_prompt(theme)).with_temperature(0.9))
            .await?;
        Ok(response.content.trim().to_string())
    }

    /// The three regular levels of the game.
    pub async fn areas(&self, theme: &str, setting: &str) -> Result<Vec<Area>, GenerationError> {
        if is_pregen(theme) {
            return Ok(self.fixtures.pregen().areas().to_vec());
        }

        let extracted = self
            .extractor
            .extract::<Area>(ExtractionRequest {
                instructions: &areas_instructions(),
                examples: self.examples(ExampleSet::Areas),
                input: json!({ "theme": theme, "setting_desc": setting }),
                expected_count: REQUIRED_AREAS,
            })
            .await?;

        if extracted.records.is_empty() {
            return Err(GenerationError::NoProgress {
                last_error: extracted.last_error(),
            });
        }
        let mut areas = extracted.records;
        areas.truncate(REQUIRED_AREAS);
        Ok(areas)
    }

    /// Monster definitions for `names`. Duplicate names are asked for once.
    pub async fn monsters(
        &self,
        theme: &str,
        setting: &str,
        names: &[String],
    ) -> Result<Vec<Monster>, GenerationError> {
        if is_pregen(theme) {
            return Ok(self.fixtures.pregen().monsters().to_vec());
        }
        let names = unique_names(names);
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let extracted = self
            .extractor
            .extract::<Monster>(ExtractionRequest {
                instructions: &monsters_instructions(),
                examples: self.examples(ExampleSet::Monsters),
                expected_count: names.len(),
                input: json!({ "theme": theme, "setting_desc": setting, "enemy_names": names }),
            })
            .await?;
        Ok(extracted.records)
    }

    /// Item definitions for `names`. Duplicate names are asked for once.
    pub async fn items(
        &self,
        theme: &str,
        setting: &str,
        names: &[String],
    ) -> Result<Vec<Item>, GenerationError> {
        if is_pregen(theme) {
            return Ok(self.fixtures.pregen().items().to_vec());
        }
        let names = unique_names(names);
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let extracted = self
            .extractor
            .extract::<Item>(ExtractionRequest {
                instructions: &items_instructions(),
                examples: self.examples(ExampleSet::Items),
                expected_count: names.len(),
                input: json!({ "theme": theme, "setting_desc": setting, "item_names": names }),
            })
            .await?;
        Ok(extracted.records)
    }

    pub async fn boss(&self, theme: &str, setting: &str) -> Result<Boss, GenerationError> {
        if is_pregen(theme) {
            return self
                .fixtures
                .pregen()
                .boss()
                .cloned()
                .ok_or(GenerationError::NoProgress { last_error: None });
        }

        let extracted = self
            .extractor
            .extract::<Boss>(ExtractionRequest {
                instructions: &boss_instructions(),
                examples: self.examples(ExampleSet::Boss),
                input: json!({ "theme": theme, "setting_desc": setting }),
                expected_count: 1,
            })
            .await?;

        let last_error = extracted.last_error();
        extracted
            .records
            .into_iter()
            .next()
            .ok_or(GenerationError::NoProgress { last_error })
    }

    /// Combine two items into a new one, one level higher.
    pub async fn craft(&self, request: &CraftRequest) -> Result<Item, GenerationError> {
        if is_pregen(&request.theme) {
            return Ok(pregen_craft(&request.item1));
        }

        let extracted = self
            .extractor
            .extract::<Item>(ExtractionRequest {
                instructions: &craft_instructions(),
                examples: &[],
                input: json!({
                    "theme": request.theme,
                    "setting_desc": request.setting,
                    "existing_items": request.items,
                    "item1": request.item1,
                    "item2": request.item2,
                }),
                expected_count: 1,
            })
            .await?;

        let last_error = extracted.last_error();
        let item = extracted
            .records
            .into_iter()
            .next()
            .ok_or(GenerationError::NoProgress { last_error })?;
        tracing::info!(
            item1 = %request.item1.name,
            item2 = %request.item2.name,
            result = %item.name,
            "Crafted item"
        );
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{LlmResponse, MockLlmPort};
    use crate::test_fixtures::{item, pregen_state, ScriptedLlm};
    use roguegen_domain::{ElementType, ItemKind};

    fn fixtures() -> Arc<FixtureRepository> {
        Arc::new(FixtureRepository::from_pregen(pregen_state()).unwrap())
    }

    fn json_lines<T: serde::Serialize>(records: &[T]) -> String {
        records
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn pregen_never_calls_the_model() {
        // No expectations: any call panics.
        let generators = TargetedGenerators::new(Arc::new(MockLlmPort::new()), fixtures());

        assert!(!generators.setting_description("pregen").await.unwrap().is_empty());
        assert_eq!(generators.areas("pregen", "").await.unwrap().len(), 3);
        assert_eq!(generators.boss("PREGEN", "").await.unwrap().name, "Captain Blackbrine");
        assert!(!generators.items("pregen", "", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pregen_craft_is_deterministic() {
        let generators = TargetedGenerators::new(Arc::new(MockLlmPort::new()), fixtures());
        let request = CraftRequest {
            theme: "pregen".into(),
            setting: String::new(),
            items: Vec::new(),
            item1: item("Rusty Cutlass", 1, ItemKind::MeleeWeapon),
            item2: item("Hardtack", 1, ItemKind::Food),
        };

        let crafted = generators.craft(&request).await.unwrap();

        assert_eq!(crafted.name, "PREGEN");
        assert_eq!(crafted.level, 2);
        assert_eq!(crafted.element, ElementType::Steel);
        assert_eq!(crafted.kind, ItemKind::MeleeWeapon);
        assert_eq!(crafted.description, "who knows");
    }

    #[tokio::test]
    async fn areas_use_fixture_examples_and_keep_three() {
        let mut areas = pregen_state().areas().to_vec();
        let mut extra = areas[0].clone();
        extra.name = "Bonus Lagoon".into();
        areas.push(extra);
        let llm = Arc::new(ScriptedLlm::texts([json_lines(&areas)]));
        let generators = TargetedGenerators::new(llm.clone(), fixtures());

        let result = generators.areas("Vikings", "Longships and ice.").await.unwrap();

        assert_eq!(result.len(), 3);
        let prompt = &llm.requests()[0].messages[0].content;
        assert!(prompt.contains("Smuggler's Cove"), "few-shot example missing");
        assert!(prompt.contains("\"theme\":\"Vikings\""));
    }

    #[tokio::test]
    async fn monsters_ask_for_each_unique_name_once() {
        let llm = Arc::new(ScriptedLlm::texts([json_lines(&pregen_state().monsters()[..2])]));
        let generators = TargetedGenerators::new(llm.clone(), fixtures());
        let names = vec!["Bilge Rat".to_string(), "Cutpurse Gull".into(), "Bilge Rat".into()];

        let monsters = generators.monsters("Pirates", "", &names).await.unwrap();

        assert_eq!(monsters.len(), 2);
        let prompt = &llm.requests()[0].messages[0].content;
        assert!(prompt.contains(r#""enemy_names":["Bilge Rat","Cutpurse Gull"]"#));
        assert!(prompt.contains(r#""num_outputs":2"#));
    }

    #[tokio::test]
    async fn no_names_means_no_request() {
        let generators = TargetedGenerators::new(Arc::new(MockLlmPort::new()), fixtures());
        assert!(generators.items("Pirates", "", &[" ".into()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn boss_without_a_valid_line_is_no_progress() {
        let llm = Arc::new(ScriptedLlm::texts(["{\"name\": \"Kraken\"}"]));
        let generators = TargetedGenerators::new(llm, fixtures());

        let err = generators.boss("Pirates", "").await.unwrap_err();

        assert!(matches!(err, GenerationError::NoProgress { last_error: Some(_) }));
    }

    #[tokio::test]
    async fn craft_sends_both_items_and_existing_names() {
        let result = item("Barnacle Blade", 2, ItemKind::MeleeWeapon);
        let line = serde_json::to_string(&result).unwrap();
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .withf(|request| {
                let prompt = &request.messages[0].content;
                prompt.contains("\"existing_items\":[\"Hardtack\"]")
                    && prompt.contains("Rusty Cutlass")
                    && prompt.contains("Boarding Axe")
            })
            .times(1)
            .returning(move |_| Ok(LlmResponse::text(line.clone())));
        let generators = TargetedGenerators::new(Arc::new(llm), fixtures());

        let crafted = generators
            .craft(&CraftRequest {
                theme: "Pirates".into(),
                setting: "Storms.".into(),
                items: vec!["Hardtack".into()],
                item1: item("Rusty Cutlass", 1, ItemKind::MeleeWeapon),
                item2: item("Boarding Axe", 1, ItemKind::MeleeWeapon),
            })
            .await
            .unwrap();

        assert_eq!(crafted, result);
    }

    #[tokio::test]
    async fn setting_description_is_trimmed_text() {
        let llm = Arc::new(ScriptedLlm::texts(["\n  Fog rolls over the Main.  \n"]));
        let generators = TargetedGenerators::new(llm.clone(), fixtures());

        let text = generators.setting_description("Pirates").await.unwrap();

        assert_eq!(text, "Fog rolls over the Main.");
        assert!(llm.requests()[0].messages[0].content.contains("theme: Pirates."));
    }

    #[test]
    fn color_and_type_rules_list_every_domain_value() {
        for instructions in [monsters_instructions(), boss_instructions()] {
            for color in Color::ALL {
                assert!(
                    instructions.contains(&format!(" {}", color.as_str())),
                    "missing color {color:?}"
                );
            }
            assert!(instructions.contains("silver gray grey black"));
        }
        for instructions in [items_instructions(), craft_instructions()] {
            for element in ElementType::ALL {
                assert!(instructions.contains(element.as_str()), "missing type {element:?}");
            }
        }
    }
}
