//! The convergence loop: ask for edits until nothing is missing.
//!
//! One outstanding model request at a time. Every round analyzes the game,
//! phrases the gaps as an instruction, applies whatever valid edits come back
//! and decides whether to go again. Termination is guaranteed by an iteration
//! cap, a no-progress streak cap and an optional wall-clock deadline.

use std::sync::Arc;
use std::time::Duration;

use roguegen_domain::{EditOperation, GameState, GameStateEvent, Requirement, Validate};
use serde::Serialize;
use tokio::time::Instant;

use super::error::GenerationError;
use super::extraction::parse_json_lines;
use super::prompt::{edit_prompt, requirements_instruction, system_prompt, SEED_INSTRUCTION};
use crate::infrastructure::ports::{LlmPort, LlmRequest};

#[derive(Debug, Clone)]
pub struct ConvergenceConfig {
    /// Model requests per session, seed included
    pub max_iterations: u32,
    /// Consecutive rounds without progress before giving up
    pub max_stalled_iterations: u32,
    /// Wall-clock budget for a whole session (`None` = unbounded)
    pub deadline: Option<Duration>,
    pub temperature: f32,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 6,
            max_stalled_iterations: 2,
            deadline: Some(Duration::from_secs(600)),
            temperature: 0.9,
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The first request carries the caller's free-form instruction
    Seed,
    /// Requests enumerate the analyzer's missing requirements
    Iterating,
    Converged,
    Exhausted,
}

/// Terminal phase reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Converged,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub state: GameState,
    pub status: CompletionStatus,
    /// Requirements still unmet (empty when converged)
    pub remaining: Vec<Requirement>,
    /// Model requests issued
    pub iterations: u32,
}

/// Called with every applied edit and the events it produced.
pub type EditObserver<'a> = dyn FnMut(&EditOperation, &[GameStateEvent]) + Send + 'a;

pub struct ContentGenerator {
    pub(super) llm: Arc<dyn LlmPort>,
    pub(super) config: ConvergenceConfig,
}

impl ContentGenerator {
    pub fn new(llm: Arc<dyn LlmPort>, config: ConvergenceConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// The big-prompt request for `instruction` against the current game.
    pub(super) fn edit_request(&self, state: &GameState, instruction: &str) -> LlmRequest {
        LlmRequest::prompt(edit_prompt(state, instruction))
            .with_system_prompt(system_prompt())
            .with_temperature(self.config.temperature)
    }

    /// Drive `state` towards completion.
    ///
    /// With a `seed`, the first request carries it verbatim; without one the
    /// loop starts directly from the missing requirements.
    pub async fn complete(
        &self,
        state: GameState,
        seed: Option<&str>,
    ) -> Result<CompletionOutcome, GenerationError> {
        self.complete_with_observer(state, seed, &mut |_: &EditOperation, _: &[GameStateEvent]| {})
            .await
    }

    pub async fn complete_with_observer(
        &self,
        mut state: GameState,
        seed: Option<&str>,
        observer: &mut EditObserver<'_>,
    ) -> Result<CompletionOutcome, GenerationError> {
        state.validate().map_err(GenerationError::InvalidState)?;

        let started = Instant::now();
        let mut phase = if seed.is_some() {
            Phase::Seed
        } else {
            Phase::Iterating
        };
        let mut iterations = 0u32;
        let mut stalled = 0u32;

        loop {
            let missing = state.missing_requirements();
            if phase == Phase::Iterating && missing.is_empty() {
                phase = Phase::Converged;
                break;
            }
            if iterations >= self.config.max_iterations {
                tracing::warn!(iterations, remaining = missing.len(), "Iteration limit reached");
                phase = Phase::Exhausted;
                break;
            }
            if stalled >= self.config.max_stalled_iterations {
                tracing::warn!(stalled, remaining = missing.len(), "Generation stopped making progress");
                phase = Phase::Exhausted;
                break;
            }

            let time_left = match self.config.deadline {
                Some(deadline) => match deadline.checked_sub(started.elapsed()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => {
                        tracing::warn!(iterations, "Session deadline reached");
                        phase = Phase::Exhausted;
                        break;
                    }
                },
                None => None,
            };

            let instruction = match phase {
                Phase::Seed => seed.unwrap_or(SEED_INSTRUCTION).to_string(),
                _ => requirements_instruction(&missing),
            };
            iterations += 1;
            tracing::debug!(iteration = iterations, ?phase, %instruction, "Requesting edits");

            let request = self.edit_request(&state, &instruction);
            let response = match time_left {
                Some(left) => match tokio::time::timeout(left, self.llm.generate(request)).await {
                    Ok(response) => response?,
                    Err(_) => {
                        tracing::warn!(iterations, "Session deadline reached mid-request");
                        phase = Phase::Exhausted;
                        break;
                    }
                },
                None => self.llm.generate(request).await?,
            };

            let extracted = parse_json_lines::<EditOperation>(&response.content);
            let applied = extracted.records.len();
            let before = state.clone();
            for edit in extracted.records {
                let events = state.apply(edit.clone());
                observer(&edit, &events);
            }

            // New areas and characters add dangling references, so the
            // missing count can grow on a productive round.
            let remaining = state.missing_requirements().len();
            let progressed = state != before;
            stalled = if progressed { 0 } else { stalled + 1 };

            tracing::info!(
                iteration = iterations,
                ?phase,
                applied,
                rejected = extracted.rejections.len(),
                progressed,
                remaining,
                "Generation round finished"
            );

            if phase == Phase::Seed {
                phase = Phase::Iterating;
            }
        }

        let remaining = state.missing_requirements();
        let status = if phase == Phase::Converged {
            CompletionStatus::Converged
        } else if remaining.is_empty() {
            // A round that filled the last gap can still hit a limit check first.
            CompletionStatus::Converged
        } else {
            CompletionStatus::Exhausted
        };

        tracing::info!(
            ?status,
            iterations,
            remaining = remaining.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation session finished"
        );

        Ok(CompletionOutcome {
            state,
            status,
            remaining,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::LlmError;
    use crate::test_fixtures::{
        area, edit_lines, item, monster, pregen_state, RequirementAnsweringLlm, ScriptedLlm,
    };
    use roguegen_domain::{Character, ItemKind};

    fn generator(llm: Arc<dyn LlmPort>) -> ContentGenerator {
        ContentGenerator::new(llm, ConvergenceConfig::default())
    }

    #[tokio::test]
    async fn fixed_valid_batch_completes_pirates_game() {
        let batch = edit_lines(&pregen_state().to_edits());
        let llm = Arc::new(ScriptedLlm::texts([batch]));

        let outcome = generator(llm.clone())
            .complete(GameState::new("Pirates"), Some(SEED_INSTRUCTION))
            .await
            .unwrap();

        assert_eq!(outcome.status, CompletionStatus::Converged);
        assert!(outcome.state.missing_requirements().is_empty());
        assert_eq!(outcome.iterations, 1);
        let requests = llm.requests();
        assert!(requests[0].messages[0].content.contains("Instruction: Generate everything"));
        assert!(requests[0].system_prompt.is_some());
    }

    #[tokio::test]
    async fn cooperative_model_converges_within_bound() {
        let llm = Arc::new(RequirementAnsweringLlm::new(pregen_state()));

        let outcome = generator(llm.clone())
            .complete(GameState::new("Pirates"), Some(SEED_INSTRUCTION))
            .await
            .unwrap();

        assert_eq!(outcome.status, CompletionStatus::Converged);
        assert!(outcome.remaining.is_empty());
        assert!(outcome.iterations <= 6);
        // Seed gives setting + areas, one round fills every gap.
        assert_eq!(llm.calls(), 2);
        assert_eq!(outcome.state.monsters().len(), pregen_state().monsters().len());
    }

    #[tokio::test]
    async fn empty_batches_exhaust_instead_of_spinning() {
        let llm = Arc::new(ScriptedLlm::texts(Vec::<String>::new()));

        let outcome = generator(llm.clone())
            .complete(GameState::new("Pirates"), Some(SEED_INSTRUCTION))
            .await
            .unwrap();

        assert_eq!(outcome.status, CompletionStatus::Exhausted);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.remaining.len(), 4);
    }

    #[tokio::test]
    async fn rounds_that_add_new_references_still_count_as_progress() {
        let areas: Vec<_> = ["Cove", "Wreck", "Fort"]
            .into_iter()
            .map(|name| {
                let enemies = [format!("{name} Crab"), format!("{name} Ghost")];
                let enemies: Vec<&str> = enemies.iter().map(String::as_str).collect();
                let coat = format!("{name} Coat");
                EditOperation::area(area(name, &enemies, &[coat.as_str()]))
            })
            .collect();

        let mut cast = vec![
            EditOperation::setting_description("Fog over the Main."),
            EditOperation::boss(pregen_state().boss().cloned().unwrap()),
        ];
        cast.extend((1..=3).map(|n| {
            EditOperation::character(Character {
                name: format!("Sailor {n}"),
                backstory: "Washed ashore.".to_string(),
                starting_items: (1..=5).map(|i| format!("Trinket {n}-{i}")).collect(),
            })
        }));

        let mut definitions = Vec::new();
        for name in ["Cove", "Wreck", "Fort"] {
            definitions.push(EditOperation::monster(monster(&format!("{name} Crab"))));
            definitions.push(EditOperation::monster(monster(&format!("{name} Ghost"))));
            definitions.push(EditOperation::item(item(&format!("{name} Coat"), 1, ItemKind::Armor)));
        }
        for n in 1..=3 {
            for i in 1..=5 {
                definitions.push(EditOperation::item(item(
                    &format!("Trinket {n}-{i}"),
                    1,
                    ItemKind::Food,
                )));
            }
        }

        let llm = Arc::new(ScriptedLlm::texts([
            edit_lines(&areas),
            edit_lines(&cast),
            edit_lines(&definitions),
        ]));

        let outcome = generator(llm.clone())
            .complete(GameState::new("Pirates"), None)
            .await
            .unwrap();

        assert_eq!(outcome.status, CompletionStatus::Converged);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(llm.requests().len(), 3);
    }

    #[tokio::test]
    async fn replaying_identical_records_is_a_stall() {
        let areas = edit_lines(&pregen_state().to_edits()[1..4]);
        let llm = Arc::new(ScriptedLlm::texts([areas.clone(), areas.clone(), areas]));

        let outcome = generator(llm.clone())
            .complete(GameState::new("Pirates"), None)
            .await
            .unwrap();

        assert_eq!(outcome.status, CompletionStatus::Exhausted);
        // One productive round, then two rounds that change nothing.
        assert_eq!(outcome.iterations, 3);
    }

    #[tokio::test]
    async fn iteration_cap_bounds_a_stalling_model() {
        let llm = Arc::new(ScriptedLlm::texts(Vec::<String>::new()));
        let config = ConvergenceConfig {
            max_stalled_iterations: u32::MAX,
            ..ConvergenceConfig::default()
        };

        let outcome = ContentGenerator::new(llm.clone(), config)
            .complete(GameState::new("Pirates"), None)
            .await
            .unwrap();

        assert_eq!(outcome.status, CompletionStatus::Exhausted);
        assert_eq!(outcome.iterations, 6);
        assert_eq!(llm.requests().len(), 6);
    }

    #[tokio::test]
    async fn gap_filling_lists_requirements_as_bullets() {
        let llm = Arc::new(ScriptedLlm::texts(Vec::<String>::new()));

        generator(llm.clone())
            .complete(GameState::new("Pirates"), None)
            .await
            .unwrap();

        let prompt = &llm.requests()[0].messages[0].content;
        assert!(prompt.contains("- a setting description"));
        assert!(prompt.contains("- a boss"));
    }

    #[tokio::test]
    async fn complete_state_without_seed_makes_no_request() {
        let llm = Arc::new(ScriptedLlm::texts(Vec::<String>::new()));

        let outcome = generator(llm.clone())
            .complete(pregen_state(), None)
            .await
            .unwrap();

        assert_eq!(outcome.status, CompletionStatus::Converged);
        assert_eq!(outcome.iterations, 0);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_state_fails_before_any_model_call() {
        let llm = Arc::new(ScriptedLlm::texts(Vec::<String>::new()));

        let result = generator(llm.clone())
            .complete(GameState::new("  "), Some(SEED_INSTRUCTION))
            .await;

        assert!(matches!(result, Err(GenerationError::InvalidState(_))));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn safety_rejection_propagates() {
        let llm = Arc::new(ScriptedLlm::new([Err(LlmError::safety_rejected(["hate speech"]))]));

        let err = generator(llm)
            .complete(GameState::new("Pirates"), Some(SEED_INSTRUCTION))
            .await
            .unwrap_err();

        assert!(err.is_safety_rejection());
        assert!(err.to_string().contains("hate speech"));
    }

    #[tokio::test]
    async fn observer_sees_every_applied_edit() {
        let edits = pregen_state().to_edits();
        let llm = Arc::new(ScriptedLlm::texts([edit_lines(&edits)]));
        let mut seen = Vec::new();

        generator(llm)
            .complete_with_observer(
                GameState::new("Pirates"),
                Some(SEED_INSTRUCTION),
                &mut |edit: &EditOperation, events: &[GameStateEvent]| {
                    assert_eq!(events.len(), 1);
                    seen.push(edit.clone());
                },
            )
            .await
            .unwrap();

        assert_eq!(seen, edits);
    }

    #[tokio::test]
    async fn deadline_cuts_a_slow_request_short() {
        struct SlowLlm;

        #[async_trait::async_trait]
        impl LlmPort for SlowLlm {
            async fn generate(
                &self,
                _request: LlmRequest,
            ) -> Result<crate::infrastructure::ports::LlmResponse, LlmError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(LlmError::request_failed("unreachable"))
            }

            async fn generate_stream(
                &self,
                _request: LlmRequest,
            ) -> Result<crate::infrastructure::ports::TextStream, LlmError> {
                Err(LlmError::request_failed("not streamed"))
            }
        }

        let config = ConvergenceConfig {
            deadline: Some(Duration::from_millis(50)),
            ..ConvergenceConfig::default()
        };

        let outcome = ContentGenerator::new(Arc::new(SlowLlm), config)
            .complete(GameState::new("Pirates"), Some(SEED_INSTRUCTION))
            .await
            .unwrap();

        assert_eq!(outcome.status, CompletionStatus::Exhausted);
        assert_eq!(outcome.iterations, 1);
    }
}
