//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::fixtures::FixtureRepository;
use crate::infrastructure::ports::LlmPort;
use crate::use_cases::generation::{ContentGenerator, ConvergenceConfig, TargetedGenerators};
use crate::use_cases::GenerationUseCases;

/// Main application state.
///
/// Built once at start-up and passed to HTTP handlers via Axum state. The
/// model gateway is the only shared resource; sessions never share a game.
pub struct App {
    pub fixtures: Arc<FixtureRepository>,
    pub use_cases: UseCases,
}

/// Container for all use cases.
pub struct UseCases {
    pub generation: GenerationUseCases,
}

impl App {
    pub fn new(
        llm: Arc<dyn LlmPort>,
        fixtures: Arc<FixtureRepository>,
        convergence: ConvergenceConfig,
    ) -> Self {
        let content = Arc::new(ContentGenerator::new(Arc::clone(&llm), convergence));
        let targeted = Arc::new(TargetedGenerators::new(llm, Arc::clone(&fixtures)));

        Self {
            fixtures,
            use_cases: UseCases {
                generation: GenerationUseCases::new(content, targeted),
            },
        }
    }
}
