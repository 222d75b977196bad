//! Content generation use cases.
//!
//! - [`ContentGenerator`] drives a game to completion (convergence loop) or
//!   streams the seed edits of a new game.
//! - [`TargetedGenerators`] produce one kind of record per request.
//! - [`StructuredExtractor`] turns model text into validated records.

mod convergence;
mod error;
mod extraction;
mod prompt;
mod schema;
mod streaming;
mod targeted;

pub use convergence::{
    CompletionOutcome, CompletionStatus, ContentGenerator, ConvergenceConfig, EditObserver, Phase,
};
pub use error::GenerationError;
pub use extraction::{
    build_extraction_prompt, parse_json_lines, parse_line, Extracted, ExtractionRequest,
    LineRejection, StructuredExtractor,
};
pub use prompt::{edit_prompt, requirements_instruction, system_prompt, SEED_INSTRUCTION};
pub use schema::RecordSchema;
pub use streaming::EditStream;
pub use targeted::{is_pregen, CraftRequest, TargetedGenerators, PREGEN_THEME};

use std::sync::Arc;

/// Generation services shared by every request handler.
pub struct GenerationUseCases {
    pub content: Arc<ContentGenerator>,
    pub targeted: Arc<TargetedGenerators>,
}

impl GenerationUseCases {
    pub fn new(content: Arc<ContentGenerator>, targeted: Arc<TargetedGenerators>) -> Self {
        Self { content, targeted }
    }
}
