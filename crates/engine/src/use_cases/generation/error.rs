use roguegen_domain::DomainError;

use crate::infrastructure::ports::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// The caller-supplied state failed validation; no model call was made.
    #[error("Invalid game state: {0}")]
    InvalidState(DomainError),
    #[error("Model produced no usable edits{}", detail(.last_error))]
    NoProgress { last_error: Option<String> },
}

fn detail(last_error: &Option<String>) -> String {
    last_error
        .as_deref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

impl GenerationError {
    pub fn is_safety_rejection(&self) -> bool {
        matches!(self, Self::Llm(e) if e.is_safety_rejection())
    }
}
