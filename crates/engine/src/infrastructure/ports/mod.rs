//! Port traits for infrastructure boundaries.
//!
//! The model backend is the only abstraction in the engine. Everything else is
//! concrete types. Implementations:
//! - `GeminiClient` (production)
//! - `OllamaClient` (local development)
//! - `ResilientLlmClient` (retry wrapper around either)
//! - scripted and mock gateways in tests

mod error;
mod llm;

pub use error::LlmError;
pub use llm::{
    ChatMessage, FinishReason, LlmPort, LlmRequest, LlmResponse, MessageRole, ModelTier,
    TextStream, TokenUsage,
};

#[cfg(test)]
pub use llm::MockLlmPort;
