//! Infrastructure implementations.
//!
//! Contains the model backends behind [`ports::LlmPort`], the wire decoding
//! they share, and the read-only fixture store.

pub mod fixtures;
pub mod gemini;
pub mod line_buffer;
pub mod ollama;
pub mod ports;
pub mod resilient_llm;
pub mod safety;
pub mod sse;
