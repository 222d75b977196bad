//! Unified error types for the domain layer
//!
//! Every domain operation that can fail returns `DomainError`, so the engine
//! never has to fall back to `String` or `anyhow` when talking about content.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values, duplicate names)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Parse error (for strictly-parsed enums)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    /// Creates a validation error for content that breaks a field constraint.
    ///
    /// Use this when a record is structurally well-formed JSON but violates
    /// the content rules:
    /// - Required names or text are empty
    /// - Levels or speeds are outside `1..=3`
    /// - A glyph is not exactly one character
    ///
    /// # Example
    /// ```ignore
    /// if name.trim().is_empty() {
    ///     return Err(DomainError::validation("monster name cannot be empty"));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Prefix the message with the record it came from, e.g. `area 'Docks'`.
    pub fn in_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::Validation(msg) => Self::Validation(format!("{context}: {msg}")),
            Self::Parse(msg) => Self::Parse(format!("{context}: {msg}")),
        }
    }
}
