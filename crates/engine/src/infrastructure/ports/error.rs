//! Error types for port operations.

use std::collections::BTreeSet;

/// Failure of a single model call.
///
/// `Clone` so retry loops can keep the last error around while trying again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// Network failure or server-side error. Usually transient.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// The backend asked us to slow down (HTTP 429 or equivalent).
    #[error("LLM rate limited: {0}")]
    RateLimited(String),

    /// The prompt or the response was blocked by content-safety filtering.
    /// Never retried; surfaced to the user with the category tags.
    #[error("Content blocked by safety filter: {}", join_reasons(.reasons))]
    SafetyRejected { reasons: BTreeSet<String> },

    /// The backend answered without usable text and without a safety signal.
    #[error("Bad response: {0}")]
    BadResponse(String),
}

fn join_reasons(reasons: &BTreeSet<String>) -> String {
    if reasons.is_empty() {
        return "unspecified".to_string();
    }
    reasons.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl LlmError {
    pub fn request_failed(message: impl ToString) -> Self {
        Self::RequestFailed(message.to_string())
    }

    pub fn rate_limited(message: impl ToString) -> Self {
        Self::RateLimited(message.to_string())
    }

    pub fn bad_response(message: impl ToString) -> Self {
        Self::BadResponse(message.to_string())
    }

    /// Create a safety rejection from category tags.
    pub fn safety_rejected(reasons: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::SafetyRejected {
            reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_safety_rejection(&self) -> bool {
        matches!(self, Self::SafetyRejected { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
