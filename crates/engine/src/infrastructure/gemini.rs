//! Google Generative Language (Gemini) client.
//!
//! Uses the v1beta REST API directly: `generateContent` for blocking calls and
//! `streamGenerateContent?alt=sse` for streams. Safety blocks are reported as
//! `LlmError::SafetyRejected` with tags from the injected [`SafetyCategoryMap`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::{
    FinishReason, LlmError, LlmPort, LlmRequest, LlmResponse, MessageRole, ModelTier, TextStream,
    TokenUsage,
};
use crate::infrastructure::safety::SafetyCategoryMap;
use crate::infrastructure::sse;

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default primary model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";

/// Default model that rate-limited requests are downgraded to.
pub const DEFAULT_GEMINI_FALLBACK_MODEL: &str = "gemini-1.5-flash";

/// Blocking thresholds sent with every request.
const SAFETY_SETTINGS: &[(&str, &str)] = &[
    ("HARM_CATEGORY_HATE_SPEECH", "BLOCK_LOW_AND_ABOVE"),
    ("HARM_CATEGORY_DANGEROUS_CONTENT", "BLOCK_MEDIUM_AND_ABOVE"),
    ("HARM_CATEGORY_SEXUALLY_EXPLICIT", "BLOCK_LOW_AND_ABOVE"),
    ("HARM_CATEGORY_HARASSMENT", "BLOCK_MEDIUM_AND_ABOVE"),
];

/// Candidate finish reasons that mean the response was withheld for policy reasons.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Client for the Gemini REST API
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    fallback_model: String,
    safety: Arc<SafetyCategoryMap>,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self::with_timeout(base_url, api_key, model, 120)
    }

    /// Create client with custom timeout.
    pub fn with_timeout(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            fallback_model: model.to_string(),
            safety: Arc::new(SafetyCategoryMap::gemini()),
        }
    }

    pub fn with_fallback_model(mut self, model: &str) -> Self {
        self.fallback_model = model.to_string();
        self
    }

    pub fn with_safety_map(mut self, safety: SafetyCategoryMap) -> Self {
        self.safety = Arc::new(safety);
        self
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.model,
            ModelTier::Fallback => &self.fallback_model,
        }
    }

    fn endpoint(&self, tier: ModelTier, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.base_url,
            self.model_for(tier),
            method
        )
    }

    async fn send(
        &self,
        url: String,
        request: &LlmRequest,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(request))
            .send()
            .await
            .map_err(|e| LlmError::request_failed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(status_error(status, &error_text))
    }
}

#[async_trait]
impl LlmPort for GeminiClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = self.endpoint(request.tier, "generateContent");
        let response = self.send(url, &request).await?;

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::bad_response(e.to_string()))?;

        convert_response(api_response, &self.safety)
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream, LlmError> {
        let url = self.endpoint(request.tier, "streamGenerateContent?alt=sse");
        let response = self.send(url, &request).await?;
        let safety = Arc::clone(&self.safety);

        let stream = sse::data_payloads(response.bytes_stream())
            .filter_map(move |payload| {
                let chunk = payload.and_then(|data| {
                    let chunk: GenerateContentResponse = serde_json::from_str(&data)
                        .map_err(|e| LlmError::bad_response(format!("{e}: {data}")))?;
                    convert_chunk(chunk, &safety)
                });
                // Empty chunks carry only metadata.
                let item = match chunk {
                    Ok(text) if text.is_empty() => None,
                    other => Some(other),
                };
                std::future::ready(item)
            })
            .boxed();

        Ok(stream)
    }
}

fn status_error(status: StatusCode, body: &str) -> LlmError {
    let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::rate_limited(message)
    } else {
        LlmError::request_failed(message)
    }
}

fn build_request(request: &LlmRequest) -> GenerateContentRequest {
    let contents = request
        .messages
        .iter()
        .map(|msg| Content {
            role: Some(
                match msg.role {
                    MessageRole::User => "user",
                }
                .to_string(),
            ),
            parts: vec![Part {
                text: Some(msg.content.clone()),
            }],
        })
        .collect();

    GenerateContentRequest {
        contents,
        system_instruction: request.system_prompt.as_ref().map(|text| Content {
            role: None,
            parts: vec![Part {
                text: Some(text.clone()),
            }],
        }),
        safety_settings: SAFETY_SETTINGS
            .iter()
            .map(|(category, threshold)| SafetySetting {
                category: category.to_string(),
                threshold: threshold.to_string(),
            })
            .collect(),
        generation_config: GenerationConfig {
            temperature: request.temperature,
        },
    }
}

/// Reasons for a block: explicitly blocked ratings, else high/medium
/// probability ratings, else the raw block reason.
fn safety_reasons(
    ratings: &[SafetyRating],
    fallback: &str,
    safety: &SafetyCategoryMap,
) -> BTreeSet<String> {
    let blocked: BTreeSet<String> = ratings
        .iter()
        .filter(|r| r.blocked)
        .map(|r| safety.tag(&r.category))
        .collect();
    if !blocked.is_empty() {
        return blocked;
    }

    let likely: BTreeSet<String> = ratings
        .iter()
        .filter(|r| matches!(r.probability.as_deref(), Some("HIGH" | "MEDIUM")))
        .map(|r| safety.tag(&r.category))
        .collect();
    if !likely.is_empty() {
        return likely;
    }

    BTreeSet::from([fallback.replace('_', " ").to_lowercase()])
}

/// Extract the text of one response (or stream chunk), or the safety error it signals.
fn response_text(
    response: &GenerateContentResponse,
    safety: &SafetyCategoryMap,
) -> Result<(String, Option<String>), LlmError> {
    if let Some(feedback) = &response.prompt_feedback {
        if let Some(reason) = &feedback.block_reason {
            return Err(LlmError::SafetyRejected {
                reasons: safety_reasons(&feedback.safety_ratings, reason, safety),
            });
        }
    }

    let Some(candidate) = response.candidates.first() else {
        return Ok((String::new(), None));
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return Err(LlmError::SafetyRejected {
                reasons: safety_reasons(&candidate.safety_ratings, reason, safety),
            });
        }
    }

    let text = candidate
        .content
        .as_ref()
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok((text, candidate.finish_reason.clone()))
}

fn convert_response(
    response: GenerateContentResponse,
    safety: &SafetyCategoryMap,
) -> Result<LlmResponse, LlmError> {
    if response.candidates.is_empty() && response.prompt_feedback.is_none() {
        return Err(LlmError::bad_response("No candidates in Gemini response"));
    }

    let (content, finish_reason) = response_text(&response, safety)?;
    if content.trim().is_empty() {
        return Err(LlmError::bad_response(format!(
            "Gemini returned no text (finish reason: {})",
            finish_reason.as_deref().unwrap_or("none")
        )));
    }

    let finish_reason = match finish_reason.as_deref() {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        _ => FinishReason::Unknown,
    };

    Ok(LlmResponse {
        content,
        finish_reason,
        usage: response.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }),
    })
}

fn convert_chunk(
    chunk: GenerateContentResponse,
    safety: &SafetyCategoryMap,
) -> Result<String, LlmError> {
    response_text(&chunk, safety).map(|(text, _)| text)
}

// =============================================================================
// Gemini API types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct SafetyRating {
    category: String,
    probability: Option<String>,
    #[serde(default)]
    blocked: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
