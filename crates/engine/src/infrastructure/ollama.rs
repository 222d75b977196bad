//! Local model backend speaking Ollama's OpenAI-compatible chat API.
//!
//! Both one-shot and streamed completions are supported; a `content_filter`
//! finish reason is reported as a safety rejection.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infrastructure::ports::{
    FinishReason, LlmError, LlmPort, LlmRequest, LlmResponse, MessageRole, ModelTier, TextStream,
    TokenUsage,
};
use crate::infrastructure::sse;

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    fallback_model: String,
}

/// Default Ollama base URL.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Default model for Ollama.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Tag reported when the server filters a completion.
const CONTENT_FILTER_TAG: &str = "content filter";

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self::with_timeout(base_url, model, 120)
    }

    /// `timeout_secs` bounds the whole request, streamed body included.
    pub fn with_timeout(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            fallback_model: model.to_string(),
        }
    }

    pub fn with_fallback_model(mut self, model: &str) -> Self {
        self.fallback_model = model.to_string();
        self
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.model,
            ModelTier::Fallback => &self.fallback_model,
        }
    }

    async fn send(&self, request: &LlmRequest, stream: bool) -> Result<reqwest::Response, LlmError> {
        let api_request = OpenAIChatRequest {
            model: self.model_for(request.tier).to_string(),
            messages: build_messages(request),
            temperature: request.temperature,
            stream,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::request_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .map_err(|e| LlmError::request_failed(e.to_string()))?;
            let message = format!("HTTP {}: {}", status.as_u16(), error_text.trim());
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                LlmError::rate_limited(message)
            } else {
                LlmError::request_failed(message)
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmPort for OllamaClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let response = self.send(&request, false).await?;

        let api_response: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::bad_response(e.to_string()))?;

        convert_response(api_response)
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream, LlmError> {
        let response = self.send(&request, true).await?;

        let stream = sse::data_payloads(response.bytes_stream())
            .take_while(|payload| {
                let done = matches!(payload, Ok(data) if data.trim() == "[DONE]");
                std::future::ready(!done)
            })
            .filter_map(|payload| {
                let item = match payload.and_then(|data| convert_chunk(&data)) {
                    Ok(text) if text.is_empty() => None,
                    other => Some(other),
                };
                std::future::ready(item)
            })
            .boxed();

        Ok(stream)
    }
}

fn build_messages(request: &LlmRequest) -> Vec<OpenAIMessage> {
    let mut messages = Vec::new();

    if let Some(system) = &request.system_prompt {
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: Some(system.clone()),
        });
    }

    for msg in &request.messages {
        messages.push(OpenAIMessage {
            role: match msg.role {
                MessageRole::User => "user",
            }
            .to_string(),
            content: Some(msg.content.clone()),
        });
    }

    messages
}

fn convert_response(response: OpenAIChatResponse) -> Result<LlmResponse, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::bad_response("No choices in LLM response"))?;

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("content_filter") => return Err(LlmError::safety_rejected([CONTENT_FILTER_TAG])),
        _ => FinishReason::Unknown,
    };

    let content = choice.message.content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(LlmError::bad_response("LLM returned no text"));
    }

    Ok(LlmResponse {
        content,
        finish_reason,
        usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

fn convert_chunk(data: &str) -> Result<String, LlmError> {
    let chunk: OpenAIStreamChunk =
        serde_json::from_str(data).map_err(|e| LlmError::bad_response(format!("{e}: {data}")))?;

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(String::new());
    };
    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(LlmError::safety_rejected([CONTENT_FILTER_TAG]));
    }
    Ok(choice.delta.content.unwrap_or_default())
}

// =============================================================================
// OpenAI API types
// =============================================================================

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
