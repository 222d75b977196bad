//! Deterministic gateways for multi-round generation tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use roguegen_domain::{EditOperation, GameState};

use super::edit_lines;
use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest, LlmResponse, TextStream};

// =============================================================================
// ScriptedLlm
// =============================================================================

/// Answers each call with the next queued response; an empty body once the
/// script runs out. Streams are cut into fixed-size chunks so line splitting
/// across chunk boundaries is exercised.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
    chunk_size: usize,
    dropped_streams: Arc<AtomicUsize>,
}

impl ScriptedLlm {
    pub fn new(responses: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            chunk_size: 7,
            dropped_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn texts(texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(texts.into_iter().map(|text| Ok(text.into())))
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of streams handed out and since dropped by the consumer.
    pub fn dropped_streams(&self) -> usize {
        self.dropped_streams.load(Ordering::SeqCst)
    }

    fn next_response(&self, request: LlmRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn chunk(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.next_response(request).map(LlmResponse::text)
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream, LlmError> {
        let text = self.next_response(request)?;
        let guard = DropCounter(Arc::clone(&self.dropped_streams));
        let chunks = chunk(&text, self.chunk_size);
        Ok(stream::iter(chunks)
            .map(move |chunk| {
                let _ = &guard;
                Ok(chunk)
            })
            .boxed())
    }
}

// =============================================================================
// RequirementAnsweringLlm
// =============================================================================

/// A cooperative model backed by a complete game.
///
/// The seed instruction gets the setting and the areas. Every later request
/// gets exactly the records its bulleted instruction asks for, taken from the
/// complete game.
pub struct RequirementAnsweringLlm {
    target: GameState,
    calls: AtomicUsize,
}

impl RequirementAnsweringLlm {
    pub fn new(target: GameState) -> Self {
        Self {
            target,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, prompt: &str) -> String {
        let target = &self.target;
        let mut edits = Vec::new();

        if prompt.contains("Instruction: Generate everything") {
            if let Some(text) = target.setting_desc() {
                edits.push(EditOperation::setting_description(text));
            }
            edits.extend(target.areas().iter().cloned().map(EditOperation::area));
            return edit_lines(&edits);
        }

        for bullet in prompt.lines().filter_map(|line| line.strip_prefix("- ")) {
            if bullet == "a setting description" {
                if let Some(text) = target.setting_desc() {
                    edits.push(EditOperation::setting_description(text));
                }
            } else if bullet.contains("areas in total") {
                edits.extend(target.areas().iter().cloned().map(EditOperation::area));
            } else if let Some(name) = bullet.strip_prefix("a monster definition for ") {
                edits.extend(target.monster(name).cloned().map(EditOperation::monster));
            } else if let Some(name) = bullet.strip_prefix("an item definition for ") {
                edits.extend(target.item(name).cloned().map(EditOperation::item));
            } else if bullet == "a boss" {
                edits.extend(target.boss().cloned().map(EditOperation::boss));
            } else if bullet.contains("starting characters in total") {
                let have = bullet
                    .rsplit("(currently ")
                    .next()
                    .and_then(|rest| rest.trim_end_matches(')').parse::<usize>().ok())
                    .unwrap_or(0);
                edits.extend(
                    target
                        .characters()
                        .iter()
                        .skip(have)
                        .cloned()
                        .map(EditOperation::character),
                );
            }
        }
        edit_lines(&edits)
    }
}

#[async_trait]
impl LlmPort for RequirementAnsweringLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(LlmResponse::text(self.answer(&prompt)))
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream, LlmError> {
        let response = self.generate(request).await?;
        let lines: Vec<Result<String, LlmError>> = response
            .content
            .split_inclusive('\n')
            .map(|line| Ok(line.to_string()))
            .collect();
        Ok(stream::iter(lines).boxed())
    }
}
