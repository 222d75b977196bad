//! Streaming seed: apply edits while the model is still writing them.
//!
//! A single streamed response is split into lines as chunks arrive. Each
//! complete line is parsed, validated and applied on its own, so callers see
//! the game grow in near-real-time. This variant does not loop; run
//! [`ContentGenerator::complete`] on the result to fill remaining gaps.

use std::collections::VecDeque;

use futures_util::StreamExt;
use roguegen_domain::{EditOperation, GameState, GameStateEvent, Validate};

use super::convergence::ContentGenerator;
use super::error::GenerationError;
use super::extraction::{parse_line, parse_whole_response};
use crate::infrastructure::line_buffer::LineBuffer;
use crate::infrastructure::ports::TextStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamPhase {
    Reading,
    /// Upstream is exhausted; only buffered lines remain
    Draining,
    Done,
}

/// Lazily applied edits of one streamed response.
///
/// Dropping it closes the underlying connection. Edits already applied stay
/// in [`EditStream::state`].
pub struct EditStream {
    chunks: TextStream,
    buffer: LineBuffer,
    lines: VecDeque<String>,
    recovered: VecDeque<EditOperation>,
    state: GameState,
    line_count: usize,
    applied: usize,
    rejected: usize,
    last_error: Option<String>,
    /// Raw text kept for whole-response recovery, until the first edit lands.
    transcript: String,
    response_chars: usize,
    phase: StreamPhase,
}

impl ContentGenerator {
    /// Open a streamed seed request for `instruction` against `state`.
    ///
    /// Failures before the first chunk (rate limiting, a blocked prompt) are
    /// returned here.
    pub async fn stream_seed(
        &self,
        state: GameState,
        instruction: &str,
    ) -> Result<EditStream, GenerationError> {
        state.validate().map_err(GenerationError::InvalidState)?;
        let request = self.edit_request(&state, instruction);
        tracing::debug!(%instruction, "Opening edit stream");
        let chunks = self.llm.generate_stream(request).await?;
        Ok(EditStream::new(chunks, state))
    }
}

impl EditStream {
    fn new(chunks: TextStream, state: GameState) -> Self {
        Self {
            chunks,
            buffer: LineBuffer::new(),
            lines: VecDeque::new(),
            recovered: VecDeque::new(),
            state,
            line_count: 0,
            applied: 0,
            rejected: 0,
            last_error: None,
            transcript: String::new(),
            response_chars: 0,
            phase: StreamPhase::Reading,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Edits applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Apply and return the next valid edit.
    ///
    /// Ends with `None` once the response is consumed. A response that yields
    /// no edit at all ends with [`GenerationError::NoProgress`]. A transport
    /// failure after at least one edit ends the stream quietly; a safety
    /// rejection is always reported.
    pub async fn next_edit(
        &mut self,
    ) -> Option<Result<(EditOperation, Vec<GameStateEvent>), GenerationError>> {
        loop {
            if let Some(edit) = self.recovered.pop_front() {
                return Some(Ok(self.apply(edit)));
            }

            if let Some(line) = self.lines.pop_front() {
                if let Some(edit) = self.accept(&line) {
                    return Some(Ok(self.apply(edit)));
                }
                continue;
            }

            match self.phase {
                StreamPhase::Reading => match self.chunks.next().await {
                    Some(Ok(chunk)) => {
                        self.response_chars += chunk.len();
                        if self.applied == 0 {
                            self.transcript.push_str(&chunk);
                        }
                        self.lines.extend(self.buffer.push(chunk.as_bytes()));
                    }
                    Some(Err(error)) => {
                        self.phase = StreamPhase::Done;
                        if error.is_safety_rejection() || self.applied == 0 {
                            tracing::error!(%error, applied = self.applied, "Edit stream failed");
                            return Some(Err(error.into()));
                        }
                        tracing::warn!(
                            %error,
                            applied = self.applied,
                            "Edit stream ended early; keeping partial result"
                        );
                        return None;
                    }
                    None => {
                        self.phase = StreamPhase::Draining;
                        self.lines.extend(self.buffer.finish());
                    }
                },
                StreamPhase::Draining => {
                    self.phase = StreamPhase::Done;
                    if self.applied == 0 {
                        self.recovered.extend(parse_whole_response(&self.transcript));
                        if self.recovered.is_empty() {
                            tracing::error!(
                                rejected = self.rejected,
                                last_error = ?self.last_error,
                                "Edit stream produced no usable edits"
                            );
                            return Some(Err(GenerationError::NoProgress {
                                last_error: self.last_error.take(),
                            }));
                        }
                        continue;
                    }
                    self.log_finished();
                    return None;
                }
                StreamPhase::Done => return None,
            }
        }
    }

    fn accept(&mut self, line: &str) -> Option<EditOperation> {
        self.line_count += 1;
        match parse_line::<EditOperation>(line) {
            Ok(edit) => edit,
            Err(reason) => {
                tracing::warn!(line_number = self.line_count, %reason, line, "Dropping malformed edit");
                self.rejected += 1;
                self.last_error = Some(format!("line {}: {}", self.line_count, reason));
                None
            }
        }
    }

    fn apply(&mut self, edit: EditOperation) -> (EditOperation, Vec<GameStateEvent>) {
        let events = self.state.apply(edit.clone());
        self.applied += 1;
        tracing::debug!(?events, "Applied streamed edit");
        (edit, events)
    }

    fn log_finished(&self) {
        tracing::info!(
            applied = self.applied,
            rejected = self.rejected,
            response_chars = self.response_chars,
            "Edit stream finished"
        );
    }
}
