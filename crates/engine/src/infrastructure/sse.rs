//! Server-sent-events decoding shared by the streaming backends.

use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};

use super::line_buffer::LineBuffer;
use super::ports::LlmError;

struct Decoder {
    body: BoxStream<'static, Result<Vec<u8>, String>>,
    buffer: LineBuffer,
    pending: VecDeque<String>,
    done: bool,
}

impl Decoder {
    fn queue(&mut self, lines: impl IntoIterator<Item = String>) {
        self.pending
            .extend(lines.into_iter().filter_map(|line| data_payload(&line)));
    }
}

/// Turn a chunked HTTP body into the `data:` payloads of its events.
///
/// Comment lines, event names and blank separators are dropped. A transport
/// error ends the stream after being yielded once.
pub fn data_payloads<S, B, E>(body: S) -> BoxStream<'static, Result<String, LlmError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Display,
{
    let body = body
        .map(|chunk| chunk.map(|b| b.as_ref().to_vec()).map_err(|e| e.to_string()))
        .boxed();
    let decoder = Decoder {
        body,
        buffer: LineBuffer::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(payload) = decoder.pending.pop_front() {
                return Some((Ok(payload), decoder));
            }
            if decoder.done {
                return None;
            }
            match decoder.body.next().await {
                Some(Ok(chunk)) => {
                    let lines = decoder.buffer.push(&chunk);
                    decoder.queue(lines);
                }
                Some(Err(message)) => {
                    decoder.done = true;
                    return Some((Err(LlmError::request_failed(message)), decoder));
                }
                None => {
                    decoder.done = true;
                    let tail = decoder.buffer.finish();
                    decoder.queue(tail);
                }
            }
        }
    })
    .boxed()
}

fn data_payload(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim().is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> + Send + 'static {
        let parts: Vec<Result<Vec<u8>, String>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(parts)
    }

    #[tokio::test]
    async fn yields_data_payloads_across_chunk_boundaries() {
        let body = chunks(&[": keep-alive\n\ndata: {\"a\"", ":1}\n\nevent: x\ndata: [DONE]\n"]);
        let payloads: Vec<_> = data_payloads(body).collect().await;
        assert_eq!(
            payloads,
            vec![Ok("{\"a\":1}".to_string()), Ok("[DONE]".to_string())]
        );
    }

    #[tokio::test]
    async fn unterminated_last_event_is_flushed() {
        let payloads: Vec<_> = data_payloads(chunks(&["data: tail"])).collect().await;
        assert_eq!(payloads, vec![Ok("tail".to_string())]);
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let body = stream::iter(vec![
            Ok(b"data: one\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"data: two\n".to_vec()),
        ]);
        let payloads: Vec<_> = data_payloads(body).collect().await;
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], Ok("one".to_string()));
        assert!(matches!(payloads[1], Err(LlmError::RequestFailed(_))));
    }
}
