//! Incremental newline splitter for chunked text.
//!
//! Network chunks and model text fragments split lines (and multi-byte
//! characters) at arbitrary points. `LineBuffer` holds the unterminated tail
//! and hands out complete lines only.

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without the
    /// terminator. `\r\n` endings are accepted.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush the unterminated tail at end of input. Returns `None` when the
    /// tail is empty or whitespace.
    pub fn finish(&mut self) -> Option<String> {
        let tail = decode_line(&std::mem::take(&mut self.pending));
        if tail.trim().is_empty() {
            None
        } else {
            Some(tail)
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
