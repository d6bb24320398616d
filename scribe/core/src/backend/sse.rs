//! Server-sent event framing for streaming HTTP bodies.

/// A parsed SSE block
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if present
    pub event: Option<String>,
    /// Concatenated `data:` lines
    pub data: String,
}

/// Accumulates body chunks and splits them into complete SSE blocks.
///
/// Works on raw bytes so that a multi-byte character split across two
/// network chunks is only decoded once the whole block has arrived.
#[derive(Debug, Default)]
pub struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the buffer, normalizing line endings
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend(chunk.iter().copied().filter(|&b| b != b'\r'));
    }

    /// Extract the next complete event from the buffer, if available
    pub fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            let pos = self.pending.windows(2).position(|w| w == b"\n\n")?;
            let block: Vec<u8> = self.pending.drain(..pos + 2).collect();
            let block = String::from_utf8_lossy(&block[..pos]);
            if let Some(event) = parse_block(&block) {
                return Some(event);
            }
        }
    }

    /// Check if there's remaining content in the buffer
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.pending.iter().any(|b| !b.is_ascii_whitespace())
    }
}

/// Parse one block; comment-only and empty blocks yield `None`.
fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in block.lines() {
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data {
                Some(ref mut d) => {
                    d.push('\n');
                    d.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            // Comments (empty field name) and unknown fields
            _ => {}
        }
    }

    if event.is_none() && data.is_none() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.unwrap_or_default(),
    })
}
