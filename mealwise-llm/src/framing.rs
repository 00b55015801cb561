//! Frame buffers for streamed provider responses.
//!
//! Network reads do not respect frame boundaries: a JSON line or an SSE event
//! can be split across two reads, and a multi-byte UTF-8 character can be
//! split inside a frame. Both buffers work on raw bytes and only decode a frame
//! once its terminator has arrived.

/// Accumulates newline-delimited frames.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line completed by them.
    ///
    /// Blank lines are dropped. Incomplete trailing data is kept for the next call.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            push_line(&mut lines, &self.pending[start..end]);
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush the unterminated remainder at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let mut lines = Vec::with_capacity(1);
        push_line(&mut lines, &rest);
        lines.pop()
    }

    /// Number of buffered bytes not yet forming a complete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

/// Accumulates server-sent events separated by a blank line.
#[derive(Debug, Default)]
pub struct EventBuffer {
    pending: Vec<u8>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        // CRLF line endings collapse to LF; a CR split from its LF across reads
        // is dropped the same way.
        self.pending
            .extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = find_blank_line(&self.pending[start..]) {
            let end = start + offset;
            if let Some(event) = parse_event(&self.pending[start..end]) {
                events.push(event);
            }
            start = end + 2;
        }
        self.pending.drain(..start);
        events
    }

    /// End of stream. An unterminated event is never emitted; the number of
    /// discarded bytes is returned for logging.
    pub fn finish(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn find_blank_line(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\n\n")
}

fn parse_event(raw: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(raw);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => data.push(value),
            "event" => event = Some(value.to_string()),
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}
