//! Line-oriented SSE decoding for the router's event stream.
//!
//! The bootstrap needs raw lines (it stops at the first `data:` line, under a
//! line budget), while the drain loop and the keep-alive monitor want whole
//! events. Both sit on top of [`SseLineReader`]:
//! - [`SseLineReader`] -- split a chunked byte stream into lines
//! - [`SseEventParser`] -- fold lines into [`SseEvent`]s, one per blank line
//! - [`SseEventReader`] -- the two combined

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use serde_json::Value;

/// Chunked response body, already detached from `reqwest`.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>;

/// Reading the underlying body failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("SSE stream read failed: {0}")]
pub struct StreamError(pub String);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One blank-line-terminated SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Event type; unlabeled events are `"message"`.
    pub fn kind(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind() == "heartbeat"
    }

    /// Parse the payload as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.data).ok()
    }

    /// The `timestamp` field of a heartbeat payload, string or number.
    pub fn heartbeat_timestamp(&self) -> Option<String> {
        match self.json()?.get("timestamp")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Incremental, line-fed SSE event parser.
#[derive(Debug, Default)]
pub struct SseEventParser {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    pending: bool,
}

impl SseEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator). Returns an event when `line`
    /// is the blank line closing it.
    pub fn feed(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.event = Some(value.to_owned());
                self.pending = true;
            }
            "data" => {
                self.data.push(value.to_owned());
                self.pending = true;
            }
            "id" => {
                self.id = Some(value.to_owned());
                self.pending = true;
            }
            // `retry:` and unknown fields
            _ => {}
        }
        None
    }

    /// Flush a trailing event that was never closed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.take()
    }

    fn take(&mut self) -> Option<SseEvent> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.take(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Readers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Longest line the reader buffers before giving up on the stream.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a chunked byte stream into `\n`-terminated lines.
///
/// Bytes are buffered until a full line is available so multi-byte UTF-8
/// sequences split across chunks decode correctly. A peer that never sends
/// `\n` is cut off once `max_line_bytes` are pending.
pub struct SseLineReader {
    stream: ByteStream,
    buffer: Vec<u8>,
    finished: bool,
    max_line_bytes: usize,
}

impl SseLineReader {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            finished: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Wrap a streaming `reqwest` response body.
    pub fn from_response(resp: reqwest::Response) -> Self {
        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| e.to_string()));
        Self::new(Box::pin(stream))
    }

    /// Next line with `\n` / `\r\n` stripped; `None` once the body is exhausted.
    pub async fn next_line(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
                return Ok(Some(decode_line(&raw[..raw.len() - 1])));
            }

            if self.buffer.len() > self.max_line_bytes {
                self.finished = true;
                self.buffer.clear();
                return Err(StreamError(format!(
                    "line exceeds {} bytes without a terminator",
                    self.max_line_bytes
                )));
            }

            if self.finished {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let raw = std::mem::take(&mut self.buffer);
                return Ok(Some(decode_line(&raw)));
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Err(StreamError(e));
                }
                None => self.finished = true,
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Whole-event reader over an [`SseLineReader`].
pub struct SseEventReader {
    lines: SseLineReader,
    parser: SseEventParser,
}

impl SseEventReader {
    pub fn new(lines: SseLineReader) -> Self {
        Self {
            lines,
            parser: SseEventParser::new(),
        }
    }

    pub fn from_response(resp: reqwest::Response) -> Self {
        Self::new(SseLineReader::from_response(resp))
    }

    /// Next complete event; `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, StreamError> {
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    if let Some(ev) = self.parser.feed(&line) {
                        return Ok(Some(ev));
                    }
                }
                None => return Ok(self.parser.finish()),
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session token
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const SESSION_KEY: &str = "sessionId=";

/// The token following `sessionId=`, up to the next `&`, `"` or whitespace.
pub fn extract_session_id(text: &str) -> Option<&str> {
    text.match_indices(SESSION_KEY).find_map(|(idx, _)| {
        let rest = &text[idx + SESSION_KEY.len()..];
        let end = rest
            .find(|c: char| c == '&' || c == '"' || c.is_whitespace())
            .unwrap_or(rest.len());
        let token = &rest[..end];
        (!token.is_empty()).then_some(token)
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
