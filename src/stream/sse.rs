//!
//! Line-oriented SSE parser.
//!
//! Input arrives in arbitrary byte chunks that ignore line boundaries. The
//! parser keeps the trailing partial line across calls (as raw bytes, so a
//! multi-byte character split between chunks survives) and emits one
//! [SseEvent] per `data:` line. An `event:` line labels the next `data:`
//! line; blank lines and comments are skipped.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

use serde_json::Value;

/** sentinel some vendors send as the last data line */
pub const DONE_MARKER: &str = "[DONE]";

///
/// Payload of one `data:` line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseData {
    Json(Value),
    Text(String),
}

///
/// Decoded protocol unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /** label from the preceding `event:` line */
    pub event_type: Option<String>,
    pub data: SseData,
}

///
/// Incremental parser state.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
    pending_event: Option<String>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Feed a chunk and collect the events its complete lines produce.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.parse_line(&line[..line.len() - 1]) {
                events.push(event);
            }
        }
        events
    }

    ///
    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&line).into_iter().collect()
    }

    fn parse_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        let decoded = String::from_utf8_lossy(raw);
        let line = decoded.strip_suffix('\r').unwrap_or(&decoded);

        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        if let Some(value) = line.strip_prefix("event:") {
            let value = value.trim();
            self.pending_event = (!value.is_empty()).then(|| value.to_string());
            return None;
        }

        let value = line.strip_prefix("data:")?.trim_start();
        let data = if value == DONE_MARKER {
            SseData::Text(value.to_string())
        } else {
            serde_json::from_str(value)
                .map(SseData::Json)
                .unwrap_or_else(|_| SseData::Text(value.to_string()))
        };

        Some(SseEvent { event_type: self.pending_event.take(), data })
    }
}

impl SseEvent {
    ///
    /// JSON payload with the `event:` label copied into `type` when the
    /// payload does not name its own type.
    ///
    /// # Returns
    ///  * `None` for non-object payloads and for objects that end up with no
    ///    `type` at all; neither can be dispatched, so both are skipped
    pub fn typed_json(self) -> Option<Value> {
        let SseData::Json(Value::Object(mut map)) = self.data else {
            return None;
        };
        if !map.contains_key("type") {
            let event_type = self.event_type?;
            map.insert("type".to_string(), Value::String(event_type));
        }
        Some(Value::Object(map))
    }
}
