//! Event-stream frames
//!
//! Each event travels as one `data: <json>\n\n` frame. [`FrameDecoder`] is
//! the client side: it reassembles frames from arbitrary chunks and tells a
//! clean end of stream apart from an unexpected close.

use serde_json::json;
use thiserror::Error;

use crate::core::AgentEvent;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("event stream closed before a done or error event")]
    UnexpectedClose,
}

/// JSON payload of one event
pub fn event_payload(event: &AgentEvent) -> String {
    serde_json::to_string(event)
        .unwrap_or_else(|error| json!({ "type": "error", "error": error.to_string() }).to_string())
}

/// One complete frame
pub fn encode_frame(event: &AgentEvent) -> String {
    format!("data: {}\n\n", event_payload(event))
}

/// Incremental parser for a stream of `data:` frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    data: Vec<String>,
    seen_terminal: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every frame it completed
    pub fn push(&mut self, chunk: &str) -> Vec<Result<AgentEvent, FrameError>> {
        self.buffer.push_str(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    out.push(frame);
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Comments (`:`) and other fields are ignored
        }

        out
    }

    fn dispatch(&mut self) -> Option<Result<AgentEvent, FrameError>> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();

        let parsed = serde_json::from_str::<AgentEvent>(&payload)
            .map_err(|e| FrameError::InvalidPayload(e.to_string()));
        if matches!(&parsed, Ok(event) if event.is_terminal()) {
            self.seen_terminal = true;
        }
        Some(parsed)
    }

    /// Whether a `done` or `error` frame has been decoded
    pub fn seen_terminal(&self) -> bool {
        self.seen_terminal
    }

    /// End of stream. A partial trailing frame is discarded.
    pub fn finish(self) -> Result<(), FrameError> {
        if self.seen_terminal {
            Ok(())
        } else {
            Err(FrameError::UnexpectedClose)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode() {
        assert_eq!(
            encode_frame(&AgentEvent::text("Hi")),
            "data: {\"type\":\"text\",\"text\":\"Hi\"}\n\n"
        );
    }

    #[test]
    fn test_decode_across_chunks() {
        let wire = [
            encode_frame(&AgentEvent::tool_start("vault_read", json!({"path": "a.md"}))),
            encode_frame(&AgentEvent::text("Found it")),
            encode_frame(&AgentEvent::done("s-1")),
        ]
        .concat();

        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for chunk in wire.as_bytes().chunks(7) {
            let chunk = std::str::from_utf8(chunk).unwrap();
            events.extend(decoder.push(chunk).into_iter().map(|r| r.unwrap()));
        }

        assert_eq!(
            events,
            vec![
                AgentEvent::tool_start("vault_read", json!({"path": "a.md"})),
                AgentEvent::text("Found it"),
                AgentEvent::done("s-1"),
            ]
        );
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn test_unexpected_close() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push("data: {\"type\":\"text\",\"text\":\"par");
        assert!(events.is_empty());
        assert_eq!(decoder.finish(), Err(FrameError::UnexpectedClose));
    }

    #[test]
    fn test_crlf_comments_and_bad_payload() {
        let mut decoder = FrameDecoder::new();
        let out = decoder.push(": keep-alive\r\n\r\ndata: not json\r\n\r\ndata: {\"type\":\"error\",\"error\":\"x\"}\r\n\r\n");
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(FrameError::InvalidPayload(_))));
        assert_eq!(out[1], Ok(AgentEvent::error("x")));
        assert!(decoder.seen_terminal());
    }
}
