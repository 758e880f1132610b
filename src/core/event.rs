//! Normalized events streamed out of a conversation turn

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One normalized event of a conversation turn.
///
/// Serialized with a `type` tag and camelCase fields, which is the payload of
/// each `data:` frame on the HTTP event stream:
///
/// ```json
/// {"type":"tool_start","toolName":"qmd_search","toolInput":{"query":"ideas"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    /// Assistant text fragment
    Text {
        /// The text
        text: String,
    },

    /// The agent invoked a tool
    ToolStart {
        /// Tool name
        tool_name: String,
        /// Tool input as sent by the model
        tool_input: Value,
    },

    /// A tool invocation produced its output
    ToolEnd {
        /// Tool name
        tool_name: String,
        /// Tool output text
        tool_result: String,
    },

    /// Turn finished successfully
    Done {
        /// Agent backend session id, usable as a resume token
        session_id: String,
    },

    /// Turn finished with an error
    Error {
        /// Error message
        error: String,
    },
}

impl AgentEvent {
    /// Create a text event
    pub fn text(text: impl Into<String>) -> Self {
        AgentEvent::Text { text: text.into() }
    }

    /// Create a tool start event
    pub fn tool_start(name: impl Into<String>, input: Value) -> Self {
        AgentEvent::ToolStart {
            tool_name: name.into(),
            tool_input: input,
        }
    }

    /// Create a tool end event
    pub fn tool_end(name: impl Into<String>, result: impl Into<String>) -> Self {
        AgentEvent::ToolEnd {
            tool_name: name.into(),
            tool_result: result.into(),
        }
    }

    /// Create a done event
    pub fn done(session_id: impl Into<String>) -> Self {
        AgentEvent::Done {
            session_id: session_id.into(),
        }
    }

    /// Create an error event
    pub fn error(msg: impl Into<String>) -> Self {
        AgentEvent::Error { error: msg.into() }
    }

    /// Check if this event ends the turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. } | AgentEvent::Error { .. })
    }

    /// Session id carried by a `Done` event
    pub fn session_id(&self) -> Option<&str> {
        match self {
            AgentEvent::Done { session_id } => Some(session_id.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_checks() {
        assert!(AgentEvent::done("s1").is_terminal());
        assert!(AgentEvent::error("oops").is_terminal());
        assert!(!AgentEvent::text("hello").is_terminal());
        assert!(!AgentEvent::tool_start("vault_list", json!({})).is_terminal());
    }

    #[test]
    fn test_wire_shape() {
        let event = AgentEvent::tool_start("qmd_search", json!({"query": "ideas"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "tool_start", "toolName": "qmd_search", "toolInput": {"query": "ideas"}})
        );

        let value = serde_json::to_value(AgentEvent::done("abc")).unwrap();
        assert_eq!(value, json!({"type": "done", "sessionId": "abc"}));

        let value = serde_json::to_value(AgentEvent::error("boom")).unwrap();
        assert_eq!(value, json!({"type": "error", "error": "boom"}));
    }

    #[test]
    fn test_parse_frame_payload() {
        let event: AgentEvent = serde_json::from_str(r#"{"type":"text","text":"Hello"}"#).unwrap();
        assert_eq!(event, AgentEvent::text("Hello"));
        assert_eq!(AgentEvent::done("x").session_id(), Some("x"));
        assert_eq!(event.session_id(), None);
    }
}
