//! Native message protocol of the agent backend
//!
//! A backend streams these while it runs a turn. Only assistant content,
//! tool-result echoes and the final result carry anything the bridge needs;
//! the rest is observed and dropped by the normalizer.

use serde::{Deserialize, Serialize};

use crate::llm::ContentBlock;

/// Result subtype of a turn that finished normally
pub const SUCCESS: &str = "success";
/// Result subtype when the round-trip budget ran out
pub const ERROR_MAX_TURNS: &str = "error_max_turns";
/// Result subtype when the backend or a tool failed mid-turn
pub const ERROR_DURING_EXECUTION: &str = "error_during_execution";

/// Content payload of an assistant or user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeContent {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

/// One message of the backend's stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NativeMessage {
    /// Session bookkeeping (`init` when a turn starts)
    System {
        subtype: String,
        session_id: String,
        #[serde(default)]
        tools: Vec<String>,
        #[serde(default)]
        model: Option<String>,
    },

    /// Model output for one round trip
    Assistant {
        session_id: String,
        message: NativeContent,
    },

    /// Tool results fed back to the model
    User {
        session_id: String,
        message: NativeContent,
    },

    /// Terminal message of a turn
    Result {
        subtype: String,
        session_id: String,
        #[serde(default)]
        errors: Vec<String>,
        #[serde(default)]
        num_turns: u32,
        /// Final assistant text on success
        #[serde(default)]
        result: Option<String>,
    },

    /// Any message kind this bridge does not model
    #[serde(other)]
    Unknown,
}

impl NativeMessage {
    pub fn init(session_id: impl Into<String>, tools: Vec<String>, model: impl Into<String>) -> Self {
        NativeMessage::System {
            subtype: "init".to_string(),
            session_id: session_id.into(),
            tools,
            model: Some(model.into()),
        }
    }

    pub fn assistant(session_id: impl Into<String>, blocks: Vec<ContentBlock>) -> Self {
        NativeMessage::Assistant {
            session_id: session_id.into(),
            message: NativeContent {
                role: "assistant".to_string(),
                content: blocks,
            },
        }
    }

    pub fn user(session_id: impl Into<String>, blocks: Vec<ContentBlock>) -> Self {
        NativeMessage::User {
            session_id: session_id.into(),
            message: NativeContent {
                role: "user".to_string(),
                content: blocks,
            },
        }
    }

    pub fn success(session_id: impl Into<String>, num_turns: u32, text: Option<String>) -> Self {
        NativeMessage::Result {
            subtype: SUCCESS.to_string(),
            session_id: session_id.into(),
            errors: Vec::new(),
            num_turns,
            result: text,
        }
    }

    pub fn failure(
        subtype: impl Into<String>,
        session_id: impl Into<String>,
        errors: Vec<String>,
        num_turns: u32,
    ) -> Self {
        NativeMessage::Result {
            subtype: subtype.into(),
            session_id: session_id.into(),
            errors,
            num_turns,
            result: None,
        }
    }

    /// Short kind label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            NativeMessage::System { .. } => "system",
            NativeMessage::Assistant { .. } => "assistant",
            NativeMessage::User { .. } => "user",
            NativeMessage::Result { .. } => "result",
            NativeMessage::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_result() {
        let raw = json!({
            "type": "result",
            "subtype": "error_max_turns",
            "session_id": "s-1",
            "errors": ["limit reached"],
            "num_turns": 25,
            "total_cost_usd": 0.12
        });
        let msg: NativeMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(
            msg,
            NativeMessage::failure(ERROR_MAX_TURNS, "s-1", vec!["limit reached".into()], 25)
        );
    }

    #[test]
    fn test_unrecognized_kind() {
        let raw = json!({"type": "stream_event", "event": {}});
        let msg: NativeMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg, NativeMessage::Unknown);
        assert_eq!(msg.kind(), "unknown");
    }

    #[test]
    fn test_assistant_shape() {
        let msg = NativeMessage::assistant("s-1", vec![ContentBlock::text("Hello")]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "assistant",
                "session_id": "s-1",
                "message": {"role": "assistant", "content": [{"type": "text", "text": "Hello"}]}
            })
        );
    }
}
