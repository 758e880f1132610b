//! The [`Tool`] seam and the result a tool hands back to the model

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{BridgeError, BridgeResult};
use crate::llm::ToolDefinition;

/// Text returned to the model for one tool call. `is_error` marks output the
/// model should treat as a failure report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::success(message)
        }
    }
}

/// A vault capability exposed to the agent.
///
/// `execute` returns `Err` with a tool-level error (`Validation`,
/// `NotFound`) when the agent should see the failure and carry on, and with
/// any other error when the turn has to stop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key; also the name the model calls
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, input: &Value) -> BridgeResult<ToolResult>;
}

/// Deserialize tool input, mapping schema mismatches to a validation error
pub fn parse_input<T: DeserializeOwned>(tool: &str, input: &Value) -> BridgeResult<T> {
    serde_json::from_value(input.clone())
        .map_err(|e| BridgeError::validation(format!("{}: {}", tool, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_result_keeps_message() {
        assert_eq!(
            ToolResult::error("no such note"),
            ToolResult {
                output: "no such note".to_string(),
                is_error: true,
            }
        );
        assert!(!ToolResult::success("[]").is_error);
    }

    #[test]
    fn test_parse_input_validation() {
        #[derive(Debug, Deserialize)]
        struct Input {
            #[allow(dead_code)]
            path: String,
        }

        let err = parse_input::<Input>("vault_read", &json!({"path": 3})).unwrap_err();
        assert!(err.is_tool_level());
        assert!(err.to_string().contains("vault_read"));
    }
}
