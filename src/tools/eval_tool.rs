//! Host application evaluation tool
//!
//! Never fails the turn: an unavailable host yields a fallback hint and an
//! evaluation failure comes back as error text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::tool::{parse_input, Tool, ToolResult};
use crate::core::BridgeResult;
use crate::integrations::HostApp;
use crate::llm::{ToolDefinition, ToolInputSchema};

const NAME: &str = "obsidian_eval";

pub const UNAVAILABLE_MESSAGE: &str =
    "Obsidian CLI is not available. Use vault_read/vault_list for file operations instead.";

/// Runs JavaScript inside Obsidian
pub struct ObsidianEvalTool {
    host: Arc<dyn HostApp>,
}

#[derive(Debug, Deserialize)]
struct EvalInput {
    code: String,
}

impl ObsidianEvalTool {
    pub fn new(host: Arc<dyn HostApp>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Tool for ObsidianEvalTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Execute JavaScript in Obsidian's context (requires Obsidian CLI). Returns result or error if unavailable."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new()
                .with_properties(json!({
                    "code": {
                        "type": "string",
                        "description": "JavaScript code to evaluate in Obsidian"
                    }
                }))
                .with_required(&["code"]),
        }
    }

    async fn execute(&self, input: &Value) -> BridgeResult<ToolResult> {
        let input: EvalInput = parse_input(NAME, input)?;

        if !self.host.is_available().await {
            return Ok(ToolResult::success(UNAVAILABLE_MESSAGE));
        }

        match self.host.eval(&input.code).await {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => {
                tracing::info!("[ObsidianEval] {}", e);
                Ok(ToolResult::error(format!("Obsidian eval error: {}", e)))
            }
        }
    }
}
