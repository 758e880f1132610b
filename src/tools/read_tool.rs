//! Note reading tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::tool::{parse_input, Tool, ToolResult};
use crate::core::BridgeResult;
use crate::integrations::vault_fs;
use crate::llm::{ToolDefinition, ToolInputSchema};

const NAME: &str = "vault_read";

/// Reads one note as `{path, frontmatter, body}`
pub struct VaultReadTool {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ReadInput {
    path: String,
}

impl VaultReadTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for VaultReadTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read a note's raw content including parsed frontmatter."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new()
                .with_properties(json!({
                    "path": {
                        "type": "string",
                        "description": "Relative path to note within vault"
                    }
                }))
                .with_required(&["path"]),
        }
    }

    async fn execute(&self, input: &Value) -> BridgeResult<ToolResult> {
        let input: ReadInput = parse_input(NAME, input)?;
        let note = vault_fs::read_note(&self.root, &input.path).await?;
        Ok(ToolResult::success(serde_json::to_string_pretty(&note)?))
    }
}
