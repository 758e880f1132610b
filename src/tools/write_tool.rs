//! Note writing tool
//!
//! The only tool that mutates the vault. Writing the same content twice
//! leaves the file unchanged and reports success both times.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::tool::{parse_input, Tool, ToolResult};
use crate::core::BridgeResult;
use crate::integrations::vault_fs;
use crate::llm::{ToolDefinition, ToolInputSchema};

const NAME: &str = "vault_write";

/// Creates or overwrites a note
pub struct VaultWriteTool {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct WriteInput {
    path: String,
    content: String,
}

impl VaultWriteTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for VaultWriteTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Create or update a note in the vault."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new()
                .with_properties(json!({
                    "path": {
                        "type": "string",
                        "description": "Relative path for the note"
                    },
                    "content": {
                        "type": "string",
                        "description": "Full note content (including frontmatter if needed)"
                    }
                }))
                .with_required(&["path", "content"]),
        }
    }

    async fn execute(&self, input: &Value) -> BridgeResult<ToolResult> {
        let input: WriteInput = parse_input(NAME, input)?;
        vault_fs::write_note(&self.root, &input.path, &input.content).await?;
        Ok(ToolResult::success(format!("Wrote {}", input.path)))
    }
}
