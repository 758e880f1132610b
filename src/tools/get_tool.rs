//! Full-document fetch tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::tool::{parse_input, Tool, ToolResult};
use crate::core::BridgeResult;
use crate::llm::{ToolDefinition, ToolInputSchema};
use crate::search::SearchBackend;

const NAME: &str = "qmd_get";

/// Retrieves a whole document from the index by path or document id
pub struct QmdGetTool {
    backend: Arc<dyn SearchBackend>,
}

#[derive(Debug, Deserialize)]
struct GetInput {
    #[serde(rename = "ref")]
    reference: String,
}

impl QmdGetTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for QmdGetTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Retrieve full document content by file path or document ID."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new()
                .with_properties(json!({
                    "ref": {
                        "type": "string",
                        "description": "File path or document ID"
                    }
                }))
                .with_required(&["ref"]),
        }
    }

    async fn execute(&self, input: &Value) -> BridgeResult<ToolResult> {
        let input: GetInput = parse_input(NAME, input)?;
        let text = self.backend.get(&input.reference).await?;
        Ok(ToolResult::success(text))
    }
}
