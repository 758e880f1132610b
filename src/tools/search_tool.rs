//! Index search tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::tool::{parse_input, Tool, ToolResult};
use crate::core::BridgeResult;
use crate::llm::{ToolDefinition, ToolInputSchema};
use crate::search::{dispatch, SearchBackend, SearchMode, SearchOptions};

const NAME: &str = "qmd_search";
const DEFAULT_LIMIT: u32 = 10;

/// Searches vault notes through the search backend
pub struct QmdSearchTool {
    backend: Arc<dyn SearchBackend>,
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default)]
    mode: SearchMode,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl QmdSearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for QmdSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search vault notes using hybrid BM25 + semantic search. Returns scored results with snippets."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new()
                .with_properties(json!({
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "mode": {
                        "type": "string",
                        "enum": ["keyword", "semantic", "hybrid"],
                        "default": "hybrid",
                        "description": "Search mode"
                    },
                    "limit": {
                        "type": "integer",
                        "default": DEFAULT_LIMIT,
                        "description": "Max results to return"
                    }
                }))
                .with_required(&["query"]),
        }
    }

    async fn execute(&self, input: &Value) -> BridgeResult<ToolResult> {
        let input: SearchInput = parse_input(NAME, input)?;

        let results = dispatch(
            self.backend.as_ref(),
            &input.query,
            input.mode,
            SearchOptions::with_limit(input.limit),
        )
        .await?;

        Ok(ToolResult::success(serde_json::to_string_pretty(&results)?))
    }
}
