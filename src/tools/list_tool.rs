//! Vault listing tool

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

use super::tool::{parse_input, Tool, ToolResult};
use crate::core::BridgeResult;
use crate::integrations::vault_fs;
use crate::llm::{ToolDefinition, ToolInputSchema};

const NAME: &str = "vault_list";

/// Lists markdown notes, optionally under one folder prefix
pub struct VaultListTool {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ListInput {
    folder: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListItem {
    path: String,
    basename: String,
}

impl VaultListTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Exact, case-sensitive prefix match on the relative path
fn filter_by_folder(notes: Vec<String>, folder: Option<&str>) -> Vec<String> {
    match folder {
        Some(prefix) if !prefix.is_empty() => notes
            .into_iter()
            .filter(|n| n.starts_with(prefix))
            .collect(),
        _ => notes,
    }
}

fn to_item(path: String) -> ListItem {
    let file = path.rsplit('/').next().unwrap_or(&path);
    let basename = file.strip_suffix(".md").unwrap_or(file).to_string();
    ListItem { path, basename }
}

#[async_trait]
impl Tool for VaultListTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "List all markdown notes in the vault, optionally filtered by subfolder."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::new().with_properties(json!({
                "folder": {
                    "type": "string",
                    "description": "Subfolder to filter by"
                }
            })),
        }
    }

    async fn execute(&self, input: &Value) -> BridgeResult<ToolResult> {
        let input: ListInput = parse_input(NAME, input)?;

        let notes = vault_fs::list_notes(&self.root).await?;
        let items: Vec<ListItem> = filter_by_folder(notes, input.folder.as_deref())
            .into_iter()
            .map(to_item)
            .collect();

        Ok(ToolResult::success(serde_json::to_string_pretty(&items)?))
    }
}
