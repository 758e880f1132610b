//! Name-to-tool lookup handed to the agent backend
//!
//! The registry is built once per vault and shared read-only between
//! concurrent conversations.

use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::tool::{Tool, ToolResult};
use super::{
    ObsidianEvalTool, QmdGetTool, QmdSearchTool, VaultListTool, VaultReadTool, VaultWriteTool,
};
use crate::core::BridgeResult;
use crate::integrations::HostApp;
use crate::llm::ToolDefinition;
use crate::search::SearchBackend;

/// Tools keyed by name. Iteration follows registration order.
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
        }
    }

    /// Replaces any tool already registered under the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        tracing::debug!("[ToolRegistry] Registering tool: {}", name);
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Schemas advertised to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Unknown tools and tool-level failures come back as an error
    /// `ToolResult`; only turn-ending failures are returned as `Err`.
    pub async fn execute(&self, name: &str, input: &Value) -> BridgeResult<ToolResult> {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!("[ToolRegistry] Unknown tool requested: {}", name);
            return Ok(ToolResult::error(format!("Unknown tool: {}", name)));
        };

        tracing::info!("[ToolRegistry] Executing tool: {}", name);
        tracing::debug!("[ToolRegistry] Input: {}", input);

        match tool.execute(input).await {
            Ok(result) => {
                tracing::debug!("[ToolRegistry] {} returned is_error={}", name, result.is_error);
                Ok(result)
            }
            Err(e) if e.is_tool_level() => {
                tracing::info!("[ToolRegistry] Tool {} failed: {}", name, e);
                Ok(ToolResult::error(e.to_string()))
            }
            Err(e) => {
                tracing::error!("[ToolRegistry] Tool {} aborted the turn: {}", name, e);
                Err(e)
            }
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the six vault tools over one vault root
pub fn build_registry(
    vault_root: impl Into<PathBuf>,
    search: Arc<dyn SearchBackend>,
    host: Arc<dyn HostApp>,
) -> ToolRegistry {
    let root: PathBuf = vault_root.into();
    let mut registry = ToolRegistry::new();

    registry.register(QmdSearchTool::new(search.clone()));
    registry.register(QmdGetTool::new(search));
    registry.register(VaultListTool::new(root.clone()));
    registry.register(VaultReadTool::new(root.clone()));
    registry.register(VaultWriteTool::new(root));
    registry.register(ObsidianEvalTool::new(host));

    registry
}
