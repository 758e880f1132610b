//! Tool surface exposed to the agent
//!
//! This module provides:
//! - `Tool` trait - Interface for implementing tools
//! - `ToolResult` - Result type for tool execution
//! - `ToolRegistry` - Registry for managing available tools
//! - `build_registry` - The six vault tools over one vault root

mod eval_tool;
mod get_tool;
mod list_tool;
mod read_tool;
mod registry;
mod search_tool;
mod tool;
mod write_tool;

pub use eval_tool::{ObsidianEvalTool, UNAVAILABLE_MESSAGE};
pub use get_tool::QmdGetTool;
pub use list_tool::VaultListTool;
pub use read_tool::VaultReadTool;
pub use registry::{build_registry, ToolRegistry};
pub use search_tool::QmdSearchTool;
pub use tool::{parse_input, Tool, ToolResult};
pub use write_tool::VaultWriteTool;
