pub mod anthropic;
pub mod auth;
pub mod types;

pub use anthropic::AnthropicClient;
pub use auth::{check_auth, check_auth_with, process_env, AuthError, Credential, EnvLookup};
pub use types::{
    joined_text, ContentBlock, Message, MessageContent, MessageRequest, MessageResponse, Role,
    StopReason, ToolDefinition, ToolInputSchema, Usage,
};
