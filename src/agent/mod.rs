//! Agent session bridge
//!
//! - `native` - the backend's native message protocol
//! - `backend` - `AgentBackend` trait and the Anthropic tool loop
//! - `normalizer` - native stream to `AgentEvent` projection
//! - `engine` - `AgentBridge`, the entry point for both transports
//! - `system_prompt` - prompts built from vault statistics
//! - `tasks` - link suggestion and recent-note review, built on `ask`

pub mod backend;
pub mod engine;
pub mod native;
pub mod normalizer;
pub mod system_prompt;
pub mod tasks;

pub use backend::{AgentBackend, AnthropicBackend, NativeStream, QueryOptions};
pub use engine::{AgentBridge, ConversationRequest};
pub use native::NativeMessage;
pub use normalizer::{normalize, EventNormalizer, EventStream, NormalizerState};
pub use tasks::{link_suggest_request, plan_review, ReviewPlan};
