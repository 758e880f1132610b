//! Core types shared by every layer of the bridge
//!
//! - `AgentEvent` - Normalized event emitted during a conversation turn
//! - `BridgeError` - Error taxonomy

pub mod error;
pub mod event;

pub use error::{BridgeError, BridgeResult};
pub use event::AgentEvent;
