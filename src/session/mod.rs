//! Session continuity across HTTP turns
//!
//! Maps the session id a client chooses to the agent backend's own session
//! id, so the next `/chat` request can resume the same conversation.

pub mod store;

pub use store::{LruMap, SessionStore, DEFAULT_CAPACITY};
