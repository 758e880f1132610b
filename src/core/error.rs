//! Bridge error types

use thiserror::Error;

use crate::llm::AuthError;

/// Errors that can occur while bridging a conversation to the vault
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No usable credentials in the environment
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Tool input did not match the tool's schema
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Referenced note or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note exists but cannot be read or written (a directory, not UTF-8,
    /// permission denied)
    #[error("Cannot access note: {0}")]
    NoteAccess(String),

    /// Search or host-app subprocess failed
    #[error("{command} failed: {message}")]
    ExternalTool {
        /// Command line that was run
        command: String,
        /// Exit status and standard error text
        message: String,
    },

    /// Agent backend finished the turn with a non-success result
    #[error("{0}")]
    BackendResult(String),

    /// Configuration missing or malformed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// HTTP transport failure talking to the model API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        BridgeError::Validation(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        BridgeError::NotFound(what.into())
    }

    pub fn note_access(detail: impl Into<String>) -> Self {
        BridgeError::NoteAccess(detail.into())
    }

    /// Create an external tool error
    pub fn external(command: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::ExternalTool {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Tool-level errors go back to the model as tool output; everything
    /// else ends the current turn.
    pub fn is_tool_level(&self) -> bool {
        matches!(
            self,
            BridgeError::Validation(_) | BridgeError::NotFound(_) | BridgeError::NoteAccess(_)
        )
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
