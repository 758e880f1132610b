//! Obsidian CLI client

use async_trait::async_trait;

use super::process;
use crate::core::BridgeResult;

/// A running note-taking application that can evaluate code
#[async_trait]
pub trait HostApp: Send + Sync {
    /// Whether the app can be reached at all
    async fn is_available(&self) -> bool;

    /// Evaluate `code` inside the app and return its output
    async fn eval(&self, code: &str) -> BridgeResult<String>;
}

/// Talks to Obsidian through its `obsidian` command line tool
#[derive(Debug, Clone)]
pub struct ObsidianCli {
    command: String,
    enabled: bool,
}

impl ObsidianCli {
    /// `enabled` comes from config; a disabled client never spawns anything
    pub fn new(command: impl Into<String>, enabled: bool) -> Self {
        Self {
            command: command.into(),
            enabled,
        }
    }

    async fn run(&self, args: &[&str]) -> BridgeResult<String> {
        process::run_captured(&self.command, args).await
    }

    /// Version string reported by the CLI
    pub async fn version(&self) -> Option<String> {
        self.run(&["--version"]).await.ok().filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl HostApp for ObsidianCli {
    async fn is_available(&self) -> bool {
        if !self.enabled {
            return false;
        }
        self.run(&["--version"]).await.is_ok()
    }

    async fn eval(&self, code: &str) -> BridgeResult<String> {
        let arg = format!("code={}", code);
        self.run(&["eval", &arg]).await
    }
}
