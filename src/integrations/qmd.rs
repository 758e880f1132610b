//! qmd subprocess client
//!
//! Every call spawns `qmd <subcommand> ...` and waits for it to exit.
//! A non-zero exit is an [`BridgeError::ExternalTool`] carrying the exit code
//! and standard error text.

use async_trait::async_trait;
use serde_json::Value;

use super::process;
use crate::core::{BridgeError, BridgeResult};
use crate::search::{SearchBackend, SearchOptions, SearchResult};

/// Runs the `qmd` command line tool
#[derive(Debug, Clone)]
pub struct QmdClient {
    command: String,
}

impl QmdClient {
    /// Create a client for the given executable name or path
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(&self, args: Vec<String>) -> BridgeResult<String> {
        process::run_captured(&self.command, &args).await
    }

    fn search_args(subcommand: &str, query: &str, options: SearchOptions) -> Vec<String> {
        let mut args = vec![subcommand.to_string(), query.to_string(), "--json".to_string()];
        if let Some(limit) = options.limit.filter(|l| *l > 0) {
            args.push("-n".to_string());
            args.push(limit.to_string());
        }
        if let Some(min_score) = options.min_score.filter(|s| *s > 0.0) {
            args.push("--min-score".to_string());
            args.push(min_score.to_string());
        }
        args
    }

    async fn search_with(
        &self,
        subcommand: &str,
        query: &str,
        options: SearchOptions,
    ) -> BridgeResult<Vec<SearchResult>> {
        let args = Self::search_args(subcommand, query, options);
        let line = process::command_line(&self.command, &args);
        let stdout = self.run(args).await?;
        parse_results(&stdout).map_err(|e| BridgeError::external(line, e))
    }

    /// Register a directory as a qmd collection
    pub async fn collection_add(&self, path: &str, name: &str) -> BridgeResult<()> {
        self.run(vec![
            "collection".into(),
            "add".into(),
            path.into(),
            "--name".into(),
            name.into(),
        ])
        .await
        .map(|_| ())
    }

    /// Attach a description to a collection URI
    pub async fn context_add(&self, uri: &str, description: &str) -> BridgeResult<()> {
        self.run(vec!["context".into(), "add".into(), uri.into(), description.into()])
            .await
            .map(|_| ())
    }

    /// Whether `qmd --version` runs successfully
    pub async fn is_available(&self) -> bool {
        self.run(vec!["--version".into()]).await.is_ok()
    }
}

/// Parse qmd `--json` output. Empty output means no hits.
fn parse_results(stdout: &str) -> Result<Vec<SearchResult>, String> {
    if stdout.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(stdout).map_err(|e| format!("invalid JSON output: {}", e))
}

#[async_trait]
impl SearchBackend for QmdClient {
    async fn lexical(&self, query: &str, options: SearchOptions) -> BridgeResult<Vec<SearchResult>> {
        self.search_with("search", query, options).await
    }

    async fn semantic(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> BridgeResult<Vec<SearchResult>> {
        self.search_with("vsearch", query, options).await
    }

    async fn combined(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> BridgeResult<Vec<SearchResult>> {
        self.search_with("query", query, options).await
    }

    async fn get(&self, reference: &str) -> BridgeResult<String> {
        match self.run(vec!["get".into(), reference.into()]).await {
            Ok(text) if text.is_empty() => Err(BridgeError::not_found(reference)),
            Ok(text) => Ok(text),
            Err(BridgeError::ExternalTool { message, .. })
                if message.to_lowercase().contains("not found") =>
            {
                Err(BridgeError::not_found(reference))
            }
            Err(e) => Err(e),
        }
    }

    async fn status(&self) -> BridgeResult<Value> {
        let stdout = self.run(vec!["status".into(), "--json".into()]).await?;
        Ok(serde_json::from_str(&stdout)?)
    }

    async fn update(&self) -> BridgeResult<()> {
        self.run(vec!["update".into()]).await.map(|_| ())
    }

    async fn embed(&self) -> BridgeResult<()> {
        self.run(vec!["embed".into()]).await.map(|_| ())
    }
}
