//! Configuration file
//!
//! Stored as JSON at `~/.research-assistant/config.json`. Every section and
//! field has a default, so a partial file loads.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::EnvLookup;
use crate::search::SearchMode;

/// Directory name under the home directory
pub const CONFIG_DIR_NAME: &str = ".research-assistant";

/// Overrides `vault.path` when set
pub const VAULT_ENV_VAR: &str = "RA_VAULT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub path: PathBuf,
    /// qmd collection registered for this vault
    #[serde(default)]
    pub qmd_collection: String,
    /// Whether the Obsidian CLI was found at init
    #[serde(default)]
    pub obsidian_cli: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub search_mode: SearchMode,
    #[serde(default = "default_search_results")]
    pub search_results: u32,
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}
fn default_search_results() -> u32 {
    10
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            search_mode: SearchMode::default(),
            search_results: default_search_results(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model round trips allowed per turn
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_turns() -> u32 {
    25
}
fn default_permission_mode() -> String {
    "bypassPermissions".to_string()
}
fn default_max_tokens() -> u32 {
    8192
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            permission_mode: default_permission_mode(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on remembered chat sessions
    #[serde(default = "default_session_capacity")]
    pub session_capacity: usize,
}

fn default_port() -> u16 {
    3117
}
fn default_session_capacity() -> usize {
    crate::session::DEFAULT_CAPACITY
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            session_capacity: default_session_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default = "default_qmd_command")]
    pub qmd_command: String,
    #[serde(default = "default_obsidian_command")]
    pub obsidian_command: String,
}

fn default_qmd_command() -> String {
    "qmd".to_string()
}
fn default_obsidian_command() -> String {
    "obsidian".to_string()
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            qmd_command: default_qmd_command(),
            obsidian_command: default_obsidian_command(),
        }
    }
}

impl Config {
    /// Apply environment overrides
    pub fn apply_env(&mut self, env: EnvLookup) {
        if let Some(path) = env(VAULT_ENV_VAR).filter(|p| !p.trim().is_empty()) {
            tracing::debug!("[Config] {} overrides vault path: {}", VAULT_ENV_VAR, path);
            self.vault.path = PathBuf::from(path);
        }
    }

    /// Last path component of the vault, for banners
    pub fn vault_name(&self) -> String {
        self.vault
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "vault".to_string())
    }
}

/// `~/.research-assistant`
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// `~/.research-assistant/config.json`
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

pub fn config_exists() -> bool {
    config_path().map(|p| p.exists()).unwrap_or(false)
}

/// Load the config file, failing when `ra init` has not been run
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        anyhow::bail!("No configuration found. Run 'ra init <vault-path>' first.");
    }
    let mut config = load_config_from(&path)?;
    config.apply_env(crate::llm::process_env);
    Ok(config)
}

/// Load the config file, or defaults when there is none yet
pub fn load_or_default() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, &config_path()?)
}

/// Write pretty JSON with a trailing newline, creating the directory
pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    }
    let mut json = serde_json::to_string_pretty(config)?;
    json.push('\n');
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.defaults.model, "claude-sonnet-4-5");
        assert_eq!(config.defaults.search_mode, SearchMode::Hybrid);
        assert_eq!(config.defaults.search_results, 10);
        assert_eq!(config.agent.max_turns, 25);
        assert_eq!(config.agent.permission_mode, "bypassPermissions");
        assert_eq!(config.server.port, 3117);
    }

    #[test]
    fn test_partial_file_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"vault": {"path": "/notes", "qmd_collection": "notes"}, "agent": {"max_turns": 5}}"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.vault.path, PathBuf::from("/notes"));
        assert!(!config.vault.obsidian_cli);
        assert_eq!(config.agent.max_turns, 5);
        assert_eq!(config.agent.max_tokens, 8192);
        assert_eq!(config.defaults.search_mode, SearchMode::Hybrid);
        assert_eq!(config.vault_name(), "notes");
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.json");

        let mut config = Config::default();
        config.vault.path = PathBuf::from("/vault");
        config.defaults.search_mode = SearchMode::Keyword;
        save_config_to(&config, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with("}\n"));
        assert!(raw.contains("\"search_mode\": \"keyword\""));
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_env_override() {
        fn env(name: &str) -> Option<String> {
            (name == VAULT_ENV_VAR).then(|| "/elsewhere".to_string())
        }

        let mut config = Config::default();
        config.apply_env(env);
        assert_eq!(config.vault.path, PathBuf::from("/elsewhere"));
    }
}
