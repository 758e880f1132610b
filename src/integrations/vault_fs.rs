//! Direct filesystem access to the vault
//!
//! Paths handed in by the agent are relative to the vault root. Absolute
//! paths are accepted only when they point inside the root, and any `..`
//! component is rejected before the filesystem is touched.

use chrono::{DateTime, Duration, Utc};
use glob::{glob_with, MatchOptions, Pattern};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use crate::core::{BridgeError, BridgeResult};

/// A note split into front matter and body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Path relative to the vault root
    pub path: String,
    pub frontmatter: Map<String, Value>,
    pub body: String,
}

/// Counts used to describe the vault to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VaultStats {
    pub total_notes: usize,
    pub total_folders: usize,
    /// Non-root folders that contain notes, sorted
    pub folders: Vec<String>,
}

/// A note and when it was last modified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentNote {
    pub path: String,
    pub modified: DateTime<Utc>,
}

/// Whether `path` looks like an Obsidian vault (has a `.obsidian/` directory)
pub fn is_obsidian_vault(path: &Path) -> bool {
    path.join(".obsidian").is_dir()
}

/// Resolve a note path against the vault root
pub fn resolve_note_path(root: &Path, path: &str) -> BridgeResult<PathBuf> {
    let candidate = Path::new(path);

    if path.trim().is_empty() {
        return Err(BridgeError::validation("path must not be empty"));
    }
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(BridgeError::validation(format!(
            "path '{}' must not contain '..'",
            path
        )));
    }

    if candidate.is_absolute() {
        if candidate.starts_with(root) {
            return Ok(candidate.to_path_buf());
        }
        return Err(BridgeError::validation(format!(
            "path '{}' is outside the vault",
            path
        )));
    }

    Ok(root.join(candidate))
}

fn relative_display(root: &Path, full: &Path) -> String {
    let rel = full.strip_prefix(root).unwrap_or(full);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// All `.md` notes under the root as sorted relative paths, hidden entries skipped
pub async fn list_notes(root: &Path) -> BridgeResult<Vec<String>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || list_notes_blocking(&root))
        .await
        .map_err(|e| BridgeError::Io(std::io::Error::other(e)))?
}

fn list_notes_blocking(root: &Path) -> BridgeResult<Vec<String>> {
    if !root.is_dir() {
        return Err(BridgeError::not_found(root.display().to_string()));
    }

    let pattern = format!(
        "{}/**/*.md",
        Pattern::escape(&root.to_string_lossy())
    );
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let entries = glob_with(&pattern, options)
        .map_err(|e| BridgeError::validation(format!("bad vault path: {}", e)))?;

    let mut notes: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .map(|path| relative_display(root, &path))
        .filter(|rel| !rel.split('/').any(|part| part.starts_with('.')))
        .collect();

    notes.sort();
    Ok(notes)
}

/// Read and split a note
pub async fn read_note(root: &Path, path: &str) -> BridgeResult<Note> {
    let full = resolve_note_path(root, path)?;

    let raw = tokio::fs::read_to_string(&full)
        .await
        .map_err(|e| note_io_error(path, e))?;

    let (frontmatter, body) = parse_frontmatter(&raw);
    Ok(Note {
        path: relative_display(root, &full),
        frontmatter,
        body,
    })
}

/// Filesystem failures on a single note are reported back to the agent,
/// never treated as a broken turn
fn note_io_error(path: &str, e: std::io::Error) -> BridgeError {
    match e.kind() {
        std::io::ErrorKind::NotFound => BridgeError::not_found(path),
        _ => BridgeError::note_access(format!("{}: {}", path, e)),
    }
}

/// Create or overwrite a note, creating parent folders as needed
pub async fn write_note(root: &Path, path: &str, content: &str) -> BridgeResult<()> {
    let full = resolve_note_path(root, path)?;

    if let Some(parent) = full.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| note_io_error(path, e))?;
    }
    tokio::fs::write(&full, content)
        .await
        .map_err(|e| note_io_error(path, e))?;

    tracing::info!("[VaultFs] Wrote {} ({} bytes)", full.display(), content.len());
    Ok(())
}

/// Notes modified within the last `days` days, newest first
pub async fn recent_notes(root: &Path, days: u32) -> BridgeResult<Vec<RecentNote>> {
    let cutoff = Utc::now() - Duration::days(i64::from(days));
    let mut recent = Vec::new();

    for path in list_notes(root).await? {
        let modified = match tokio::fs::metadata(root.join(&path)).await.and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(e) => {
                tracing::debug!("[VaultFs] Skipping {}: {}", path, e);
                continue;
            }
        };
        if modified >= cutoff {
            recent.push(RecentNote { path, modified });
        }
    }

    recent.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(recent)
}

fn wikilink() -> Option<&'static Regex> {
    static WIKILINK: OnceLock<Option<Regex>> = OnceLock::new();
    WIKILINK
        .get_or_init(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]+)?\]\]").ok())
        .as_ref()
}

/// Distinct `[[target]]` names in order of first appearance; aliases after
/// `|` are dropped
pub fn extract_wikilinks(content: &str) -> Vec<String> {
    let Some(re) = wikilink() else {
        return Vec::new();
    };

    let mut links: Vec<String> = Vec::new();
    for caps in re.captures_iter(content) {
        if let Some(target) = caps.get(1).map(|m| m.as_str()) {
            if !links.iter().any(|l| l == target) {
                links.push(target.to_string());
            }
        }
    }
    links
}

/// Note and folder counts for the vault
pub async fn vault_stats(root: &Path) -> BridgeResult<VaultStats> {
    let notes = list_notes(root).await?;
    Ok(stats_from_notes(&notes))
}

fn stats_from_notes(notes: &[String]) -> VaultStats {
    let all: std::collections::BTreeSet<&str> = notes
        .iter()
        .map(|n| n.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(""))
        .collect();

    VaultStats {
        total_notes: notes.len(),
        total_folders: all.len(),
        folders: all
            .into_iter()
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect(),
    }
}

fn fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| {
            Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)").ok()
        })
        .as_ref()
}

/// Split a leading `---` block of `key: value` lines from the body.
///
/// Supports scalars, quoted strings, inline `[a, b]` lists and `- item`
/// block lists. Text without a fence has empty front matter.
pub fn parse_frontmatter(raw: &str) -> (Map<String, Value>, String) {
    let Some(caps) = fence().and_then(|re| re.captures(raw)) else {
        return (Map::new(), raw.to_string());
    };

    let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let block = caps.get(1).map(|m| m.as_str()).unwrap_or("");

    let mut data = Map::new();
    let mut list_key: Option<String> = None;
    let mut block_keys: Vec<String> = Vec::new();

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| (trimmed == "-").then_some("")) {
            if let Some(key) = &list_key {
                if let Some(Value::Array(items)) = data.get_mut(key) {
                    items.push(scalar(item.trim()));
                }
            }
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim().to_string();
        let value = value.trim();

        if value.is_empty() {
            data.insert(key.clone(), Value::Array(Vec::new()));
            block_keys.push(key.clone());
            list_key = Some(key);
        } else {
            data.insert(key, scalar(value));
            list_key = None;
        }
    }

    // A key with nothing under it is null, not an empty list
    for key in block_keys {
        if let Some(value) = data.get_mut(&key) {
            if matches!(value, Value::Array(items) if items.is_empty()) {
                *value = Value::Null;
            }
        }
    }

    (data, raw[end..].to_string())
}

fn scalar(value: &str) -> Value {
    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        return Value::Array(
            inner
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(scalar)
                .collect(),
        );
    }

    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return Value::String(value[1..value.len() - 1].to_string());
        }
    }

    match value {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" | "~" => return Value::Null,
        _ => {}
    }

    if let Ok(n) = value.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = value.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }

    Value::String(value.to_string())
}
