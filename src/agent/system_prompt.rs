//! System prompts built from the current vault

use crate::config::Config;
use crate::integrations::vault_fs::{self, RecentNote, VaultStats};

/// Prompt for single questions
pub async fn ask_system_prompt(config: &Config) -> String {
    let stats = match vault_fs::vault_stats(&config.vault.path).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::warn!("[SystemPrompt] Could not read vault stats: {}", e);
            VaultStats::default()
        }
    };
    render_ask_prompt(config, &stats)
}

/// Prompt for interactive sessions
pub async fn chat_system_prompt(config: &Config) -> String {
    let base = ask_system_prompt(config).await;
    format!("{}\n\n{}", base, CHAT_ADDENDUM)
}

/// Prompt for suggesting `[[wikilinks]]` in one note
pub async fn link_suggest_system_prompt(
    config: &Config,
    note_path: &str,
    existing_links: &[String],
) -> String {
    let base = ask_system_prompt(config).await;
    let existing = if existing_links.is_empty() {
        "(none)".to_string()
    } else {
        existing_links
            .iter()
            .map(|link| format!("[[{}]]", link))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "{base}

## Link Suggestion
- Target note: {note_path}
- Links already in the note: {existing}
- Read the target note with vault_read first
- Use qmd_search to find other notes on the same people, projects and ideas
- Only suggest notes that exist; never invent link targets
- Do not repeat links the note already has
- For each suggestion give the [[wikilink]], the phrase it belongs on, and one line on why",
    )
}

/// Prompt for reviewing recently modified notes
pub async fn review_system_prompt(config: &Config, recent: &[RecentNote]) -> String {
    let base = ask_system_prompt(config).await;
    let notes = recent
        .iter()
        .map(|note| format!("- {} (modified {})", note.path, note.modified.format("%Y-%m-%d %H:%M")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{base}

## Review
Recently modified notes, newest first:
{notes}

- Read each note with vault_read
- Summarize the main themes across them
- Point out open questions, unfinished tasks and ideas worth following up
- Suggest connections to older notes, found with qmd_search, as [[wikilinks]]
- Keep the review short and actionable",
    )
}

const CHAT_ADDENDUM: &str = "## Chat Session
- This is an interactive multi-turn conversation
- You may reference information from earlier in the conversation
- When the user asks you to create or edit notes, use vault_write
- Ask clarifying questions when the user's intent is ambiguous
- You can use obsidian_eval for live Obsidian queries if available";

fn render_ask_prompt(config: &Config, stats: &VaultStats) -> String {
    let folders = if stats.folders.is_empty() {
        "(flat structure)".to_string()
    } else {
        stats.folders.join(", ")
    };

    format!(
        "You are a research assistant for an Obsidian vault.

## Vault Context
- Path: {path}
- Collection: {collection}
- Total notes: {notes}
- Folders: {folders}

## Instructions
- Use qmd_search to find relevant notes (prefer hybrid mode for best results)
- Use qmd_get to read full document content when you need details
- Use vault_list and vault_read for browsing and reading specific notes
- Cite sources using [[wikilinks]] notation (e.g. [[note-name]])
- Be concise and direct in your answers
- If you can't find relevant information, say so honestly
- Do NOT modify vault files unless explicitly asked to",
        path = config.vault.path.display(),
        collection = config.vault.qmd_collection,
        notes = stats.total_notes,
        folders = folders,
    )
}
