//! One-shot vault tasks
//!
//! Link suggestion and recent-note review are single questions with their own
//! system prompt and turn budget. Both run through [`AgentBridge::ask`], so
//! they never leave a resumable session behind.
//!
//! [`AgentBridge::ask`]: super::AgentBridge::ask

use super::engine::ConversationRequest;
use super::system_prompt::{link_suggest_system_prompt, review_system_prompt};
use crate::config::Config;
use crate::core::{BridgeError, BridgeResult};
use crate::integrations::vault_fs::{self, RecentNote};

pub const LINK_SUGGEST_MAX_TURNS: u32 = 6;
pub const REVIEW_MAX_TURNS: u32 = 20;
pub const DEFAULT_REVIEW_DAYS: u32 = 7;

/// Question asking for `[[wikilink]]` suggestions in `file`.
///
/// With `apply` the agent is also told to rewrite the note in place. Fails
/// with `NotFound` when the note does not exist.
pub async fn link_suggest_request(
    config: &Config,
    file: &str,
    apply: bool,
    model: Option<String>,
) -> BridgeResult<ConversationRequest> {
    let note = vault_fs::read_note(&config.vault.path, file).await?;
    let existing = vault_fs::extract_wikilinks(&note.body);
    tracing::debug!("[Tasks] {} already links {:?}", note.path, existing);

    let system_prompt = link_suggest_system_prompt(config, &note.path, &existing).await;
    let prompt = if apply {
        format!(
            "Analyze the note at \"{}\" and suggest [[wikilinks]]. Then apply the suggestions \
             by rewriting the note with vault_write, inserting wikilinks inline where they fit \
             naturally in the text. Do NOT add a links section at the bottom; weave them into \
             existing sentences.",
            note.path
        )
    } else {
        format!(
            "Analyze the note at \"{}\" and suggest [[wikilinks]] that should be added.",
            note.path
        )
    };

    Ok(ConversationRequest::new(prompt)
        .with_model(model)
        .with_max_turns(Some(LINK_SUGGEST_MAX_TURNS))
        .with_system_prompt(Some(system_prompt)))
}

/// What a review over the last few days amounts to
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewPlan {
    /// No note changed inside the window; nothing to ask
    NothingRecent { days: u32 },
    Run {
        request: ConversationRequest,
        notes: Vec<RecentNote>,
    },
}

/// Look up notes modified in the last `days` days and build the review
/// question for them
pub async fn plan_review(config: &Config, days: u32, model: Option<String>) -> BridgeResult<ReviewPlan> {
    if days == 0 {
        return Err(BridgeError::validation("days must be a positive number"));
    }

    let notes = vault_fs::recent_notes(&config.vault.path, days).await?;
    if notes.is_empty() {
        return Ok(ReviewPlan::NothingRecent { days });
    }

    let system_prompt = review_system_prompt(config, &notes).await;
    let request = ConversationRequest::new(format!(
        "Review the {} recently modified notes and provide actionable insights.",
        notes.len()
    ))
    .with_model(model)
    .with_max_turns(Some(REVIEW_MAX_TURNS))
    .with_system_prompt(Some(system_prompt));

    Ok(ReviewPlan::Run { request, notes })
}

/// `1 day`, `3 days`
pub fn count_of(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}
