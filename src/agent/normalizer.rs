//! Event normalization
//!
//! Narrows the backend's native stream to [`AgentEvent`]s. A turn moves
//! `Idle -> Streaming -> Terminal` and emits exactly one `Done` or `Error`;
//! nothing is emitted once it is terminal.

use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;

use super::backend::NativeStream;
use super::native::{NativeMessage, SUCCESS};
use crate::core::AgentEvent;
use crate::llm::ContentBlock;

/// Normalized event stream of one turn
pub type EventStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

/// Message used when the native stream stops without a result
pub const STREAM_ENDED_EARLY: &str = "agent stream ended without a result";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerState {
    Idle,
    Streaming,
    Terminal,
}

/// Projection from native messages to normalized events
#[derive(Debug)]
pub struct EventNormalizer {
    state: NormalizerState,
    // tool_use id -> tool name, to label tool results
    tool_names: HashMap<String, String>,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self {
            state: NormalizerState::Idle,
            tool_names: HashMap::new(),
        }
    }

    pub fn state(&self) -> NormalizerState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == NormalizerState::Terminal
    }

    /// Mark the conversation as open
    pub fn open(&mut self) {
        if self.state == NormalizerState::Idle {
            self.state = NormalizerState::Streaming;
        }
    }

    /// Map one native message to zero or more events, in block order.
    ///
    /// Each content block yields at most one event.
    pub fn project(&mut self, message: NativeMessage) -> Vec<AgentEvent> {
        if self.is_terminal() {
            tracing::debug!("[Normalizer] Dropping {} after terminal event", message.kind());
            return Vec::new();
        }
        self.open();

        match message {
            NativeMessage::Assistant { message, .. } => message
                .content
                .into_iter()
                .filter_map(|block| self.project_assistant_block(block))
                .collect(),

            NativeMessage::User { message, .. } => message
                .content
                .into_iter()
                .filter_map(|block| self.project_user_block(block))
                .collect(),

            NativeMessage::Result {
                subtype,
                session_id,
                errors,
                ..
            } => {
                self.state = NormalizerState::Terminal;
                if subtype == SUCCESS {
                    vec![AgentEvent::done(session_id)]
                } else {
                    vec![AgentEvent::error(result_error_message(&subtype, &errors))]
                }
            }

            NativeMessage::System { subtype, session_id, .. } => {
                tracing::debug!("[Normalizer] system/{} for session {}", subtype, session_id);
                Vec::new()
            }

            NativeMessage::Unknown => {
                tracing::debug!("[Normalizer] Ignoring unrecognized native message");
                Vec::new()
            }
        }
    }

    fn project_assistant_block(&mut self, block: ContentBlock) -> Option<AgentEvent> {
        match block {
            ContentBlock::Text { text } if text.is_empty() => None,
            ContentBlock::Text { text } => Some(AgentEvent::text(text)),
            ContentBlock::ToolUse { id, name, input } => {
                self.tool_names.insert(id, name.clone());
                Some(AgentEvent::tool_start(name, input))
            }
            ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => None,
            ContentBlock::ToolResult { .. } | ContentBlock::Unknown => None,
        }
    }

    fn project_user_block(&mut self, block: ContentBlock) -> Option<AgentEvent> {
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                let name = self
                    .tool_names
                    .remove(&tool_use_id)
                    .unwrap_or_else(|| "unknown".to_string());
                Some(AgentEvent::tool_end(name, content.unwrap_or_default()))
            }
            _ => None,
        }
    }

    /// Terminal error for a failure outside the native protocol
    pub fn fail(&mut self, message: impl Into<String>) -> Option<AgentEvent> {
        if self.is_terminal() {
            return None;
        }
        self.state = NormalizerState::Terminal;
        Some(AgentEvent::error(message))
    }
}

impl Default for EventNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// The subtype, then the sub-errors joined after an em dash when there are any
pub fn result_error_message(subtype: &str, errors: &[String]) -> String {
    if errors.is_empty() {
        subtype.to_string()
    } else {
        format!("{} \u{2014} {}", subtype, errors.join(", "))
    }
}

/// Normalize a native stream. The result always ends with one terminal event.
pub fn normalize(mut native: NativeStream) -> EventStream {
    let stream = async_stream::stream! {
        let mut normalizer = EventNormalizer::new();
        normalizer.open();

        while let Some(item) = native.next().await {
            match item {
                Ok(message) => {
                    for event in normalizer.project(message) {
                        yield event;
                    }
                }
                Err(e) => {
                    tracing::error!("[Normalizer] Native stream error: {:#}", e);
                    if let Some(event) = normalizer.fail(format!("{:#}", e)) {
                        yield event;
                    }
                }
            }

            if normalizer.is_terminal() {
                break;
            }
        }

        if let Some(event) = normalizer.fail(STREAM_ENDED_EARLY) {
            tracing::warn!("[Normalizer] {}", STREAM_ENDED_EARLY);
            yield event;
        }
    };

    Box::pin(stream)
}

/// A stream holding a single error event
pub fn error_stream(message: impl Into<String>) -> EventStream {
    Box::pin(futures::stream::iter(vec![AgentEvent::error(message)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::native::ERROR_MAX_TURNS;
    use serde_json::json;

    fn native(messages: Vec<anyhow::Result<NativeMessage>>) -> NativeStream {
        Box::pin(futures::stream::iter(messages))
    }

    async fn run(messages: Vec<anyhow::Result<NativeMessage>>) -> Vec<AgentEvent> {
        normalize(native(messages)).collect().await
    }

    #[tokio::test]
    async fn test_text_then_done() {
        let events = run(vec![
            Ok(NativeMessage::init("s-1", vec![], "claude-sonnet-4-5")),
            Ok(NativeMessage::assistant("s-1", vec![ContentBlock::text("Hello")])),
            Ok(NativeMessage::success("s-1", 1, Some("Hello".into()))),
        ])
        .await;

        assert_eq!(events, vec![AgentEvent::text("Hello"), AgentEvent::done("s-1")]);
    }

    #[tokio::test]
    async fn test_max_turns_error_text() {
        let events = run(vec![Ok(NativeMessage::failure(
            ERROR_MAX_TURNS,
            "s-1",
            vec!["limit reached".into()],
            25,
        ))])
        .await;

        assert_eq!(
            events,
            vec![AgentEvent::error("error_max_turns \u{2014} limit reached")]
        );
    }

    #[tokio::test]
    async fn test_tool_round_trip_in_order() {
        let events = run(vec![
            Ok(NativeMessage::assistant(
                "s-1",
                vec![
                    ContentBlock::text("Let me look."),
                    ContentBlock::tool_use("toolu_1", "qmd_search", json!({"query": "ideas"})),
                ],
            )),
            Ok(NativeMessage::user(
                "s-1",
                vec![ContentBlock::tool_result("toolu_1", "[]", false)],
            )),
            Ok(NativeMessage::assistant("s-1", vec![ContentBlock::text("Nothing found.")])),
            Ok(NativeMessage::success("s-1", 2, None)),
        ])
        .await;

        assert_eq!(
            events,
            vec![
                AgentEvent::text("Let me look."),
                AgentEvent::tool_start("qmd_search", json!({"query": "ideas"})),
                AgentEvent::tool_end("qmd_search", "[]"),
                AgentEvent::text("Nothing found."),
                AgentEvent::done("s-1"),
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_after_terminal() {
        let events = run(vec![
            Ok(NativeMessage::success("s-1", 1, None)),
            Ok(NativeMessage::assistant("s-1", vec![ContentBlock::text("late")])),
            Ok(NativeMessage::failure("error_during_execution", "s-1", vec![], 1)),
        ])
        .await;

        assert_eq!(events, vec![AgentEvent::done("s-1")]);
    }

    #[tokio::test]
    async fn test_unexpected_end_and_stream_error() {
        let events = run(vec![Ok(NativeMessage::assistant(
            "s-1",
            vec![ContentBlock::text("partial")],
        ))])
        .await;
        assert_eq!(
            events,
            vec![AgentEvent::text("partial"), AgentEvent::error(STREAM_ENDED_EARLY)]
        );

        let events = run(vec![
            Err(anyhow::anyhow!("connection reset")),
            Ok(NativeMessage::success("s-1", 1, None)),
        ])
        .await;
        assert_eq!(events, vec![AgentEvent::error("connection reset")]);
    }

    #[test]
    fn test_projection_ignores_other_kinds() {
        let mut normalizer = EventNormalizer::new();
        assert_eq!(normalizer.state(), NormalizerState::Idle);

        assert!(normalizer.project(NativeMessage::Unknown).is_empty());
        assert!(normalizer
            .project(NativeMessage::assistant(
                "s",
                vec![ContentBlock::Thinking {
                    thinking: "hmm".into(),
                    signature: "sig".into()
                }]
            ))
            .is_empty());
        assert_eq!(normalizer.state(), NormalizerState::Streaming);

        assert_eq!(result_error_message("error_during_execution", &[]), "error_during_execution");
    }
}
