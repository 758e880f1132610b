//! Terminal surface: `ra ask` and the `ra chat` line loop

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{pump, EventSink, SinkFlow};
use crate::agent::{AgentBridge, ConversationRequest};
use crate::cli::Console;
use crate::core::AgentEvent;

/// Renders events on the console and remembers how the turn ended
pub struct TerminalSink<'a> {
    console: &'a Console,
    session_id: Option<String>,
    failed: bool,
}

impl<'a> TerminalSink<'a> {
    pub fn new(console: &'a Console) -> Self {
        Self {
            console,
            session_id: None,
            failed: false,
        }
    }

    /// Backend session id from the `Done` event, if the turn completed
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn failed(&self) -> bool {
        self.failed
    }
}

#[async_trait]
impl EventSink for TerminalSink<'_> {
    async fn on_event(&mut self, event: &AgentEvent) -> SinkFlow {
        match event {
            AgentEvent::Text { text } => self.console.print_assistant_chunk(text),
            AgentEvent::ToolStart {
                tool_name,
                tool_input,
            } => self.console.print_tool_start(tool_name, tool_input),
            AgentEvent::ToolEnd {
                tool_name,
                tool_result,
            } => self.console.print_tool_end(tool_name, tool_result),
            AgentEvent::Done { session_id } => self.session_id = Some(session_id.clone()),
            AgentEvent::Error { error } => {
                self.failed = true;
                self.console.println();
                self.console.print_error(error);
            }
        }
        SinkFlow::Continue
    }

    async fn on_close(&mut self) {}
}

/// Options for an interactive chat
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// File whose contents prefix the first prompt
    pub context: Option<PathBuf>,
    pub model: Option<String>,
}

/// Answer one question. Returns whether the turn ended in `Done`.
pub async fn run_ask(
    bridge: &AgentBridge,
    console: &Console,
    request: ConversationRequest,
) -> anyhow::Result<bool> {
    let events = bridge.ask(request).await?;

    let mut sink = TerminalSink::new(console);
    let outcome = pump(events, &mut sink).await;
    console.println();

    Ok(outcome.succeeded())
}

/// Read prompts from `input` until EOF or `/quit`, resuming the backend
/// session between turns.
pub async fn run_chat<R>(
    bridge: &AgentBridge,
    console: &Console,
    input: R,
    options: ChatOptions,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    bridge.check_auth()?;

    console.print_banner(&bridge.config().vault_name());

    let mut context = match &options.context {
        Some(path) => load_context(console, path).await,
        None => None,
    };
    let mut session: Option<String> = None;
    let mut lines = input.lines();

    loop {
        console.print_prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let prompt = match context.take() {
            Some(prefix) => format!("{}{}", prefix, line),
            None => line.to_string(),
        };

        let request = ConversationRequest::new(prompt)
            .with_model(options.model.clone())
            .with_resume(session.clone());
        let events = match bridge.chat(request).await {
            Ok(events) => events,
            Err(e) => {
                console.print_error(&e.to_string());
                break;
            }
        };

        let mut sink = TerminalSink::new(console);
        pump(events, &mut sink).await;
        if let Some(id) = sink.session_id() {
            tracing::debug!("[Chat] Continuing session {}", id);
            session = Some(id.to_string());
        }
        console.print_raw("\n\n");
    }

    console.print_raw("\nGoodbye!\n");
    Ok(())
}

async fn load_context(console: &Console, path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(context_prefix(&path.display().to_string(), &content)),
        Err(e) => {
            console.print_warning(&format!(
                "Could not read context file {}: {}",
                path.display(),
                e
            ));
            None
        }
    }
}

fn context_prefix(path: &str, content: &str) -> String {
    format!("Context from {}:\n```\n{}\n```\n\n", path, content)
}
