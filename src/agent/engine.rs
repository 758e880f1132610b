//! Conversation bridge
//!
//! [`AgentBridge`] is what the CLI and HTTP surfaces call. It checks
//! credentials, builds the backend query from config and request overrides,
//! and hands back the normalized event stream.

use serde::Deserialize;
use std::sync::Arc;

use super::backend::{AgentBackend, QueryOptions};
use super::normalizer::{error_stream, normalize, EventStream};
use super::system_prompt::{ask_system_prompt, chat_system_prompt};
use crate::config::Config;
use crate::llm::{check_auth_with, process_env, AuthError, EnvLookup};
use crate::tools::ToolRegistry;

/// One prompt submitted to the bridge
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Backend session id to continue (chat only)
    #[serde(skip)]
    pub resume: Option<String>,
}

impl ConversationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_max_turns(mut self, max_turns: Option<u32>) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn with_resume(mut self, resume: Option<String>) -> Self {
        self.resume = resume;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Ask,
    Chat,
}

/// Drives conversation turns against an agent backend
#[derive(Clone)]
pub struct AgentBridge {
    config: Arc<Config>,
    backend: Arc<dyn AgentBackend>,
    tools: Arc<ToolRegistry>,
    env: EnvLookup,
}

impl AgentBridge {
    pub fn new(config: Arc<Config>, backend: Arc<dyn AgentBackend>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            config,
            backend,
            tools,
            env: process_env,
        }
    }

    /// Use a different environment for the credential check
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Credential check without starting a turn
    pub fn check_auth(&self) -> Result<(), AuthError> {
        check_auth_with(self.env).map(|_| ())
    }

    /// Single question, always a fresh conversation
    pub async fn ask(&self, request: ConversationRequest) -> Result<EventStream, AuthError> {
        self.run(request.with_resume(None), Mode::Ask).await
    }

    /// One turn of a multi-turn conversation, resuming `request.resume` when set
    pub async fn chat(&self, request: ConversationRequest) -> Result<EventStream, AuthError> {
        self.run(request, Mode::Chat).await
    }

    async fn run(&self, request: ConversationRequest, mode: Mode) -> Result<EventStream, AuthError> {
        let credential = check_auth_with(self.env)?;

        let system_prompt = match (request.system_prompt, mode) {
            (Some(prompt), _) => prompt,
            (None, Mode::Ask) => ask_system_prompt(&self.config).await,
            (None, Mode::Chat) => chat_system_prompt(&self.config).await,
        };

        let options = QueryOptions {
            prompt: request.prompt,
            model: request
                .model
                .unwrap_or_else(|| self.config.defaults.model.clone()),
            system_prompt,
            tools: self.tools.clone(),
            allowed_tools: self.tools.names().into_iter().map(String::from).collect(),
            permission_mode: self.config.agent.permission_mode.clone(),
            max_turns: request.max_turns.unwrap_or(self.config.agent.max_turns),
            working_directory: self.config.vault.path.clone(),
            resume: request.resume,
            keep_transcript: mode == Mode::Chat,
            credential,
            max_tokens: self.config.agent.max_tokens,
        };

        tracing::info!(
            "[Bridge] {:?} turn model={} resume={:?}",
            mode,
            options.model,
            options.resume
        );

        match self.backend.query(options).await {
            Ok(native) => Ok(normalize(native)),
            Err(e) => {
                tracing::error!("[Bridge] Backend failed to start: {:#}", e);
                Ok(error_stream(format!("{:#}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::backend::NativeStream;
    use crate::agent::native::NativeMessage;
    use crate::core::AgentEvent;
    use crate::llm::ContentBlock;
    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;

    /// Replies "Hello" and records every query it receives
    #[derive(Default)]
    struct ScriptedBackend {
        queries: Mutex<Vec<QueryOptions>>,
    }

    #[async_trait]
    impl AgentBackend for ScriptedBackend {
        async fn query(&self, options: QueryOptions) -> anyhow::Result<NativeStream> {
            let session = options.resume.clone().unwrap_or_else(|| "agent-1".to_string());
            self.queries.lock().push(options);
            let messages = vec![
                Ok(NativeMessage::assistant(&session, vec![ContentBlock::text("Hello")])),
                Ok(NativeMessage::success(&session, 1, None)),
            ];
            Ok(Box::pin(futures::stream::iter(messages)))
        }
    }

    fn with_key(name: &str) -> Option<String> {
        (name == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string())
    }

    fn no_credentials(_: &str) -> Option<String> {
        None
    }

    fn bridge(backend: Arc<ScriptedBackend>, env: EnvLookup) -> AgentBridge {
        let mut config = Config::default();
        config.vault.path = "/nonexistent-vault".into();
        config.agent.max_turns = 7;
        AgentBridge::new(Arc::new(config), backend, Arc::new(ToolRegistry::new())).with_env(env)
    }

    #[tokio::test]
    async fn test_auth_checked_before_backend() {
        let backend = Arc::new(ScriptedBackend::default());
        let bridge = bridge(backend.clone(), no_credentials);

        assert!(bridge.ask(ConversationRequest::new("hi")).await.is_err());
        assert!(bridge.chat(ConversationRequest::new("hi")).await.is_err());
        assert!(backend.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ask_uses_config_defaults() {
        let backend = Arc::new(ScriptedBackend::default());
        let bridge = bridge(backend.clone(), with_key);

        let events: Vec<_> = bridge
            .ask(ConversationRequest::new("hi").with_resume(Some("ignored".into())))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events, vec![AgentEvent::text("Hello"), AgentEvent::done("agent-1")]);

        let queries = backend.queries.lock();
        assert_eq!(queries[0].model, "claude-sonnet-4-5");
        assert_eq!(queries[0].max_turns, 7);
        assert_eq!(queries[0].resume, None);
        assert_eq!(queries[0].permission_mode, "bypassPermissions");
        assert!(!queries[0].keep_transcript);
        assert!(!queries[0].system_prompt.contains("## Chat Session"));
    }

    #[tokio::test]
    async fn test_chat_overrides_and_resume() {
        let backend = Arc::new(ScriptedBackend::default());
        let bridge = bridge(backend.clone(), with_key);

        let request = ConversationRequest::new("again")
            .with_model(Some("claude-haiku-4-5".into()))
            .with_max_turns(Some(2))
            .with_resume(Some("agent-9".into()));
        let events: Vec<_> = bridge.chat(request).await.unwrap().collect().await;
        assert_eq!(events.last(), Some(&AgentEvent::done("agent-9")));

        let queries = backend.queries.lock();
        assert_eq!(queries[0].model, "claude-haiku-4-5");
        assert_eq!(queries[0].max_turns, 2);
        assert_eq!(queries[0].resume.as_deref(), Some("agent-9"));
        assert!(queries[0].keep_transcript);
        assert!(queries[0].system_prompt.contains("## Chat Session"));
    }

    #[test]
    fn test_request_wire_names() {
        let request: ConversationRequest = serde_json::from_str(
            r#"{"prompt":"p","maxTurns":3,"systemPrompt":"s","sessionId":"x"}"#,
        )
        .unwrap();
        assert_eq!(request.max_turns, Some(3));
        assert_eq!(request.system_prompt.as_deref(), Some("s"));
        assert_eq!(request.resume, None);
    }
}
