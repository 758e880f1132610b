//! Agent backend
//!
//! [`AgentBackend`] is the seam between the bridge and whatever runs the
//! model. [`AnthropicBackend`] runs the tool loop itself over the Messages
//! API and keeps chat transcripts in a bounded in-memory LRU so a later turn
//! can resume them.

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use super::native::{NativeMessage, ERROR_DURING_EXECUTION, ERROR_MAX_TURNS};
use crate::llm::{
    joined_text, AnthropicClient, ContentBlock, Credential, Message, MessageContent,
    MessageRequest, Role, StopReason,
};
use crate::session::LruMap;
use crate::tools::{ToolRegistry, ToolResult};

/// Native message stream of one turn
pub type NativeStream = Pin<Box<dyn Stream<Item = anyhow::Result<NativeMessage>> + Send>>;

/// Everything a backend needs to run one turn
#[derive(Clone)]
pub struct QueryOptions {
    pub prompt: String,
    pub model: String,
    pub system_prompt: String,
    pub tools: Arc<ToolRegistry>,
    /// Tools the agent may call; anything else is refused
    pub allowed_tools: Vec<String>,
    pub permission_mode: String,
    /// Model round trips allowed in this turn
    pub max_turns: u32,
    pub working_directory: PathBuf,
    /// Backend session id to continue
    pub resume: Option<String>,
    /// Store the transcript so the session can be resumed later
    pub keep_transcript: bool,
    pub credential: Credential,
    pub max_tokens: u32,
}

impl std::fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("model", &self.model)
            .field("allowed_tools", &self.allowed_tools)
            .field("permission_mode", &self.permission_mode)
            .field("max_turns", &self.max_turns)
            .field("working_directory", &self.working_directory)
            .field("resume", &self.resume)
            .field("keep_transcript", &self.keep_transcript)
            .field("credential", &self.credential)
            .finish()
    }
}

/// Something that can run a conversation turn and stream native messages
///
/// The stream must end with exactly one `result` message. Dropping the
/// stream stops the turn.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn query(&self, options: QueryOptions) -> anyhow::Result<NativeStream>;
}

/// Tool result for calls left unrun after an earlier call ended the turn
pub const SKIPPED_AFTER_FAILURE: &str = "Skipped: an earlier tool call in this turn failed";

type Transcripts = Arc<LruMap<Vec<Message>>>;

/// Runs the tool loop against the Anthropic Messages API
#[derive(Clone, Default)]
pub struct AnthropicBackend {
    client: AnthropicClient,
    transcripts: Transcripts,
}

impl AnthropicBackend {
    pub fn new(client: AnthropicClient) -> Self {
        Self {
            client,
            transcripts: Arc::default(),
        }
    }

    /// Keep at most `capacity` transcripts, dropping the least recently used
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.transcripts = Arc::new(LruMap::new(capacity));
        self
    }

    /// Number of sessions with a stored transcript
    pub fn session_count(&self) -> usize {
        self.transcripts.len()
    }

    /// Stored transcript of a session
    pub fn transcript(&self, session_id: &str) -> Option<Vec<Message>> {
        self.transcripts.get(session_id)
    }
}

fn save_transcript(transcripts: &Transcripts, options: &QueryOptions, session_id: &str, history: Vec<Message>) {
    if options.keep_transcript {
        transcripts.insert(session_id, history);
    }
}

/// Append the prompt as a user message, merging into a trailing user
/// message so roles keep alternating after an interrupted turn
fn push_user_prompt(history: &mut Vec<Message>, prompt: &str) {
    if let Some(last) = history.last_mut() {
        if last.role == Role::User {
            let mut blocks = match std::mem::replace(&mut last.content, MessageContent::Blocks(Vec::new())) {
                MessageContent::Text(text) => vec![ContentBlock::text(text)],
                MessageContent::Blocks(blocks) => blocks,
            };
            blocks.push(ContentBlock::text(prompt));
            last.content = MessageContent::Blocks(blocks);
            return;
        }
    }
    history.push(Message::user(prompt));
}

#[async_trait]
impl AgentBackend for AnthropicBackend {
    async fn query(&self, options: QueryOptions) -> anyhow::Result<NativeStream> {
        let client = self.client.clone();
        let transcripts = self.transcripts.clone();

        tracing::info!("[AnthropicBackend] Starting turn: {:?}", options);

        let stream = async_stream::stream! {
            let (session_id, mut history) = match options.resume.clone() {
                Some(id) => {
                    match transcripts.get(&id) {
                        Some(history) => (id, history),
                        None => {
                            tracing::warn!("[AnthropicBackend] Unknown session: {}", id);
                            let errors = vec![format!("No conversation found with session ID: {}", id)];
                            yield NativeMessage::failure(ERROR_DURING_EXECUTION, id, errors, 0);
                            return;
                        }
                    }
                }
                None => (uuid::Uuid::new_v4().to_string(), Vec::new()),
            };

            let definitions: Vec<_> = options
                .tools
                .definitions()
                .into_iter()
                .filter(|d| options.allowed_tools.contains(&d.name))
                .collect();
            let tool_names = definitions.iter().map(|d| d.name.clone()).collect();

            yield NativeMessage::init(&session_id, tool_names, &options.model);

            push_user_prompt(&mut history, &options.prompt);
            let mut turns = 0u32;

            loop {
                if turns >= options.max_turns {
                    tracing::warn!("[AnthropicBackend] Max turns ({}) reached", options.max_turns);
                    save_transcript(&transcripts, &options, &session_id, history);
                    let errors = vec![format!("Reached maximum number of turns ({})", options.max_turns)];
                    yield NativeMessage::failure(ERROR_MAX_TURNS, session_id, errors, turns);
                    return;
                }
                turns += 1;

                let request = MessageRequest {
                    model: options.model.clone(),
                    max_tokens: options.max_tokens,
                    messages: history.clone(),
                    system: Some(options.system_prompt.clone()),
                    tools: (!definitions.is_empty()).then(|| definitions.clone()),
                };

                let response = match client.send(&options.credential, &request).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!("[AnthropicBackend] Request failed: {:#}", e);
                        save_transcript(&transcripts, &options, &session_id, history);
                        yield NativeMessage::failure(ERROR_DURING_EXECUTION, session_id, vec![format!("{:#}", e)], turns);
                        return;
                    }
                };

                let stop_reason = response.stop_reason;
                let blocks: Vec<ContentBlock> = response
                    .content
                    .into_iter()
                    .filter(|b| !matches!(b, ContentBlock::Unknown))
                    .collect();

                history.push(Message::assistant_with_blocks(blocks.clone()));
                yield NativeMessage::assistant(&session_id, blocks.clone());

                let tool_uses: Vec<_> = blocks.iter().filter_map(|b| b.as_tool_use()).collect();

                if tool_uses.is_empty() {
                    if stop_reason == Some(StopReason::MaxTokens) {
                        tracing::warn!("[AnthropicBackend] Response truncated (max tokens)");
                    }
                    let text = joined_text(&blocks);
                    save_transcript(&transcripts, &options, &session_id, history);
                    yield NativeMessage::success(session_id, turns, Some(text));
                    return;
                }

                let mut results = Vec::with_capacity(tool_uses.len());
                let mut fatal = None;

                // Every tool_use is paired with a tool_result, even after a fatal failure
                for (id, name, input) in tool_uses {
                    if fatal.is_some() {
                        results.push(ContentBlock::tool_result(id, SKIPPED_AFTER_FAILURE, true));
                        continue;
                    }

                    let outcome = if options.allowed_tools.iter().any(|t| t == name) {
                        options.tools.execute(name, input).await
                    } else {
                        Ok(ToolResult::error(format!("Tool not allowed: {}", name)))
                    };

                    match outcome {
                        Ok(result) => {
                            results.push(ContentBlock::tool_result(id, result.output, result.is_error));
                        }
                        Err(e) => {
                            tracing::error!("[AnthropicBackend] {} ended the turn: {}", name, e);
                            results.push(ContentBlock::tool_result(id, e.to_string(), true));
                            fatal = Some(e);
                        }
                    }
                }

                history.push(Message::user_with_blocks(results.clone()));
                yield NativeMessage::user(&session_id, results);

                if let Some(e) = fatal {
                    save_transcript(&transcripts, &options, &session_id, history);
                    yield NativeMessage::failure(ERROR_DURING_EXECUTION, session_id, vec![e.to_string()], turns);
                    return;
                }
            }
        };

        Ok(Box::pin(stream.map(Ok::<_, anyhow::Error>)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BridgeError, BridgeResult};
    use crate::llm::{ToolDefinition, ToolInputSchema};
    use crate::tools::Tool;
    use axum::{extract::State, routing::post, Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stand-in for `/v1/messages`: replays queued responses, then plain text
    #[derive(Clone, Default)]
    struct MockApi {
        replies: Arc<Mutex<VecDeque<Value>>>,
        requests: Arc<Mutex<Vec<Value>>>,
    }

    async fn messages(State(api): State<MockApi>, Json(body): Json<Value>) -> Json<Value> {
        api.requests.lock().push(body);
        let reply = api.replies.lock().pop_front();
        Json(reply.unwrap_or_else(|| reply_with(vec![json!({"type": "text", "text": "ok"})], "end_turn")))
    }

    fn reply_with(content: Vec<Value>, stop_reason: &str) -> Value {
        json!({
            "id": "msg_test",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": content,
            "stop_reason": stop_reason,
            "usage": {"input_tokens": 1, "output_tokens": 1}
        })
    }

    async fn start_api(api: MockApi) -> AnthropicClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/v1/messages", post(messages)).with_state(api);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        AnthropicClient::with_base(format!("http://{}", addr))
    }

    /// Fails the way a crashed qmd does
    struct BrokenSearch;

    #[async_trait]
    impl Tool for BrokenSearch {
        fn name(&self) -> &str {
            "qmd_search"
        }
        fn description(&self) -> &str {
            "search"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "qmd_search".into(),
                description: None,
                input_schema: ToolInputSchema::new(),
            }
        }
        async fn execute(&self, _input: &Value) -> BridgeResult<ToolResult> {
            Err(BridgeError::external("qmd query", "exit 1: index locked"))
        }
    }

    #[derive(Default)]
    struct CountingList {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingList {
        fn name(&self) -> &str {
            "vault_list"
        }
        fn description(&self) -> &str {
            "list"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "vault_list".into(),
                description: None,
                input_schema: ToolInputSchema::new(),
            }
        }
        async fn execute(&self, _input: &Value) -> BridgeResult<ToolResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::success("[]"))
        }
    }

    fn options(tools: ToolRegistry, resume: Option<&str>, keep_transcript: bool) -> QueryOptions {
        QueryOptions {
            prompt: "hi".into(),
            model: "claude-sonnet-4-5".into(),
            system_prompt: String::new(),
            allowed_tools: tools.names().into_iter().map(String::from).collect(),
            tools: Arc::new(tools),
            permission_mode: "bypassPermissions".into(),
            max_turns: 3,
            working_directory: PathBuf::from("/tmp"),
            resume: resume.map(String::from),
            keep_transcript,
            credential: Credential::ApiKey("test".into()),
            max_tokens: 1024,
        }
    }

    async fn run(backend: &AnthropicBackend, options: QueryOptions) -> Vec<NativeMessage> {
        backend
            .query(options)
            .await
            .unwrap()
            .map(|m| m.unwrap())
            .collect()
            .await
    }

    fn session_of(messages: &[NativeMessage]) -> String {
        match messages.last() {
            Some(NativeMessage::Result { session_id, .. }) => session_id.clone(),
            other => panic!("expected a result, got {:?}", other),
        }
    }

    #[test]
    fn test_push_prompt_alternates_roles() {
        let mut history = Vec::new();
        push_user_prompt(&mut history, "first");
        assert_eq!(history, vec![Message::user("first")]);

        push_user_prompt(&mut history, "second");
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].blocks().unwrap(),
            &[ContentBlock::text("first"), ContentBlock::text("second")]
        );

        history.push(Message::assistant_with_blocks(vec![ContentBlock::text("ok")]));
        push_user_prompt(&mut history, "third");
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_resume_fails_without_request() {
        let backend = AnthropicBackend::new(AnthropicClient::with_base("http://127.0.0.1:9"));

        let messages = run(&backend, options(ToolRegistry::new(), Some("missing"), true)).await;
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            NativeMessage::Result { subtype, session_id, .. } => {
                assert_eq!(subtype, ERROR_DURING_EXECUTION);
                assert_eq!(session_id, "missing");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_api_ends_turn() {
        let backend = AnthropicBackend::new(AnthropicClient::with_base("http://127.0.0.1:9"));

        let messages = run(&backend, options(ToolRegistry::new(), None, true)).await;
        let kinds: Vec<_> = messages.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec!["system", "result"]);
        assert_eq!(backend.session_count(), 1);
    }

    #[tokio::test]
    async fn test_fatal_tool_failure_leaves_resumable_transcript() {
        let api = MockApi::default();
        api.replies.lock().push_back(reply_with(
            vec![
                json!({"type": "tool_use", "id": "tu_search", "name": "qmd_search", "input": {"query": "x"}}),
                json!({"type": "tool_use", "id": "tu_list", "name": "vault_list", "input": {}}),
            ],
            "tool_use",
        ));
        let backend = AnthropicBackend::new(start_api(api.clone()).await);

        let list = CountingList::default();
        let list_calls = list.calls.clone();
        let mut tools = ToolRegistry::new();
        tools.register(BrokenSearch);
        tools.register(list);

        let messages = run(&backend, options(tools, None, true)).await;
        let kinds: Vec<_> = messages.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec!["system", "assistant", "user", "result"]);
        assert_eq!(list_calls.load(Ordering::SeqCst), 0);

        let session = session_of(&messages);
        let transcript = backend.transcript(&session).unwrap();
        let tool_results: Vec<_> = transcript
            .last()
            .and_then(|m| m.blocks())
            .unwrap()
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some((tool_use_id.as_str(), content.clone().unwrap_or_default(), *is_error)),
                _ => None,
            })
            .collect();
        assert_eq!(tool_results.len(), 2);
        assert_eq!(tool_results[0].0, "tu_search");
        assert_eq!(tool_results[1], ("tu_list", SKIPPED_AFTER_FAILURE.to_string(), Some(true)));

        // The session survives the failed turn
        let mut tools = ToolRegistry::new();
        tools.register(BrokenSearch);
        tools.register(CountingList::default());
        let messages = run(&backend, options(tools, Some(&session), true)).await;
        match messages.last() {
            Some(NativeMessage::Result { subtype, .. }) => assert_eq!(subtype, "success"),
            other => panic!("unexpected message: {:?}", other),
        }

        let requests = api.requests.lock();
        let resumed = requests[1]["messages"].as_array().unwrap();
        assert_eq!(resumed.len(), 3);
        let roles: Vec<_> = resumed.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(resumed[2]["content"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_transcripts_are_bounded_and_skipped_for_one_shots() {
        let api = MockApi::default();
        let backend = AnthropicBackend::new(start_api(api).await).with_capacity(2);

        for _ in 0..5 {
            run(&backend, options(ToolRegistry::new(), None, false)).await;
        }
        assert_eq!(backend.session_count(), 0);

        let mut sessions = Vec::new();
        for _ in 0..3 {
            let messages = run(&backend, options(ToolRegistry::new(), None, true)).await;
            sessions.push(session_of(&messages));
        }
        assert_eq!(backend.session_count(), 2);
        assert!(backend.transcript(&sessions[0]).is_none());
        assert!(backend.transcript(&sessions[2]).is_some());
    }
}
