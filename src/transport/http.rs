//! HTTP surface
//!
//! Streaming routes (`/ask`, `/chat`, `/link-suggest`, `/review`) answer with
//! `text/event-stream`. Each request gets its own pump task feeding a
//! channel; when the client goes away the channel closes and the pump drops
//! the backend stream, even if the turn is idle at that moment.
//!
//! Every route except `/health` requires `Authorization: Bearer <token>`.

use anyhow::Context;
use async_stream::stream;
use async_trait::async_trait;
use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::frames::event_payload;
use super::{pump, EventSink, SinkFlow};
use crate::agent::normalizer::error_stream;
use crate::agent::tasks::{self, ReviewPlan};
use crate::agent::{AgentBridge, ConversationRequest, EventStream};
use crate::config::config_dir;
use crate::core::{AgentEvent, BridgeError};
use crate::integrations::vault_fs;
use crate::search::{dispatch, SearchBackend, SearchMode, SearchOptions};
use crate::session::SessionStore;

/// Buffered events per open stream
const EVENT_BUFFER: usize = 32;

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub bridge: AgentBridge,
    pub sessions: Arc<SessionStore>,
    pub search: Arc<dyn SearchBackend>,
    pub token: Arc<str>,
}

impl AppState {
    /// State with a fresh random bearer token
    pub fn new(
        bridge: AgentBridge,
        search: Arc<dyn SearchBackend>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            bridge,
            sessions,
            search,
            token: Arc::from(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Arc::from(token.into());
        self
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized".to_string(),
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(error: BridgeError) -> Self {
        let status = match &error {
            BridgeError::Validation(_) | BridgeError::NoteAccess(_) => StatusCode::BAD_REQUEST,
            BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::ExternalTool { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Forwards events into a response channel and records chat sessions
struct HttpSink {
    tx: mpsc::Sender<AgentEvent>,
    sessions: Arc<SessionStore>,
    client_session_id: Option<String>,
}

#[async_trait]
impl EventSink for HttpSink {
    async fn on_event(&mut self, event: &AgentEvent) -> SinkFlow {
        if let (AgentEvent::Done { session_id }, Some(client)) = (event, &self.client_session_id) {
            tracing::debug!("[HttpSink] Session {} -> {}", client, session_id);
            self.sessions.set(client.clone(), session_id.clone());
        }

        match self.tx.send(event.clone()).await {
            Ok(()) => SinkFlow::Continue,
            Err(_) => SinkFlow::Stop,
        }
    }

    async fn on_close(&mut self) {
        tracing::debug!("[HttpSink] Stream closed");
    }

    async fn closed(&mut self) {
        self.tx.closed().await
    }
}

/// Spawn the pump for `events` and stream its frames as the response body
fn event_response(
    events: EventStream,
    sessions: Arc<SessionStore>,
    client_session_id: Option<String>,
) -> Response {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(EVENT_BUFFER);
    let mut sink = HttpSink {
        tx,
        sessions,
        client_session_id,
    };

    tokio::spawn(async move {
        let outcome = pump(events, &mut sink).await;
        if outcome.disconnected {
            tracing::info!("[Http] Client disconnected after {} events", outcome.delivered);
        }
    });

    let body = stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<Event, Infallible>(Event::default().data(event_payload(&event)));
        }
    };

    Sse::new(body).keep_alive(KeepAlive::default()).into_response()
}

fn require_prompt(request: &ConversationRequest) -> ApiResult<()> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt is required"));
    }
    Ok(())
}

/// Run a one-shot question; a refusal becomes a single error frame
async fn ask_response(state: AppState, request: ConversationRequest, route: &str) -> Response {
    let events = match state.bridge.ask(request).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("[Http] {} refused: {}", route, e);
            error_stream(e.to_string())
        }
    };
    event_response(events, state.sessions, None)
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<ConversationRequest>,
) -> ApiResult<Response> {
    require_prompt(&request)?;
    Ok(ask_response(state, request, "/ask").await)
}

#[derive(Debug, Deserialize)]
struct LinkSuggestBody {
    #[serde(default)]
    file: String,
    #[serde(default)]
    apply: bool,
    #[serde(default)]
    model: Option<String>,
}

async fn link_suggest(
    State(state): State<AppState>,
    Json(body): Json<LinkSuggestBody>,
) -> ApiResult<Response> {
    if body.file.trim().is_empty() {
        return Err(ApiError::bad_request("file is required"));
    }

    let request =
        tasks::link_suggest_request(state.bridge.config(), &body.file, body.apply, body.model)
            .await?;
    Ok(ask_response(state, request, "/link-suggest").await)
}

#[derive(Debug, Deserialize)]
struct ReviewBody {
    #[serde(default)]
    days: Option<u32>,
    #[serde(default)]
    model: Option<String>,
}

async fn review(State(state): State<AppState>, Json(body): Json<ReviewBody>) -> ApiResult<Response> {
    let days = body.days.unwrap_or(tasks::DEFAULT_REVIEW_DAYS);

    let plan = tasks::plan_review(state.bridge.config(), days, body.model).await?;
    match plan {
        ReviewPlan::NothingRecent { days } => Ok(Json(json!({
            "message": format!("No notes modified in the last {} days.", days),
            "notes": 0,
        }))
        .into_response()),
        ReviewPlan::Run { request, notes } => {
            tracing::info!("[Http] Reviewing {} notes from the last {} days", notes.len(), days);
            Ok(ask_response(state, request, "/review").await)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    /// Client-chosen conversation id
    #[serde(default)]
    session_id: Option<String>,
    #[serde(flatten)]
    request: ConversationRequest,
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatBody>) -> ApiResult<Response> {
    require_prompt(&body.request)?;

    let resume = body
        .session_id
        .as_deref()
        .and_then(|id| state.sessions.get(id));
    let request = body.request.with_resume(resume);

    let events = match state.bridge.chat(request).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("[Http] /chat refused: {}", e);
            error_stream(e.to_string())
        }
    };
    Ok(event_response(events, state.sessions, body.session_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody {
    #[serde(default)]
    query: String,
    #[serde(default)]
    mode: Option<SearchMode>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    min_score: Option<f64>,
}

async fn search(State(state): State<AppState>, Json(body): Json<SearchBody>) -> ApiResult<Json<Value>> {
    if body.query.trim().is_empty() {
        return Err(ApiError::bad_request("query is required"));
    }

    let defaults = &state.bridge.config().defaults;
    let mode = body.mode.unwrap_or(defaults.search_mode);
    let options = SearchOptions {
        limit: Some(body.limit.unwrap_or(defaults.search_results)),
        min_score: body.min_score,
    };

    let results = dispatch(state.search.as_ref(), &body.query, mode, options).await?;
    Ok(Json(json!({ "results": results, "query": body.query, "mode": mode })))
}

async fn list_notes(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let notes = vault_fs::list_notes(&state.bridge.config().vault.path).await?;
    Ok(Json(json!({ "notes": notes })))
}

async fn get_note(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult<Json<Value>> {
    match vault_fs::read_note(&state.bridge.config().vault.path, &path).await {
        Ok(note) => Ok(Json(json!({
            "path": note.path,
            "frontmatter": note.frontmatter,
            "body": note.body,
        }))),
        Err(e @ BridgeError::Validation(_)) => Err(e.into()),
        Err(e) => {
            tracing::debug!("[Http] Note {} unreadable: {}", path, e);
            Err(ApiError::not_found(format!("Note not found: {}", path)))
        }
    }
}

async fn index_status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.search.status().await?))
}

#[derive(Debug, Default, Deserialize)]
struct IndexBody {
    /// Re-scan only, skip embeddings
    #[serde(default)]
    update: bool,
}

async fn reindex(State(state): State<AppState>, Json(body): Json<IndexBody>) -> ApiResult<Json<Value>> {
    state.search.update().await?;
    if !body.update {
        state.search.embed().await?;
    }

    let mut response = serde_json::Map::new();
    response.insert("status".to_string(), json!("ok"));
    if let Value::Object(status) = state.search.status().await? {
        response.extend(status);
    }
    Ok(Json(Value::Object(response)))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "vault": state.bridge.config().vault.path,
        "pid": std::process::id(),
    }))
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if presented != Some(&*state.token) {
        tracing::debug!("[Http] Rejected {} {}", request.method(), request.uri().path());
        return ApiError::unauthorized().into_response();
    }
    next.run(request).await
}

fn is_allowed_origin(origin: &str) -> bool {
    if origin == "app://obsidian.md" || origin == "http://localhost" {
        return true;
    }
    origin
        .strip_prefix("http://localhost:")
        .is_some_and(|port| port.parse::<u16>().is_ok())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin.to_str().map(is_allowed_origin).unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// All routes with auth, CORS and request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .route("/chat", post(chat))
        .route("/link-suggest", post(link_suggest))
        .route("/review", post(review))
        .route("/search", post(search))
        .route("/notes", get(list_notes))
        .route("/notes/{*path}", get(get_note))
        .route("/index/status", get(index_status))
        .route("/index", post(reindex))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Discovery file for local clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub port: u16,
    pub token: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// Write `info` as pretty JSON to `path`, creating the directory
pub fn write_server_info(info: &ServerInfo, path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(info)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// `~/.research-assistant/server.json`
pub fn server_info_path() -> anyhow::Result<std::path::PathBuf> {
    Ok(config_dir()?.join("server.json"))
}

/// Bind to localhost, publish the token, and serve until the process exits
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    let info = ServerInfo {
        port,
        token: state.token.to_string(),
        pid: std::process::id(),
        started_at: Utc::now(),
    };
    write_server_info(&info, &server_info_path()?)?;

    println!("Research Assistant server running on http://localhost:{}", port);
    println!("Auth token: {}", info.token);
    tracing::info!("[Http] Listening on 127.0.0.1:{}", port);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
