//! SQL chat HTTP API
//!
//! Axum server exposing the chat pipeline and the single-page UI.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`. The inner functions are called
//! directly by the unit tests.
//!
//! Endpoints:
//! - GET    /                       chat page
//! - GET    /health                 process status
//! - GET    /version                server version info
//! - POST   /connect                open (or reopen) a session against a database
//! - POST   /chat                   ask one question in a session
//! - GET    /sessions/:id/history   turns recorded so far
//! - POST   /sessions/:id/clear     empty the history
//! - DELETE /sessions/:id           drop the session

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use sqlchat_core::api::{
    ChatRequest, ChatResponse, ConnectRequest, ConnectResponse, ErrorResponse, HistoryResponse,
    TurnView,
};
use sqlchat_core::{
    ask, create_backend, db, ChatError, ChatSession, LlmBackend, PgDatabase, SqlChatConfig,
    SqlChatError,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::sessions::SessionRegistry;
use crate::ui;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub config: SqlChatConfig,
    pub llm: Arc<dyn LlmBackend>,
    pub sessions: SessionRegistry,
}

impl HttpState {
    pub fn new(config: SqlChatConfig, llm: Arc<dyn LlmBackend>) -> Self {
        Self {
            config,
            llm,
            sessions: SessionRegistry::new(),
        }
    }

    /// Build state with the LLM backend described by `config.llm`.
    pub fn from_config(config: SqlChatConfig) -> Result<Self, SqlChatError> {
        let llm: Arc<dyn LlmBackend> = Arc::from(create_backend(&config.llm)?);
        Ok(Self::new(config, llm))
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/connect", post(connect_handler))
        .route("/chat", post(chat_handler))
        .route("/sessions/:id/history", get(history_handler))
        .route("/sessions/:id/clear", post(clear_handler))
        .route("/sessions/:id", delete(disconnect_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("SQL chat listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub async fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "llm": {
                "provider": state.llm.name(),
                "model": state.llm.model(),
            },
            "sessions": state.sessions.len().await,
        }),
    )
}

/// Pure, no IO.
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    })
}

/// Connect to the requested database. With a known `session_id` the session's
/// connection is swapped and its history kept; otherwise a new session starts.
pub async fn connect_inner(state: &HttpState, req: ConnectRequest) -> (StatusCode, serde_json::Value) {
    let connection = req.resolve(&state.config.database);

    let database =
        match PgDatabase::connect(&connection, &state.config.database, state.config.query.clone())
            .await
        {
            Ok(d) => d,
            Err(e) => return connection_failed(&connection.display_url(), &e),
        };

    let server_version = match db::health_check(database.pool()).await {
        Ok(v) => v,
        Err(e) => return connection_failed(&connection.display_url(), &e),
    };

    let database_name = connection.database.clone();
    let database = Arc::new(database);

    let (session_id, reconnected) = match req.session_id {
        Some(id)
            if state
                .sessions
                .reconnect(id, connection.clone(), database.clone())
                .await =>
        {
            (id, true)
        }
        _ => (
            state.sessions.insert(ChatSession::new(connection, database)).await,
            false,
        ),
    };

    tracing::info!(session_id = %session_id, database = %database_name, reconnected, "Session connected");

    to_json(
        StatusCode::OK,
        &ConnectResponse {
            session_id,
            database: database_name,
            server_version,
            reconnected,
        },
    )
}

/// Run one question through the pipeline. The session's history is updated
/// only when the reply is complete.
pub async fn chat_inner(state: &HttpState, req: ChatRequest) -> (StatusCode, serde_json::Value) {
    let question = match req.question {
        Some(q) if !q.trim().is_empty() => q,
        _ => {
            return error_body(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "question field is required",
            );
        }
    };

    let session = match state.sessions.get(req.session_id).await {
        Some(s) => s,
        None => return unknown_session(req.session_id),
    };

    let start = Instant::now();
    let outcome = ask(&session, &question, state.llm.as_ref()).await;
    let took_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(reply) => {
            if let Some(turn) = reply.turn() {
                state.sessions.append_turn(req.session_id, turn).await;
            }
            tracing::info!(
                session_id = %req.session_id,
                took_ms,
                degraded = reply.degraded,
                "Answered question"
            );
            to_json(
                StatusCode::OK,
                &ChatResponse {
                    session_id: req.session_id,
                    question: reply.question,
                    answer: reply.answer,
                    sql: reply.sql,
                    result: reply.result,
                    degraded: reply.degraded,
                    model_error: reply.model_error,
                    took_ms,
                },
            )
        }
        Err(e) => {
            tracing::warn!(session_id = %req.session_id, kind = e.kind(), error = %e, "Chat request failed");
            error_body(chat_error_status(&e), e.kind(), e.to_string())
        }
    }
}

pub async fn history_inner(state: &HttpState, id: Uuid) -> (StatusCode, serde_json::Value) {
    match state.sessions.get(id).await {
        Some(session) => to_json(
            StatusCode::OK,
            &HistoryResponse {
                session_id: id,
                database: session.connection.database.clone(),
                turns: session.history.turns().iter().map(TurnView::from).collect(),
            },
        ),
        None => unknown_session(id),
    }
}

pub async fn clear_inner(state: &HttpState, id: Uuid) -> (StatusCode, serde_json::Value) {
    if state.sessions.clear_history(id).await {
        (
            StatusCode::OK,
            serde_json::json!({ "session_id": id, "cleared": true }),
        )
    } else {
        unknown_session(id)
    }
}

pub async fn disconnect_inner(state: &HttpState, id: Uuid) -> (StatusCode, serde_json::Value) {
    if state.sessions.remove(id).await {
        tracing::info!(session_id = %id, "Session closed");
        (
            StatusCode::OK,
            serde_json::json!({ "session_id": id, "disconnected": true }),
        )
    } else {
        unknown_session(id)
    }
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn index_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Html(ui::render_index(&state.config.database))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn connect_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ConnectRequest>,
) -> impl IntoResponse {
    let (status, body) = connect_inner(&state, req).await;
    (status, Json(body))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let (status, body) = chat_inner(&state, req).await;
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = history_inner(&state, id).await;
    (status, Json(body))
}

pub async fn clear_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = clear_inner(&state, id).await;
    (status, Json(body))
}

pub async fn disconnect_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = disconnect_inner(&state, id).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

pub fn chat_error_status(error: &ChatError) -> StatusCode {
    match error {
        ChatError::Connection(_) => StatusCode::BAD_GATEWAY,
        ChatError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ChatError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn connection_failed(url: &str, error: &sqlx::Error) -> (StatusCode, serde_json::Value) {
    tracing::warn!(url = %url, error = %error, "Database connection failed");
    error_body(
        StatusCode::BAD_GATEWAY,
        "connection_error",
        format!("Cannot connect to {}: {}", url, error),
    )
}

fn unknown_session(id: Uuid) -> (StatusCode, serde_json::Value) {
    error_body(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("Unknown session {}; connect first", id),
    )
}

fn error_body(
    status: StatusCode,
    kind: &str,
    msg: impl Into<String>,
) -> (StatusCode, serde_json::Value) {
    to_json(status, &ErrorResponse::new(kind, msg))
}

fn to_json<T: serde::Serialize>(status: StatusCode, body: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(body) {
        Ok(value) => (status, value),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": e.to_string(), "kind": "internal", "status": "error" }),
        ),
    }
}
