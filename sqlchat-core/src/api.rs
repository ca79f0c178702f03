//! JSON bodies of the HTTP API, shared by the server and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{ConnectionConfig, QueryResult, Turn};

/// Connection form. Missing or blank fields fall back to the server's configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Reconnect an existing session, keeping its history.
    pub session_id: Option<Uuid>,
}

impl ConnectRequest {
    pub fn resolve(&self, defaults: &DatabaseConfig) -> ConnectionConfig {
        fn pick(value: &Option<String>, default: &str) -> String {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        }

        ConnectionConfig {
            host: pick(&self.host, &defaults.host),
            port: self.port.unwrap_or(defaults.port),
            user: pick(&self.user, &defaults.user),
            password: self
                .password
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| defaults.password.clone()),
            database: pick(&self.database, &defaults.database),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub session_id: Uuid,
    pub database: String,
    pub server_version: String,
    pub reconnected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: Uuid,
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub question: String,
    pub answer: String,
    pub sql: String,
    pub result: QueryResult,
    pub degraded: bool,
    pub model_error: Option<String>,
    pub took_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnView {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self {
            question: turn.question.clone(),
            answer: turn.answer.clone(),
            asked_at: turn.asked_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub database: String,
    pub turns: Vec<TurnView>,
}

/// Standard HTTP error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            kind: kind.into(),
            status: "error".to_string(),
        }
    }
}
