//! HTTP integration tests for the SQL chat API
//!
//! Full router dispatch through `oneshot`. The language model is a wiremock
//! server speaking the chat-completions protocol; the database is an in-memory
//! fake injected straight into the session registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use sqlchat_core::{
    ChatCompletionClient, ChatConfig, ChatSession, ConnectionConfig, Database, Provider,
    QueryResult, ResultSet, SqlChatConfig, Turn,
};
use sqlchat_server::http::{build_router, HttpState};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCHEMA: &str = "CREATE TABLE customer (\n\tcustomer_id integer NOT NULL,\n\tfirst_name text\n)";

/// Fixed schema, one canned result, counts executions.
struct FakeDatabase {
    executed: AtomicUsize,
}

#[async_trait]
impl Database for FakeDatabase {
    async fn describe_schema(&self) -> Result<String, sqlx::Error> {
        Ok(SCHEMA.to_string())
    }

    async fn execute(&self, _sql: &str) -> Result<QueryResult, sqlx::Error> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(QueryResult::Rows(ResultSet {
            columns: vec!["count".to_string()],
            rows: vec![vec![json!(59)]],
            truncated: false,
        }))
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }] })
}

/// Router state backed by `mock_server` plus one registered session.
fn make_state(mock_server: &MockServer) -> (Arc<HttpState>, Arc<FakeDatabase>) {
    let chat_config = ChatConfig {
        provider: Provider::Groq,
        api_key: "test-key".to_string(),
        model: "mixtral-8x7b-32768".to_string(),
        temperature: 0.0,
        timeout: Duration::from_secs(5),
    };
    let client = ChatCompletionClient::with_base_url(chat_config, mock_server.uri())
        .expect("Failed to create client");
    let state = HttpState::new(SqlChatConfig::default(), Arc::new(client));
    let database = Arc::new(FakeDatabase {
        executed: AtomicUsize::new(0),
    });
    (Arc::new(state), database)
}

async fn open_session(state: &HttpState, database: Arc<FakeDatabase>) -> Uuid {
    let connection = ConnectionConfig::from(&state.config.database);
    state
        .sessions
        .insert(ChatSession::new(connection, database))
        .await
}

async fn send(
    state: Arc<HttpState>,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, Vec<u8>) {
    let app = build_router(state);
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(
    state: Arc<HttpState>,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send(state, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_index_page_served() {
    let mock_server = MockServer::start().await;
    let (state, _) = make_state(&mock_server);

    let (status, bytes) = send(state, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(bytes).unwrap();
    assert!(page.contains("Ask me anything about your database."));
    assert!(page.contains(r#"value="chinook""#));
}

#[tokio::test]
async fn test_version_endpoint() {
    let mock_server = MockServer::start().await;
    let (state, _) = make_state(&mock_server);

    let (status, body) = send_json(state, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "sqlchat-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_chat_answers_and_records_turn() {
    let mock_server = MockServer::start().await;
    let (state, database) = make_state(&mock_server);
    let id = open_session(&state, database.clone()).await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Write only the SQL query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("SELECT COUNT(*) FROM customer;")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("SQL Response:"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("There are 59 customers.")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send_json(
        state.clone(),
        "POST",
        "/chat",
        Some(json!({ "session_id": id, "question": "How many customers are there?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "Unexpected body: {}", body);
    assert_eq!(body["sql"], "SELECT COUNT(*) FROM customer;");
    assert_eq!(body["answer"], "There are 59 customers.");
    assert_eq!(body["result"]["status"], "rows");
    assert_eq!(body["degraded"], false);
    assert!(body["took_ms"].is_number());
    assert_eq!(database.executed.load(Ordering::SeqCst), 1);

    let (status, history) =
        send_json(state, "GET", &format!("/sessions/{}/history", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let turns = history["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0]["question"], "How many customers are there?");
    assert_eq!(turns[0]["answer"], "There are 59 customers.");
}

#[tokio::test]
async fn test_chat_answer_model_failure_returns_raw_result() {
    let mock_server = MockServer::start().await;
    let (state, database) = make_state(&mock_server);
    let id = open_session(&state, database.clone()).await;

    Mock::given(method("POST"))
        .and(body_string_contains("Write only the SQL query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("SELECT COUNT(*) FROM customer;")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("SQL Response:"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send_json(
        state.clone(),
        "POST",
        "/chat",
        Some(json!({ "session_id": id, "question": "How many customers are there?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "Unexpected body: {}", body);
    assert_eq!(body["degraded"], true);
    assert!(body["model_error"].as_str().unwrap().contains("overloaded"));
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.contains("count\n59"), "Raw result expected, got: {}", answer);
    assert_eq!(database.executed.load(Ordering::SeqCst), 1);
    assert!(
        state.sessions.get(id).await.unwrap().history.is_empty(),
        "Degraded replies are not recorded"
    );
}

#[tokio::test]
async fn test_clear_during_pending_chat_is_kept() {
    let mock_server = MockServer::start().await;
    let (state, database) = make_state(&mock_server);
    let id = open_session(&state, database).await;
    state.sessions.append_turn(id, Turn::new("old q1", "a1")).await;
    state.sessions.append_turn(id, Turn::new("old q2", "a2")).await;

    Mock::given(method("POST"))
        .and(body_string_contains("Write only the SQL query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("SELECT COUNT(*) FROM customer;"))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("SQL Response:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("59 customers.")))
        .mount(&mock_server)
        .await;

    let pending = tokio::spawn(send_json(
        state.clone(),
        "POST",
        "/chat",
        Some(json!({ "session_id": id, "question": "new q" })),
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let (status, _) =
        send_json(state.clone(), "POST", &format!("/sessions/{}/clear", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = pending.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (_, history) = send_json(state, "GET", &format!("/sessions/{}/history", id), None).await;
    let questions: Vec<&str> = history["turns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["question"].as_str().unwrap())
        .collect();
    assert_eq!(questions, vec!["new q"]);
}

#[tokio::test]
async fn test_chat_model_unavailable_runs_nothing() {
    let mock_server = MockServer::start().await;
    let (state, database) = make_state(&mock_server);
    let id = open_session(&state, database.clone()).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send_json(
        state.clone(),
        "POST",
        "/chat",
        Some(json!({ "session_id": id, "question": "How many customers are there?" })),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "model_unavailable");
    assert_eq!(database.executed.load(Ordering::SeqCst), 0, "No SQL may run");
    assert!(state.sessions.get(id).await.unwrap().history.is_empty());
}

#[tokio::test]
async fn test_chat_prose_output_is_extraction_failure() {
    let mock_server = MockServer::start().await;
    let (state, database) = make_state(&mock_server);
    let id = open_session(&state, database.clone()).await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("I'm sorry, I can't help with that.")),
        )
        .mount(&mock_server)
        .await;

    let (status, body) = send_json(
        state,
        "POST",
        "/chat",
        Some(json!({ "session_id": id, "question": "Tell me a joke" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "extraction_failure");
    assert_eq!(database.executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_rejects_empty_question_and_unknown_session() {
    let mock_server = MockServer::start().await;
    let (state, database) = make_state(&mock_server);
    let id = open_session(&state, database).await;

    let (status, _) = send_json(
        state.clone(),
        "POST",
        "/chat",
        Some(json!({ "session_id": id, "question": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        state,
        "POST",
        "/chat",
        Some(json!({ "session_id": Uuid::new_v4(), "question": "How many customers?" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");

    assert!(
        mock_server.received_requests().await.unwrap_or_default().is_empty(),
        "Rejected requests must not reach the model"
    );
}

#[tokio::test]
async fn test_clear_twice_then_disconnect() {
    let mock_server = MockServer::start().await;
    let (state, database) = make_state(&mock_server);
    let id = open_session(&state, database).await;

    for _ in 0..2 {
        let (status, body) = send_json(
            state.clone(),
            "POST",
            &format!("/sessions/{}/clear", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], true);
    }

    let (status, _) = send_json(state.clone(), "DELETE", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
        send_json(state, "GET", &format!("/sessions/{}/history", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connect_unreachable_database() {
    let mock_server = MockServer::start().await;
    let (state, _) = make_state(&mock_server);

    let (status, body) = send_json(
        state.clone(),
        "POST",
        "/connect",
        Some(json!({ "host": "127.0.0.1", "port": 1, "database": "chinook" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "connection_error");
    assert!(body["error"].as_str().unwrap().contains("127.0.0.1:1"));
    assert!(state.sessions.is_empty().await);
}

#[tokio::test]
async fn test_health_counts_sessions() {
    let mock_server = MockServer::start().await;
    let (state, database) = make_state(&mock_server);
    open_session(&state, database).await;

    let (status, body) = send_json(state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["llm"]["provider"], "groq");
    assert_eq!(body["llm"]["model"], "mixtral-8x7b-32768");
    assert_eq!(body["sessions"], 1);
}
