pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod extract;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod session;

pub use config::SqlChatConfig;
pub use db::{Database, PgDatabase};
pub use error::{ChatError, ExtractionError, LlmError, SqlChatError};
pub use extract::extract_sql;
pub use llm::{create_backend, ChatCompletionClient, ChatConfig, LlmBackend, Provider};
pub use models::{ConnectionConfig, QueryResult, ResultSet, Role, Turn};
pub use pipeline::{answer_question, ask, Reply};
pub use session::{ChatHistory, ChatSession};
