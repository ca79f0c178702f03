use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlChatError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Other error: {0}")]
    Other(String),
}

/// Language-model transport errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key (set {env})")]
    MissingApiKey { env: String },

    #[error("Model returned an empty completion")]
    EmptyCompletion,

    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),
}

/// Failure to isolate a SQL statement from model output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("model returned empty output")]
    EmptyOutput,

    #[error("model output did not contain a SQL statement")]
    NoSql,
}

/// Errors that abort a chat request. SQL execution errors are not here: they are
/// carried in the reply so the model can explain them.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Cannot reach the database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Language model unavailable: {0}")]
    ModelUnavailable(#[from] LlmError),

    #[error("Could not understand the question well enough to form a query: {0}")]
    Extraction(#[from] ExtractionError),
}

impl ChatError {
    /// Stable machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Connection(_) => "connection_error",
            ChatError::ModelUnavailable(_) => "model_unavailable",
            ChatError::Extraction(_) => "extraction_failure",
        }
    }
}
