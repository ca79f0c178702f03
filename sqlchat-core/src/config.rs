use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SqlChatConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Sessions untouched for this long are dropped with their pools. 0 keeps them forever.
    pub session_idle_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            session_idle_seconds: 3600,
        }
    }
}

/// Language-model provider settings.
///
/// `base_url` and `api_key_env` fall back to the provider's defaults when unset.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "mixtral-8x7b-32768".to_string(),
            base_url: None,
            api_key_env: None,
            temperature: 0.0,
            timeout_seconds: 60,
        }
    }
}

/// Default connection parameters, used to prefill the sidebar form and for `--health`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "chinook".to_string(),
            max_connections: 2,
            connect_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    /// Rows kept from a generated query; the rest are dropped and the result marked truncated.
    pub max_rows: usize,
    /// Sample rows appended to each table in the schema description. 0 disables.
    pub sample_rows: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_rows: 100,
            sample_rows: 3,
        }
    }
}

impl SqlChatConfig {
    /// Load from `path` (optional) with `SQLCHAT__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("SQLCHAT").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
