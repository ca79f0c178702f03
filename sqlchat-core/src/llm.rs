//! Language-model client for OpenAI-compatible chat completions
//!
//! Provides an `LlmBackend` trait with one HTTP implementation that covers:
//! - **Groq**: `https://api.groq.com/openai/v1`, key in `GROQ_API_KEY` (default)
//! - **OpenAI**: `https://api.openai.com/v1`, key in `OPENAI_API_KEY`
//!
//! Requests are single-shot with a bounded timeout. Failures are returned to the
//! caller immediately; nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ============================================================================
// LlmBackend trait
// ============================================================================

/// Abstraction over completion providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send one user prompt and return the model's text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Providers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Groq,
    OpenAi,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, LlmError> {
        match name.to_ascii_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAi),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::OpenAi => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Groq => GROQ_BASE_URL,
            Provider::OpenAi => OPENAI_BASE_URL,
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

/// Resolved client settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ChatConfig {
    /// Resolve provider defaults and read the API key from the environment.
    pub fn from_config(config: &LlmConfig) -> Result<(Self, String), LlmError> {
        let provider = Provider::parse(&config.provider)?;
        let key_env = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| provider.default_api_key_env().to_string());
        let api_key = std::env::var(&key_env).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey { env: key_env });
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| provider.default_base_url().to_string());

        Ok((
            Self {
                provider,
                api_key,
                model: config.model.clone(),
                temperature: config.temperature,
                timeout: Duration::from_secs(config.timeout_seconds),
            },
            base_url,
        ))
    }
}

/// Create the configured backend.
pub fn create_backend(config: &LlmConfig) -> Result<Box<dyn LlmBackend>, LlmError> {
    let (chat_config, base_url) = ChatConfig::from_config(config)?;
    Ok(Box::new(ChatCompletionClient::with_base_url(chat_config, base_url)?))
}

// ============================================================================
// Chat completion API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Debug, Deserialize)]
struct CompletionContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// ChatCompletionClient
// ============================================================================

/// Calls `POST {base_url}/chat/completions` with a single user message.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    config: ChatConfig,
    base_url: String,
}

impl ChatCompletionClient {
    pub fn new(config: ChatConfig) -> Result<Self, LlmError> {
        let base_url = config.provider.default_base_url().to_string();
        Self::with_base_url(config, base_url)
    }

    /// Create a client with a custom base URL (self-hosted gateways, tests)
    pub fn with_base_url(config: ChatConfig, base_url: String) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey {
                env: config.provider.default_api_key_env().to_string(),
            });
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LlmBackend for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![CompletionMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(
                code = status.as_u16(),
                message = %message,
                backend = self.config.provider.name(),
                "Chat completion API error"
            );

            return Err(LlmError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response.json().await?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }

        tracing::debug!(model = %self.config.model, chars = text.len(), "Completion received");
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn name(&self) -> &str {
        self.config.provider.name()
    }
}

// ============================================================================
// TESTS
// ============================================================================
