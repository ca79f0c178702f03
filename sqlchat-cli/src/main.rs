//! sqlchat-cli: terminal client for the sqlchat HTTP API
//!
//! Talks to a running `sqlchat-server`, the same way the browser UI does.
//!
//! # Subcommands
//! - `status`: show server health
//! - `ask <question>`: connect, ask one question, print the answer
//! - `chat`: interactive session (`/history`, `/clear`, `/quit`)

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use sqlchat_core::api::{
    ChatRequest, ChatResponse, ConnectRequest, ConnectResponse, ErrorResponse, HistoryResponse,
};
use uuid::Uuid;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8501";
const GREETING: &str = "Hello! I'm a SQL assistant. Ask me anything about your database.";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "sqlchat-cli", version, about = "Chat with a database from the terminal")]
struct Cli {
    /// sqlchat HTTP server URL (overrides SQLCHAT_HTTP_URL env var)
    #[arg(long, env = "SQLCHAT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Database to connect to. Anything left unset uses the server's defaults.
#[derive(Debug, Args)]
struct ConnectionArgs {
    #[arg(long, env = "SQLCHAT_DB_HOST")]
    db_host: Option<String>,

    #[arg(long, env = "SQLCHAT_DB_PORT")]
    db_port: Option<u16>,

    #[arg(long, env = "SQLCHAT_DB_USER")]
    db_user: Option<String>,

    #[arg(long, env = "SQLCHAT_DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,

    #[arg(long, env = "SQLCHAT_DB_NAME")]
    db_name: Option<String>,
}

impl ConnectionArgs {
    fn to_request(&self) -> ConnectRequest {
        ConnectRequest {
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
            session_id: None,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show sqlchat server status
    Status,

    /// Ask a single question and print the answer
    Ask {
        question: String,

        /// Also print the generated SQL and the raw result
        #[arg(long)]
        show_sql: bool,
    },

    /// Start an interactive chat
    Chat {
        /// Print the generated SQL after each answer
        #[arg(long)]
        show_sql: bool,
    },
}

// ============================================================================
// HTTP Client
// ============================================================================

struct ApiClient {
    client: reqwest::blocking::Client,
    server: String,
}

impl ApiClient {
    fn new(server: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn health(&self) -> anyhow::Result<serde_json::Value> {
        let url = self.url("/health");
        let resp = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("cannot reach {}", url))?;
        read_json(resp)
    }

    fn connect(&self, req: &ConnectRequest) -> anyhow::Result<ConnectResponse> {
        let url = self.url("/connect");
        let resp = self
            .client
            .post(&url)
            .json(req)
            .send()
            .with_context(|| format!("cannot reach {}", url))?;
        read_json(resp)
    }

    fn chat(&self, session_id: Uuid, question: &str) -> anyhow::Result<ChatResponse> {
        let url = self.url("/chat");
        let body = ChatRequest {
            session_id,
            question: Some(question.to_string()),
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .with_context(|| format!("cannot reach {}", url))?;
        read_json(resp)
    }

    fn history(&self, session_id: Uuid) -> anyhow::Result<HistoryResponse> {
        let resp = self
            .client
            .get(self.url(&format!("/sessions/{}/history", session_id)))
            .send()?;
        read_json(resp)
    }

    fn clear(&self, session_id: Uuid) -> anyhow::Result<serde_json::Value> {
        let resp = self
            .client
            .post(self.url(&format!("/sessions/{}/clear", session_id)))
            .send()?;
        read_json(resp)
    }

    fn disconnect(&self, session_id: Uuid) -> anyhow::Result<serde_json::Value> {
        let resp = self
            .client
            .delete(self.url(&format!("/sessions/{}", session_id)))
            .send()?;
        read_json(resp)
    }
}

/// Decode a success body, or turn the server's error body into an `anyhow` error.
fn read_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::blocking::Response,
) -> anyhow::Result<T> {
    let status = resp.status();
    let text = resp.text()?;
    if status.is_success() {
        return serde_json::from_str(&text).context("failed to parse server response");
    }
    Err(anyhow!(describe_error(status.as_u16(), &text)))
}

fn describe_error(code: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => format!("{} [{}]", err.error, err.kind),
        Err(_) => format!("server returned HTTP {}: {}", code, body),
    }
}

// ============================================================================
// Output formatting
// ============================================================================

fn format_reply(reply: &ChatResponse, show_sql: bool) -> String {
    let mut out = String::new();
    if show_sql {
        out.push_str(&format!("SQL: {}\n", reply.sql));
        out.push_str(&reply.result.render());
        out.push_str("\n\n");
    }
    out.push_str(&reply.answer);
    if let Some(err) = &reply.model_error {
        out.push_str(&format!("\n\n(language model error: {})", err));
    }
    out
}

fn format_history(history: &HistoryResponse) -> String {
    if history.turns.is_empty() {
        return "(no messages yet)".to_string();
    }
    history
        .turns
        .iter()
        .map(|t| format!("You: {}\nAI:  {}", t.question, t.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Quit,
    History,
    Clear,
    Unknown(String),
    Question(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/quit" | "/exit" | "/q" => Input::Quit,
        "/history" => Input::History,
        "/clear" => Input::Clear,
        cmd if cmd.starts_with('/') => Input::Unknown(cmd.to_string()),
        question => Input::Question(question.to_string()),
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn do_status(api: &ApiClient) -> anyhow::Result<()> {
    let body = api.health()?;
    println!("sqlchat server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
    println!("LLM provider:   {}", body["llm"]["provider"].as_str().unwrap_or("?"));
    println!("LLM model:      {}", body["llm"]["model"].as_str().unwrap_or("?"));
    println!("Sessions:       {}", body["sessions"].as_u64().unwrap_or(0));
    Ok(())
}

fn do_ask(
    api: &ApiClient,
    connection: &ConnectionArgs,
    question: &str,
    show_sql: bool,
) -> anyhow::Result<()> {
    let session = api.connect(&connection.to_request())?;
    let outcome = api.chat(session.session_id, question);
    // Best effort: the server forgets the session on restart anyway.
    let _ = api.disconnect(session.session_id);

    println!("{}", format_reply(&outcome?, show_sql));
    Ok(())
}

fn do_chat(api: &ApiClient, connection: &ConnectionArgs, show_sql: bool) -> anyhow::Result<()> {
    let session = api.connect(&connection.to_request())?;
    println!("Connected to {} ({})", session.database, session.server_version);
    println!("{}", GREETING);
    println!("Commands: /history, /clear, /quit\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::History => match api.history(session.session_id) {
                Ok(history) => println!("{}\n", format_history(&history)),
                Err(e) => eprintln!("sqlchat-cli: {}\n", e),
            },
            Input::Clear => match api.clear(session.session_id) {
                Ok(_) => println!("History cleared.\n"),
                Err(e) => eprintln!("sqlchat-cli: {}\n", e),
            },
            Input::Unknown(cmd) => {
                eprintln!("Unknown command {}. Try /history, /clear or /quit.\n", cmd)
            }
            Input::Question(question) => match api.chat(session.session_id, &question) {
                Ok(reply) => println!("{}\n", format_reply(&reply, show_sql)),
                Err(e) => eprintln!("sqlchat-cli: {}\n", e),
            },
        }
    }

    let _ = api.disconnect(session.session_id);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    // Two model round trips per question; allow for slow completions.
    let result = ApiClient::new(&cli.server, Duration::from_secs(120)).and_then(|api| {
        match &cli.command {
            Commands::Status => do_status(&api),
            Commands::Ask { question, show_sql } => {
                do_ask(&api, &cli.connection, question, *show_sql)
            }
            Commands::Chat { show_sql } => do_chat(&api, &cli.connection, *show_sql),
        }
    });

    if let Err(e) = result {
        eprintln!("sqlchat-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
