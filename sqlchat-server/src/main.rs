use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlchat_core::{ConnectionConfig, SqlChatConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use sqlchat_server::http::{self, HttpState};
use sqlchat_server::sessions;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "sqlchat.toml")]
    config: String,

    /// Override `http.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `http.port`
    #[arg(long)]
    port: Option<u16>,

    /// Connect to the default database, print its version and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (GROQ_API_KEY and friends)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match SqlChatConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    if args.health {
        let connection = ConnectionConfig::from(&config.database);
        let pool = match sqlchat_core::db::create_pool(&connection, &config.database).await {
            Ok(p) => p,
            Err(e) => {
                println!("❌ Cannot connect to {}: {}", connection.display_url(), e);
                std::process::exit(1);
            }
        };
        match sqlchat_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL health check failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let state = match HttpState::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to set up language model: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        provider = state.llm.name(),
        model = state.llm.model(),
        "Language model configured"
    );

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let idle_seconds = state.config.http.session_idle_seconds;
    if idle_seconds > 0 {
        tokio::spawn(sessions::run_eviction_loop(
            state.sessions.clone(),
            Duration::from_secs(idle_seconds),
            tx.subscribe(),
        ));
    }

    http::start_http_server(Arc::new(state), tx.subscribe()).await?;

    Ok(())
}
