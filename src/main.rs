use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lodgr::config::Config;
use lodgr::AppState;

#[derive(Parser, Debug)]
#[command(name = "lodgr")]
#[command(author, version, about = "A lightweight guest-house reservation engine", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "lodgr.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lodgr v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;

    // Initialize database
    let db = lodgr::db::init(&config.server.data_dir).await?;

    if config.gateway.merchant_key.is_none() || config.gateway.salt.is_none() {
        tracing::warn!("Payment gateway credentials not configured; payment initiation will fail");
    }

    // Create app state and API router
    let state = Arc::new(AppState::new(config.clone(), db));
    let app = lodgr::api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.api_port)
        .parse()
        .with_context(|| "Invalid server address")?;

    tracing::info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
