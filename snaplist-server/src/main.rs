//! snaplist-server - image to playlist service
//!
//! **Module Identity:**
//! - Name: snaplist-server
//! - Port: 5740 (default)
//!
//! Recognizes songs in an uploaded image with a vision model and builds a
//! catalog playlist from them.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use snaplist_server::logging::{apply_log_level, init_logging};
use snaplist_server::AppState;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "snaplist-server", version, about = "Image to playlist service")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_handle = init_logging();

    let mut config = snaplist_common::config::load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    apply_log_level(&log_handle, &config.logging.level).context("Invalid log level")?;

    info!("Starting snaplist-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    info!(environment = ?config.environment, "Environment");

    let state = AppState::from_config(&config).context("Failed to initialize services")?;
    let app = snaplist_server::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
