//! NE Visualizer render server.
//!
//! Usage:
//!   nevis-server [--config <PATH>] [--port <PORT>] [--verbose]
//!
//! The port defaults to `$PORT`, then 5000.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use nevis_common::config::AppConfig;
use nevis_server::{app_router, AppState};

#[derive(Parser)]
#[command(
    name = "nevis-server",
    about = "Render uploaded videos with an audio waveform overlay",
    version
)]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides $PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    nevis_common::logging::init_logging(&config.logging);

    let addr = config.server.socket_addr();
    let state = AppState::new(config);

    let invoker = state.pipeline().invoker();
    if !invoker.is_available() {
        tracing::warn!(
            engine = invoker.name(),
            binary = %state.config().engine.binary.display(),
            "Render engine not found; render requests will fail"
        );
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        temp_dir = %state.pipeline().temp_dir().display(),
        "Render server listening"
    );

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Render server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
