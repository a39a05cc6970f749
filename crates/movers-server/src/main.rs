//! # movers-server
//!
//! Cache-and-refresh proxy for crypto market movers.
//!
//! Loads an optional JSON configuration file, builds the KV store, the
//! upstream sources and the refresh engine, then serves HTTP until Ctrl+C.
//! On shutdown the listener stops first; background refreshes get
//! `engine.shutdown_grace_ms` to finish.
//!
//! # Usage
//!
//! ```bash
//! movers-server config.json --log-level info --port 8787
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

/// Market movers cache-and-refresh proxy.
#[derive(Parser)]
#[command(name = "movers-server", about = "Market movers cache-and-refresh proxy")]
struct Cli {
    /// Configuration file path (JSON). Defaults apply when omitted.
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit console logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Override `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `server.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Logging
    movers_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "movers-server", cli.json_logs);

    // 2. Configuration
    let mut config = movers_server::config::load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    info!(
        "movers-server starting: config={}, kv={:?}, static_dir={}",
        cli.config.as_ref().map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string()),
        config.kv.backend,
        config.server.static_dir,
    );

    // 3. Sources, engine, router
    let state = movers_server::state::AppState::build(&config).await?;
    let app = movers_server::app(state.clone(), &config.server.static_dir);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on {addr}, press Ctrl+C to stop");

    // 4. Serve until the shutdown signal
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    // 5. Drain background refreshes
    if state.engine.shutdown(config.engine.shutdown_grace()).await {
        info!("background refreshes drained, goodbye");
    } else {
        warn!("background refreshes cancelled after grace period");
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => warn!("ctrl-c handler failed: {e}"),
    }
}
