//! # strandd
//!
//! The Strand sync server binary — loads settings, initializes tracing, and
//! serves the WebSocket gateway until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use strand_server::{ServerConfig, StrandServer};
use strand_settings::{LogFormat, StrandSettings};

/// Strand sync server.
#[derive(Parser, Debug)]
#[command(name = "strandd", about = "Strand sync server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a settings file (defaults to `~/.strand/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (overrides settings).
    #[arg(long, value_parser = ["pretty", "json"])]
    log_format: Option<String>,
}

fn init_tracing(settings: &StrandSettings, cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.filter.clone()));
    let format = match cli.log_format.as_deref() {
        Some("json") => LogFormat::Json,
        Some(_) => LogFormat::Pretty,
        None => settings.logging.format,
    };
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn server_config(settings: &StrandSettings, cli: &Cli) -> ServerConfig {
    let server = &settings.server;
    ServerConfig {
        host: cli.host.clone().unwrap_or_else(|| server.host.clone()),
        port: cli.port.unwrap_or(server.port),
        max_connections: server.max_connections,
        heartbeat_interval_secs: server.heartbeat_interval_secs,
        heartbeat_timeout_secs: server.heartbeat_timeout_secs,
        max_message_size: server.max_message_size,
        delta_buffer: server.delta_buffer,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => strand_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => strand_settings::load_settings().context("failed to load settings")?,
    };
    init_tracing(&settings, &cli);

    let config = server_config(&settings, &cli);
    let server = StrandServer::new(config);
    let (addr, handle) = server
        .listen()
        .await
        .context("failed to bind server socket")?;
    server.shutdown().register(handle);
    tracing::info!(%addr, "strandd ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    server.shutdown().drain(Duration::from_secs(10)).await;
    Ok(())
}
