//! wabridge-server: receives WhatsApp Business webhooks, stores media and
//! exposes the outbound send and settings endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use wabridge::config::{load_effective_config, ConfigProvider};
use wabridge::telemetry::init_tracing;
use wabridge::{build_router, AppState, Database};

#[derive(Parser)]
#[command(name = "wabridge-server")]
#[command(about = "WhatsApp Business webhook ingestion and media pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file (defaults to $WABRIDGE_CONFIG).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind_addr`.
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_effective_config(cli.config.as_deref()).context("Failed to load config")?;
    init_tracing(&config.logging).context("Failed to initialize tracing")?;

    info!("Starting wabridge v{}", env!("CARGO_PKG_VERSION"));

    let bind_addr: SocketAddr = match cli.bind {
        Some(addr) => addr,
        None => config
            .server
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", config.server.bind_addr))?,
    };

    let db = Database::open(&config.storage.database_path).context("Failed to open database")?;
    let provider = Arc::new(ConfigProvider::new(config, db.clone())?);
    let state = AppState::from_provider(provider, db)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}
