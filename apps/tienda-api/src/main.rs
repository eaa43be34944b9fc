//! # Tienda API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tienda API Server                              │
//! │                                                                         │
//! │  Browser / Admin ───► HTTP (8080) ───► Routes ───► SQLite              │
//! │                                          │                              │
//! │  Processor ─── webhook ─────────────────►│                              │
//! │                                          ▼                              │
//! │                                   Payment processor                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tienda_api::config::{LogFormat, LoggingSettings};
use tienda_api::{build_router, ApiConfig, AppState, HttpProcessorClient, DEFAULT_LOG_FILTER};
use tienda_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("TIENDA_CONFIG").ok().map(PathBuf::from);
    let config = ApiConfig::load(config_path)?;

    init_tracing(&config.logging);
    info!("Starting Tienda API server...");
    info!(
        addr = %config.server.bind_address(),
        db_path = %config.database.path.display(),
        store = %config.store.name,
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await?;
    info!("Database ready");

    if config.processor.access_token.is_none() {
        warn!("TIENDA_PROCESSOR_ACCESS_TOKEN not set; online checkout will fail");
    }
    let processor = Arc::new(HttpProcessorClient::new(&config.processor)?);

    let state = AppState::new(
        db.clone(),
        config.store.profile(),
        processor,
        config.processor.clone(),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let directives = logging
        .filter
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
