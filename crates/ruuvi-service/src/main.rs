//! Ruuvi Service - Ingestion buffer, flusher and HTTP API.
//!
//! Run with: `cargo run -p ruuvi-service`

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use ruuvi_service::config::default_config_path;
use ruuvi_service::{AppState, Config, Flusher, api, flush_now};
use ruuvi_store::Store;

/// Ruuvi Service - buffered RuuviTag ingestion with history and trends.
#[derive(Parser, Debug)]
#[command(name = "ruuvi-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Disable the periodic flusher (flush only via `POST /api/flush`).
    #[arg(long)]
    no_flusher: bool,

    /// Write the resolved configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ruuvi_service=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_else(|e| {
            warn!("Ignoring default config: {}", e);
            Config::default()
        }),
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    config.validate()?;

    if args.write_config {
        let path = args.config.unwrap_or_else(default_config_path);
        config.save(&path)?;
        info!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    let store = Store::open(&config.storage.path)?;

    let bind = config.server.bind.clone();
    let state = AppState::new(store, config);

    let flusher = Flusher::new(Arc::clone(&state));
    if args.no_flusher {
        info!("Periodic flusher disabled");
    } else {
        flusher.start().await;
    }

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Starting server on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain whatever is still buffered before closing the store
    flusher.stop().await;
    match flush_now(&state).await {
        Ok(count) => info!("Final flush stored {} reading(s)", count),
        Err(e) => error!("Final flush failed, {} reading(s) lost: {}", e.unflushed, e),
    }
    state.store.lock().await.close()?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
