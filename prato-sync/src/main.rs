//! Recipe sync relay (prato-sync) - Main entry point
//!
//! Relays recipe records written to the local document store to the
//! downstream recipe API:
//! - per-record triggers on every insert
//! - `POST /syncManual` on-demand batch delivery
//! - scheduled stamping of unsynced records

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use prato_common::config::{SettingOverrides, SyncSettings, TomlConfig};
use prato_common::events::EventBus;
use prato_common::{Clock, SystemClock};
use prato_sync::db::{init_database_pool, RecordStore, SqliteRecordStore};
use prato_sync::delivery::DeliveryClient;
use prato_sync::scheduler::spawn_scheduler;
use prato_sync::triggers::spawn_trigger_dispatcher;
use prato_sync::{build_router, AppState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for prato-sync
#[derive(Parser, Debug)]
#[command(name = "prato-sync")]
#[command(about = "Recipe sync relay for Prato")]
#[command(version)]
struct Args {
    /// Base URL of the downstream recipe API
    #[arg(long, env = "PRATO_API_URL")]
    api_url: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PRATO_SYNC_PORT")]
    port: Option<u16>,

    /// Folder holding the database
    #[arg(short, long, env = "PRATO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Seconds between scheduled reconciliation passes
    #[arg(long, env = "PRATO_SYNC_INTERVAL_SECS")]
    sync_interval_secs: Option<u64>,

    /// Timeout for outbound API calls, in seconds
    #[arg(long, env = "PRATO_API_TIMEOUT_SECS")]
    api_timeout_secs: Option<u64>,

    /// Config file (default: platform config location)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prato_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Prato sync relay (prato-sync) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let toml_config = TomlConfig::load_or_default(args.config.as_deref());
    let overrides = SettingOverrides {
        root_folder: args.root_folder,
        api_url: args.api_url,
        port: args.port,
        sync_interval_secs: args.sync_interval_secs,
        api_timeout_secs: args.api_timeout_secs,
    };
    let settings =
        SyncSettings::resolve(overrides, &toml_config).context("Invalid configuration")?;

    settings
        .ensure_root_folder()
        .context("Failed to create root folder")?;
    let db_path = settings.database_path();
    info!("Database path: {}", db_path.display());
    info!("Downstream API: {}", settings.api_url);

    let pool = init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let event_bus = EventBus::new(1000);
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(
        pool,
        clock.clone(),
        event_bus.clone(),
    ));
    let client = DeliveryClient::new(
        &settings.api_url,
        settings.api_timeout_secs.map(Duration::from_secs),
    )
    .context("Failed to create API client")?;

    let state = AppState::new(store, client, clock, event_bus);

    let cancel_token = CancellationToken::new();
    let dispatcher = spawn_trigger_dispatcher(state.clone(), cancel_token.clone());
    let scheduler = spawn_scheduler(
        state.clone(),
        Duration::from_secs(settings.sync_interval_secs),
        cancel_token.clone(),
    );

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await
        .context("Server error")?;

    // In-flight trigger tasks are dropped; their records stay unsynced
    cancel_token.cancel();
    let _ = tokio::join!(dispatcher, scheduler);

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler; cancels background tasks on exit
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    cancel_token.cancel();
}
