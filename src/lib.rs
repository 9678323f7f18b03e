pub mod api;
pub mod client;
pub mod db;
pub mod errors;
pub mod models;
pub mod service;
pub mod settings;

use crate::db::JsonFileStore;
use crate::errors::AppResult;
use crate::service::TodoService;
use crate::settings::AppSettings;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "server.log";
const DEFAULT_LOG_FILTER: &str = "info";

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Constructs the service over `database_path` and performs the one-time load
/// that creates the backing file if needed.
pub async fn build_service(database_path: impl Into<PathBuf>) -> AppResult<TodoService> {
    let service = TodoService::new(JsonFileStore::new(database_path));
    let count = service.initialize().await?;
    tracing::info!(todos = count, "todo store ready");
    Ok(service)
}

pub async fn run() -> anyhow::Result<()> {
    let settings = AppSettings::from_env()?;
    init_tracing(&settings).context("failed to initialize tracing")?;

    let service = build_service(&settings.database_path)
        .await
        .with_context(|| format!("failed to open {}", settings.database_path.display()))?;
    let listener = tokio::net::TcpListener::bind(settings.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_address))?;
    tracing::info!(address = %settings.bind_address, path = %settings.database_path.display(), "serving todo api");

    axum::serve(listener, api::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Daily-rolling JSON log under `settings.log_dir`. `RUST_LOG` overrides the
/// default filter.
fn init_tracing(settings: &AppSettings) -> anyhow::Result<()> {
    let (writer, guard) = tracing_appender::non_blocking(log_appender(&settings.log_dir)?);
    let _ = LOG_GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .with_writer(writer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to install log subscriber: {}", error))
}

fn log_appender(log_dir: &Path) -> AppResult<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;
    Ok(tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME))
}
