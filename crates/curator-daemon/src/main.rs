//! curator-daemon: runs the cloud sync engine against the local database.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator_cloud::{CloudClient, HttpConnectivityProbe};
use curator_core::defaults;
use curator_db::{log_pool_metrics, Database};
use curator_sync::{SyncConfig, SyncEngine, SyncEvent, SyncScheduler};

/// Install the global subscriber. The returned guard must outlive logging.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, daily rotation)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - env filter (default: "curator_sync=info,curator_daemon=info")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "curator_sync=info,curator_daemon=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("curator-daemon.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DATABASE_URL.to_string());
    let db = Database::connect(&database_url)
        .await
        .with_context(|| format!("failed to open database at {database_url}"))?;
    db.migrate().await.context("failed to run migrations")?;

    let client = CloudClient::from_env().context("failed to build cloud client")?;
    let probe = HttpConnectivityProbe::new(client.clone());
    let config = SyncConfig::from_env();

    info!(
        subsystem = "daemon",
        language = %config.language,
        workspace_type = %config.workspace_type,
        interval_secs = config.poll_interval().as_secs(),
        pan_dimensions = config.pan_dimension_ids.len(),
        "Starting sync engine"
    );

    let engine = Arc::new(SyncEngine::new(
        Arc::new(db.sync.clone()),
        Arc::new(client),
        Arc::new(probe),
        config,
    ));

    match engine.status().await {
        Ok(status) => info!(
            subsystem = "daemon",
            pending_total = status.pending.total(),
            pending_files = status.pending.files,
            pending_tags = status.pending.tags,
            "Local backlog"
        ),
        Err(e) => warn!(subsystem = "daemon", error = %e, "Failed to read pending counts"),
    }

    let handle = SyncScheduler::new(engine).start();

    // Pool health after every cycle that touched the database.
    let mut events = handle.events();
    let pool = db.pool.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SyncEvent::CycleCompleted { .. } | SyncEvent::CycleFailed { .. }) => {
                    log_pool_metrics(&pool)
                }
                Ok(SyncEvent::SchedulerStopped) | Err(RecvError::Closed) => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!(subsystem = "daemon", "Shutdown requested");

    // The loop may already have exited when sync is disabled.
    if let Err(e) = handle.shutdown().await {
        warn!(subsystem = "daemon", error = %e, "Scheduler already stopped");
    }
    handle.join().await?;
    info!(subsystem = "daemon", "Daemon stopped");
    Ok(())
}
