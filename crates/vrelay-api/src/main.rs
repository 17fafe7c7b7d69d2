//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vrelay_api::{create_router, metrics, ApiConfig, AppState};
use vrelay_delivery::TelegramClient;
use vrelay_jobs::{spawn_sweeper, JobTable, RetentionPolicy};
use vrelay_media::FfmpegTranscoder;
use vrelay_storage::{SourceRouter, SourceStore};
use vrelay_worker::{Collaborators, Orchestrator, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Required for rustls 0.23+
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing()?;
    info!("Starting vrelay-api");

    let config = ApiConfig::from_env();
    info!("API config: {}", config.describe());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let storage: Arc<dyn SourceStore> =
        Arc::new(SourceRouter::from_env().context("Failed to configure storage")?);
    let transcoder = FfmpegTranscoder::new()
        .context("ffmpeg is not available")?
        .with_cancel(shutdown_rx.clone());
    let deliverer = TelegramClient::from_env().context("Failed to configure Telegram client")?;

    let collaborators = Collaborators {
        storage: Arc::clone(&storage),
        transcoder: Arc::new(transcoder),
        deliverer: Arc::new(deliverer),
    };

    let worker_config = WorkerConfig::from_env();
    info!(
        "Worker config: max_jobs={}, work_dir={}",
        worker_config.max_concurrent_jobs,
        worker_config.work_dir.display()
    );

    let table = Arc::new(JobTable::default());
    let orchestrator = Orchestrator::new(collaborators, Arc::clone(&table), worker_config);
    let sweeper = spawn_sweeper(table, RetentionPolicy::from_env(), shutdown_rx);

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install metrics recorder")?)
    } else {
        None
    };

    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    let state = AppState::new(config, orchestrator.clone(), storage);
    let app = create_router(state, metrics_handle);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop running encodes and the sweeper, then clear pending artifacts.
    let _ = shutdown_tx.send(true);
    orchestrator.shutdown().await;
    let _ = sweeper.await;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vrelay=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
