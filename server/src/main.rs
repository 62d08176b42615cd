//! Tracker HTTP server.

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker_postgres::PostgresStorage;
use tracker_runtime::TrackerServices;
use tracker_runtime::metrics::MetricsRecorder;
use tracker_server::config::Config;
use tracker_server::{event_sink, tag_source};
use tracker_web::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracker=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        database_url = %config.database.redacted_url(),
        sink = ?config.sink,
        topic = %config.publisher.topic,
        "Configuration loaded"
    );

    let metrics = match MetricsRecorder::install() {
        Ok(recorder) => Some(recorder),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    let storage = PostgresStorage::connect(&config.database.url, &config.pool_settings())
        .await
        .context("Failed to connect to PostgreSQL")?;
    storage.migrate().await.context("Failed to apply migrations")?;
    info!("Database ready");

    let services = TrackerServices::new(
        Arc::new(storage),
        event_sink(&config)?,
        tag_source(&config)?,
        config.publisher_config(),
    );

    let mut state = AppState::new(services.clone());
    if let Some(recorder) = metrics {
        state = state.with_metrics(recorder);
    }
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining comment event queue");
    services.shutdown().await;
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
