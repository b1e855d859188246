//! Seatflow booking engine HTTP server.
//!
//! Multi-tenant seat booking with payment routing, failover and prepaid
//! messaging credits.

use seatflow_runtime::metrics::MetricsServer;
use seatflow_server::app::{self, Backend};
use seatflow_server::{Config, SeedData};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,seatflow=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Seatflow server");

    // Load configuration
    let config = Config::from_env();
    info!(
        storage = ?config.storage.backend,
        gateway_a = %config.gateways.gateway_a.base_url,
        gateway_b = %config.gateways.gateway_b.base_url,
        tie_break = %config.policy.tie_break,
        "Configuration loaded"
    );

    // Metrics
    let mut metrics = MetricsServer::new(config.server.metrics_address()?);
    metrics.start()?;
    let metrics = Arc::new(metrics);
    let metrics_listener = tokio::net::TcpListener::bind(metrics.addr()).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, app::metrics_router(metrics)).await {
            error!(error = %e, "Metrics server stopped");
        }
    });

    // Storage
    let backend = Backend::open(&config.storage).await?;

    // Engine
    let (gateway_a, gateway_b) = app::http_gateways(&config);
    let engine = app::assemble(&config, backend.data_store(), gateway_a, gateway_b);

    if let Some(path) = &config.seed_file {
        let seed = SeedData::load(path).await?;
        seed.apply(&backend, &engine.state.ledger).await?;
    }

    let consumers = app::spawn_queue_consumers(engine.alerts, engine.outbox);
    let router = seatflow_web::build_router(engine.state);

    // Serve
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router)
        .with_graceful_shutdown({
            let shutdown = Arc::clone(&shutdown);
            async move {
                shutdown_signal().await;
                shutdown.notify_one();
            }
        })
        .into_future();

    let drain_limit = Duration::from_secs(config.server.shutdown_timeout);
    tokio::select! {
        result = server => result?,
        () = async {
            shutdown.notified().await;
            tokio::time::sleep(drain_limit).await;
        } => {
            warn!(timeout_secs = drain_limit.as_secs(), "Shutdown timeout elapsed, dropping open connections");
        }
    }

    for consumer in consumers {
        consumer.abort();
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
