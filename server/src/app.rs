//! Engine assembly: storage backend, processors, ledger, notifier,
//! orchestrator and the HTTP state tying them together.

use crate::config::{Config, StorageBackend, StorageConfig};
use axum::{Router, http::StatusCode, routing::get};
use seatflow_core::{
    BookingStateMachine, Clock, DataStore, LowBalanceAlert, PaymentGateway, Seat, SystemClock,
    Tenant,
};
use seatflow_postgres::PostgresStore;
use seatflow_runtime::gateways::{GatewayAClient, GatewayBClient};
use seatflow_runtime::metrics::MetricsServer;
use seatflow_runtime::{
    BookingNotifier, BookingOrchestrator, ChannelAlertSink, CreditLedger, InMemoryStore,
    OutboundMessage, PaymentGatewayRouter, WebhookProcessor,
};
use seatflow_web::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The storage the engine runs on.
#[derive(Clone)]
pub enum Backend {
    /// Process-local store
    Memory(Arc<InMemoryStore>),
    /// `PostgreSQL` store
    Postgres(PostgresStore),
}

impl Backend {
    /// Open the configured backend, migrating the schema when asked to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or a migration fails.
    pub async fn open(config: &StorageConfig) -> anyhow::Result<Self> {
        match config.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Self::Memory(Arc::new(InMemoryStore::new())))
            }
            StorageBackend::Postgres => {
                tracing::info!("Connecting to database...");
                let store =
                    PostgresStore::connect(&config.database_url, config.max_connections).await?;
                if config.run_migrations {
                    store.migrate().await?;
                }
                tracing::info!(max_connections = config.max_connections, "Database connected");
                Ok(Self::Postgres(store))
            }
        }
    }

    /// The backend as a tenant-scopable data connection.
    #[must_use]
    pub fn data_store(&self) -> Arc<dyn DataStore> {
        match self {
            Self::Memory(store) => Arc::clone(store) as Arc<dyn DataStore>,
            Self::Postgres(store) => Arc::new(store.clone()),
        }
    }

    /// Create or replace a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn put_tenant(&self, tenant: &Tenant) -> anyhow::Result<()> {
        match self {
            Self::Memory(store) => store.add_tenant(tenant.clone()),
            Self::Postgres(store) => store.upsert_tenant(tenant).await?,
        }
        Ok(())
    }

    /// Create or replace a seat.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn put_seat(&self, seat: &Seat) -> anyhow::Result<()> {
        match self {
            Self::Memory(store) => store.add_seat(seat.clone()),
            Self::Postgres(store) => store.upsert_seat(seat).await?,
        }
        Ok(())
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory(_) => f.write_str("Backend::Memory"),
            Self::Postgres(store) => f.debug_tuple("Backend::Postgres").field(store).finish(),
        }
    }
}

/// A wired engine plus the queues its collaborators drain.
pub struct Engine {
    /// HTTP state
    pub state: AppState,
    /// Low-balance alerts
    pub alerts: mpsc::Receiver<LowBalanceAlert>,
    /// Confirmation messages awaiting delivery
    pub outbox: mpsc::Receiver<OutboundMessage>,
}

/// Wire the engine over `store` with the given processors.
#[must_use]
pub fn assemble(
    config: &Config,
    store: Arc<dyn DataStore>,
    gateway_a: Arc<dyn PaymentGateway>,
    gateway_b: Arc<dyn PaymentGateway>,
) -> Engine {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (alert_sink, alerts) = ChannelAlertSink::new(config.queue_capacity);
    let ledger = Arc::new(CreditLedger::new(
        config.credit_rates,
        Arc::new(alert_sink),
        Arc::clone(&clock),
    ));
    let (notifier, outbox) = BookingNotifier::new(Arc::clone(&ledger), config.queue_capacity);

    let router = Arc::new(PaymentGatewayRouter::new(
        gateway_a,
        gateway_b,
        config.fees,
        &config.policy,
        Arc::clone(&clock),
    ));
    let orchestrator = Arc::new(
        BookingOrchestrator::new(config.policy.clone(), Arc::clone(&router), clock)
            .with_notifier(Arc::new(notifier)),
    );
    let webhooks = Arc::new(WebhookProcessor::new(
        Arc::clone(&store),
        router,
        BookingStateMachine::new(config.policy.cancellation_fee),
    ));

    Engine {
        state: AppState::new(store, orchestrator, Arc::clone(&ledger), webhooks),
        alerts,
        outbox,
    }
}

/// HTTP clients for both processors from configuration.
#[must_use]
pub fn http_gateways(config: &Config) -> (Arc<dyn PaymentGateway>, Arc<dyn PaymentGateway>) {
    (
        Arc::new(GatewayAClient::new(config.gateways.gateway_a.clone())),
        Arc::new(GatewayBClient::new(config.gateways.gateway_b.clone())),
    )
}

/// Drain the engine's queues.
///
/// Delivery is owned by an external messaging service; here alerts and
/// messages are logged so they stay visible.
pub fn spawn_queue_consumers(
    mut alerts: mpsc::Receiver<LowBalanceAlert>,
    mut outbox: mpsc::Receiver<OutboundMessage>,
) -> Vec<JoinHandle<()>> {
    let alert_task = tokio::spawn(async move {
        while let Some(alert) = alerts.recv().await {
            tracing::warn!(
                tenant_id = %alert.tenant_id,
                channel = %alert.channel,
                remaining = alert.remaining,
                threshold = alert.threshold,
                "Low credit balance"
            );
        }
        tracing::debug!("Alert queue closed");
    });

    let outbox_task = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            tracing::info!(
                tenant_id = %message.tenant_id,
                channel = %message.channel,
                booking_id = %message.booking_id,
                user_id = %message.user_id,
                "Confirmation message ready for delivery"
            );
        }
        tracing::debug!("Outbox closed");
    });

    vec![alert_task, outbox_task]
}

/// Prometheus scrape endpoint.
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let metrics = Arc::clone(&metrics);
            async move {
                metrics.render().map_or_else(
                    || {
                        (
                            StatusCode::SERVICE_UNAVAILABLE,
                            "metrics recorder not installed".to_string(),
                        )
                    },
                    |body| (StatusCode::OK, body),
                )
            }
        }),
    )
}
