//! Prometheus metrics for the booking engine.
//!
//! Components record through the recorder structs below; the server binary
//! installs the exporter once with [`MetricsServer::start`] and serves
//! [`MetricsServer::render`] on its metrics address.
//!
//! # Example
//!
//! ```rust,no_run
//! use seatflow_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let scrape = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use seatflow_core::{Channel, GatewayKind};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address the scrape endpoint is served on (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Scrape address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a
    /// warning and leaves [`Self::handle`] empty.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Bookings
    describe_counter!(
        "seatflow_bookings_total",
        "Booking attempts by outcome (confirmed, conflict, payment_failed, rejected, aborted)"
    );
    describe_counter!(
        "seatflow_booking_transitions_total",
        "Booking status transitions by target status"
    );

    // Payments
    describe_counter!(
        "seatflow_payment_attempts_total",
        "Processor attempts by gateway and result"
    );
    describe_counter!(
        "seatflow_payment_failovers_total",
        "Failovers to the alternate processor"
    );
    describe_histogram!(
        "seatflow_payment_attempt_duration_seconds",
        "Time taken by one processor attempt"
    );
    describe_counter!("seatflow_refunds_total", "Refunds by gateway and result");

    // Credits
    describe_counter!(
        "seatflow_credit_debits_total",
        "Credit debits by channel and result"
    );
    describe_counter!(
        "seatflow_low_balance_alerts_total",
        "Low-balance alerts raised by channel"
    );

    // Webhooks
    describe_counter!("seatflow_webhooks_total", "Processor webhooks by result");

    // Security
    describe_counter!(
        "seatflow_tenant_isolation_violations_total",
        "Accesses to a resource owned by another tenant"
    );
}

/// Booking metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record the terminal outcome of one booking attempt.
    pub fn record_outcome(outcome: &'static str) {
        counter!("seatflow_bookings_total", "outcome" => outcome).increment(1);
    }

    /// Record a status transition.
    pub fn record_transition(to: seatflow_core::BookingStatus) {
        counter!("seatflow_booking_transitions_total", "to" => to.as_str()).increment(1);
    }
}

/// Payment metrics recorder.
pub struct PaymentMetrics;

impl PaymentMetrics {
    /// Record one processor attempt.
    pub fn record_attempt(gateway: GatewayKind, result: &'static str, duration: Duration) {
        counter!(
            "seatflow_payment_attempts_total",
            "gateway" => gateway.as_str(),
            "result" => result
        )
        .increment(1);
        histogram!(
            "seatflow_payment_attempt_duration_seconds",
            "gateway" => gateway.as_str()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a failover.
    pub fn record_failover(from: GatewayKind) {
        counter!("seatflow_payment_failovers_total", "from" => from.as_str()).increment(1);
    }

    /// Record a refund call.
    pub fn record_refund(gateway: GatewayKind, result: &'static str) {
        counter!(
            "seatflow_refunds_total",
            "gateway" => gateway.as_str(),
            "result" => result
        )
        .increment(1);
    }
}

/// Credit ledger metrics recorder.
pub struct CreditMetrics;

impl CreditMetrics {
    /// Record a debit attempt.
    pub fn record_debit(channel: Channel, result: &'static str) {
        counter!(
            "seatflow_credit_debits_total",
            "channel" => channel.as_str(),
            "result" => result
        )
        .increment(1);
    }

    /// Record a low-balance alert.
    pub fn record_low_balance(channel: Channel) {
        counter!("seatflow_low_balance_alerts_total", "channel" => channel.as_str()).increment(1);
    }
}

/// Webhook metrics recorder.
pub struct WebhookMetrics;

impl WebhookMetrics {
    /// Record a processed (or rejected) webhook.
    pub fn record(gateway: GatewayKind, result: &'static str) {
        counter!(
            "seatflow_webhooks_total",
            "gateway" => gateway.as_str(),
            "result" => result
        )
        .increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_metrics_server_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        BookingMetrics::record_outcome("confirmed");
        PaymentMetrics::record_attempt(GatewayKind::GatewayA, "success", Duration::from_millis(40));
        CreditMetrics::record_debit(Channel::Sms, "ok");

        // Another test may have installed the recorder first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("seatflow_bookings_total"));
            assert!(rendered.contains("seatflow_payment_attempts_total"));
            assert!(rendered.contains("seatflow_credit_debits_total"));
        }
    }
}
