//! Application state shared across all HTTP handlers.

use seatflow_core::{BookingResult, DataStore, TenantContext, TenantId};
use seatflow_runtime::{BookingOrchestrator, CreditLedger, WebhookProcessor};
use std::sync::Arc;

/// Handles to the engine. Cloned per request; every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Data connection tenants are resolved against
    pub store: Arc<dyn DataStore>,
    /// Booking lifecycle
    pub orchestrator: Arc<BookingOrchestrator>,
    /// Messaging credits
    pub ledger: Arc<CreditLedger>,
    /// Processor callbacks
    pub webhooks: Arc<WebhookProcessor>,
}

impl AppState {
    /// Bundle the engine handles.
    #[must_use]
    pub fn new(
        store: Arc<dyn DataStore>,
        orchestrator: Arc<BookingOrchestrator>,
        ledger: Arc<CreditLedger>,
        webhooks: Arc<WebhookProcessor>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            ledger,
            webhooks,
        }
    }

    /// Load the tenant context for `tenant_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown tenant, `Store` on infrastructure failure.
    pub async fn resolve_tenant(&self, tenant_id: TenantId) -> BookingResult<TenantContext> {
        TenantContext::resolve(tenant_id, Arc::clone(&self.store)).await
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}
