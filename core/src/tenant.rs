//! Tenant context resolution and isolation checks.
//!
//! A [`TenantContext`] is resolved once per request and handed to every
//! component; nothing reads tenant state from a global.

use crate::error::{BookingError, BookingResult};
use crate::store::DataStore;
use crate::types::{Booking, CreditWallet, PaymentTransaction, Seat, Tenant, TenantId};
use std::fmt;
use std::sync::Arc;

/// A resource owned by exactly one tenant.
pub trait Owned {
    /// Owning tenant.
    fn owner(&self) -> TenantId;

    /// Short description for logs (`"booking 0f3c…"`).
    fn describe(&self) -> String;
}

impl Owned for Seat {
    fn owner(&self) -> TenantId {
        self.tenant_id
    }

    fn describe(&self) -> String {
        format!("seat {}", self.id)
    }
}

impl Owned for Booking {
    fn owner(&self) -> TenantId {
        self.tenant_id
    }

    fn describe(&self) -> String {
        format!("booking {}", self.id)
    }
}

impl Owned for PaymentTransaction {
    fn owner(&self) -> TenantId {
        self.tenant_id
    }

    fn describe(&self) -> String {
        format!("payment transaction {}", self.id)
    }
}

impl Owned for CreditWallet {
    fn owner(&self) -> TenantId {
        self.tenant_id
    }

    fn describe(&self) -> String {
        format!("{} wallet", self.channel)
    }
}

/// Resolved calling tenant plus its data connection.
#[derive(Clone)]
pub struct TenantContext {
    tenant: Tenant,
    store: Arc<dyn DataStore>,
}

impl TenantContext {
    /// Wrap an already-loaded tenant.
    #[must_use]
    pub fn new(tenant: Tenant, store: Arc<dyn DataStore>) -> Self {
        Self { tenant, store }
    }

    /// Load the tenant identified by `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown tenant or
    /// [`BookingError::Store`] on infrastructure failure.
    pub async fn resolve(tenant_id: TenantId, store: Arc<dyn DataStore>) -> BookingResult<Self> {
        let tenant = store
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Tenant", tenant_id))?;
        Ok(Self::new(tenant, store))
    }

    /// Calling tenant's ID.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant.id
    }

    /// Calling tenant.
    #[must_use]
    pub const fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Tenant-scoped data connection.
    #[must_use]
    pub fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    /// Shared handle to the data connection.
    #[must_use]
    pub fn store_handle(&self) -> Arc<dyn DataStore> {
        Arc::clone(&self.store)
    }

    /// Reject access to a resource owned by another tenant.
    ///
    /// Violations are security events: always logged at error level on the
    /// `security` target and counted, never corrected.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::TenantIsolationViolation`] on mismatch.
    pub fn ensure_owns<R: Owned>(&self, resource: &R) -> BookingResult<()> {
        let owner = resource.owner();
        if owner == self.tenant.id {
            return Ok(());
        }

        let description = resource.describe();
        tracing::error!(
            target: "security",
            resource = %description,
            owner = %owner,
            context_tenant = %self.tenant.id,
            "Tenant isolation violation"
        );
        metrics::counter!("seatflow_tenant_isolation_violations_total").increment(1);

        Err(BookingError::TenantIsolationViolation {
            resource: description,
            owner,
            context: self.tenant.id,
        })
    }
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}
