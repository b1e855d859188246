//! Advisory notifications emitted by the credit ledger.

use crate::types::{Channel, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A wallet dropped to or below its tenant's threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowBalanceAlert {
    /// Tenant
    pub tenant_id: TenantId,
    /// Channel
    pub channel: Channel,
    /// Balance after the debit that triggered the alert
    pub remaining: u64,
    /// Tenant's configured threshold
    pub threshold: u64,
    /// When the debit happened
    pub at: DateTime<Utc>,
}

/// Consumer of low-balance alerts (the external notification collaborator).
///
/// Delivery is fire-and-forget: implementations must not block and must not
/// fail the debit that raised the alert.
pub trait AlertSink: Send + Sync {
    /// Hand over one alert.
    fn low_balance(&self, alert: LowBalanceAlert);
}
