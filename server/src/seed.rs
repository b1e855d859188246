//! Startup data: tenants, seats and opening credit balances.
//!
//! ```json
//! {
//!   "tenants": [{ "id": "...", "commission_rate": 500, "low_balance_threshold": 10,
//!                 "alerts_enabled": true, "notification_channel": "email" }],
//!   "seats":   [{ "id": "...", "tenant_id": "...", "library_id": "...",
//!                 "status": "active", "hourly_rate": 5000 }],
//!   "credits": [{ "tenant_id": "...", "channel": "email", "units": 500 }]
//! }
//! ```
//!
//! Tenants and seats are upserted. Credits are only granted to wallets that
//! do not exist yet, so restarting with the same file never tops up twice.

use crate::app::Backend;
use anyhow::Context;
use seatflow_core::{Channel, Seat, Tenant, TenantContext, TenantId};
use seatflow_runtime::CreditLedger;
use serde::Deserialize;
use std::path::Path;

/// Contents of a seed file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    /// Tenants to create or update
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    /// Seats to create or update
    #[serde(default)]
    pub seats: Vec<Seat>,
    /// Opening balances
    #[serde(default)]
    pub credits: Vec<OpeningCredits>,
}

/// Opening balance of one wallet.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OpeningCredits {
    /// Wallet owner
    pub tenant_id: TenantId,
    /// Wallet channel
    pub channel: Channel,
    /// Credits granted
    pub units: u64,
}

/// What a seed run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Tenants written
    pub tenants: usize,
    /// Seats written
    pub seats: usize,
    /// Wallets funded
    pub wallets_funded: usize,
}

impl SeedData {
    /// Parse a seed document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid seed document")
    }

    /// Read and parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Write everything into `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails or a credit line names a tenant the
    /// store does not know.
    pub async fn apply(
        &self,
        backend: &Backend,
        ledger: &CreditLedger,
    ) -> anyhow::Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for tenant in &self.tenants {
            backend.put_tenant(tenant).await?;
            summary.tenants += 1;
        }
        for seat in &self.seats {
            backend.put_seat(seat).await?;
            summary.seats += 1;
        }

        for line in &self.credits {
            let ctx = TenantContext::resolve(line.tenant_id, backend.data_store())
                .await
                .with_context(|| format!("credits for unknown tenant {}", line.tenant_id))?;
            if ledger.wallet(&ctx, line.channel).await?.is_some() {
                tracing::debug!(
                    tenant_id = %line.tenant_id,
                    channel = %line.channel,
                    "Wallet already funded, skipping seed credits"
                );
                continue;
            }
            ledger.top_up(&ctx, line.channel, line.units).await?;
            summary.wallets_funded += 1;
        }

        tracing::info!(
            tenants = summary.tenants,
            seats = summary.seats,
            wallets_funded = summary.wallets_funded,
            "Seed data applied"
        );
        Ok(summary)
    }
}
