//! Prepaid messaging credits.
//!
//! [`CreditLedger::reserve_and_debit`] is a single atomic check-and-deduct
//! delegated to [`WalletStore::debit`](seatflow_core::WalletStore::debit);
//! the ledger adds pricing, logging and the advisory low-balance alert.

use crate::metrics::CreditMetrics;
use seatflow_core::{
    AlertSink, BookingError, BookingResult, Channel, Clock, CreditBalances, CreditRates,
    CreditWallet, DebitOutcome, LedgerEntry, LowBalanceAlert, Money, TenantContext,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Successful debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitReceipt {
    /// Balance left on the channel
    pub remaining: u64,
    /// Money value of the credits consumed
    pub cost: Money,
}

/// Per-tenant, per-channel prepaid balances.
pub struct CreditLedger {
    rates: CreditRates,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
}

impl CreditLedger {
    /// Create a ledger.
    #[must_use]
    pub fn new(rates: CreditRates, alerts: Arc<dyn AlertSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rates,
            alerts,
            clock,
        }
    }

    /// Channel prices in force.
    #[must_use]
    pub const fn rates(&self) -> &CreditRates {
        &self.rates
    }

    /// Atomically take `units` credits from the tenant's `channel` wallet.
    ///
    /// On success `total_spent` grows by `units × rate` and a usage ledger row
    /// is written. If the remaining balance is at or below the tenant's
    /// threshold and alerts are enabled, a [`LowBalanceAlert`] is handed to
    /// the sink; that never affects the debit.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] if `units` is zero
    /// - [`BookingError::InsufficientCredits`] if the balance is lower than
    ///   `units`; the wallet is untouched
    pub async fn reserve_and_debit(
        &self,
        ctx: &TenantContext,
        channel: Channel,
        units: u64,
    ) -> BookingResult<DebitReceipt> {
        if units == 0 {
            return Err(BookingError::validation("units must be positive"));
        }

        let tenant = ctx.tenant();
        let cost = self.rates.rate(channel).saturating_mul(units);
        let now = self.clock.now();

        match ctx.store().debit(tenant.id, channel, units, cost, now).await? {
            DebitOutcome::Debited { remaining } => {
                CreditMetrics::record_debit(channel, "ok");
                tracing::debug!(
                    tenant_id = %tenant.id,
                    channel = %channel,
                    units,
                    cost = %cost,
                    remaining,
                    "Credits debited"
                );

                if tenant.alerts_enabled && remaining <= tenant.low_balance_threshold {
                    CreditMetrics::record_low_balance(channel);
                    self.alerts.low_balance(LowBalanceAlert {
                        tenant_id: tenant.id,
                        channel,
                        remaining,
                        threshold: tenant.low_balance_threshold,
                        at: now,
                    });
                }

                Ok(DebitReceipt { remaining, cost })
            }
            DebitOutcome::Insufficient { available } => {
                CreditMetrics::record_debit(channel, "insufficient");
                tracing::debug!(
                    tenant_id = %tenant.id,
                    channel = %channel,
                    requested = units,
                    available,
                    "Insufficient credits"
                );
                Err(BookingError::InsufficientCredits {
                    channel,
                    requested: units,
                    available,
                })
            }
        }
    }

    /// Add purchased credits. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if `units` is zero.
    pub async fn top_up(
        &self,
        ctx: &TenantContext,
        channel: Channel,
        units: u64,
    ) -> BookingResult<u64> {
        if units == 0 {
            return Err(BookingError::validation("units must be positive"));
        }
        let balance = ctx
            .store()
            .credit(ctx.tenant_id(), channel, units, self.clock.now())
            .await?;
        tracing::info!(
            tenant_id = %ctx.tenant_id(),
            channel = %channel,
            units,
            balance,
            "Credits purchased"
        );
        Ok(balance)
    }

    /// The tenant's wallet on one channel, if it has ever been funded.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::TenantIsolationViolation`] if the store hands
    /// back another tenant's wallet.
    pub async fn wallet(
        &self,
        ctx: &TenantContext,
        channel: Channel,
    ) -> BookingResult<Option<CreditWallet>> {
        let wallet = ctx.store().find_wallet(ctx.tenant_id(), channel).await?;
        if let Some(wallet) = &wallet {
            ctx.ensure_owns(wallet)?;
        }
        Ok(wallet)
    }

    /// Balances across all channels; unfunded channels read as zero.
    ///
    /// # Errors
    ///
    /// Propagates store and isolation errors.
    pub async fn balances(&self, ctx: &TenantContext) -> BookingResult<CreditBalances> {
        let mut balances = CreditBalances::default();
        for channel in Channel::ALL {
            if let Some(wallet) = self.wallet(ctx, channel).await? {
                balances.set(channel, wallet.balance);
            }
        }
        Ok(balances)
    }

    /// Ledger rows of one wallet, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn ledger(
        &self,
        ctx: &TenantContext,
        channel: Channel,
    ) -> BookingResult<Vec<LedgerEntry>> {
        ctx.store().ledger_entries(ctx.tenant_id(), channel).await
    }
}

impl std::fmt::Debug for CreditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditLedger")
            .field("rates", &self.rates)
            .finish_non_exhaustive()
    }
}

/// Alert sink backed by a bounded queue.
///
/// A full or closed queue drops the alert with a log line; the debit that
/// raised it has already succeeded.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    sender: mpsc::Sender<LowBalanceAlert>,
}

impl ChannelAlertSink {
    /// Create a sink and the receiving end for the notification collaborator.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LowBalanceAlert>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl AlertSink for ChannelAlertSink {
    fn low_balance(&self, alert: LowBalanceAlert) {
        match self.sender.try_send(alert) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(alert)) => {
                tracing::warn!(
                    tenant_id = %alert.tenant_id,
                    channel = %alert.channel,
                    remaining = alert.remaining,
                    "Alert queue full, dropping low-balance alert"
                );
            }
            Err(mpsc::error::TrySendError::Closed(alert)) => {
                tracing::debug!(
                    tenant_id = %alert.tenant_id,
                    channel = %alert.channel,
                    "Alert consumer gone, dropping low-balance alert"
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use seatflow_core::TenantId;

    fn alert(remaining: u64) -> LowBalanceAlert {
        LowBalanceAlert {
            tenant_id: TenantId::new(),
            channel: Channel::Sms,
            remaining,
            threshold: 10,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, mut receiver) = ChannelAlertSink::new(1);
        sink.low_balance(alert(3));
        sink.low_balance(alert(2));

        assert_eq!(receiver.try_recv().unwrap().remaining, 3);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (sink, receiver) = ChannelAlertSink::new(4);
        drop(receiver);
        sink.low_balance(alert(1));
    }
}
