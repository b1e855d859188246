//! Booking confirmation messages, paid for with prepaid credits.
//!
//! A message is only queued after its credit has been debited, and the credit
//! is only debited once an outbox slot is held. Running out of credit or of
//! outbox room skips the message; it never fails the booking.

use crate::credits::CreditLedger;
use seatflow_core::{Booking, BookingError, BookingId, Channel, TenantContext, TenantId, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Message handed to the external delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Paying tenant
    pub tenant_id: TenantId,
    /// Delivery channel
    pub channel: Channel,
    /// Booking the message is about
    pub booking_id: BookingId,
    /// Recipient
    pub user_id: UserId,
    /// Message text
    pub body: String,
}

/// What happened to a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Credit debited and message queued
    Queued {
        /// Credits left on the channel
        remaining: u64,
    },
    /// Not sent
    Skipped {
        /// Why
        reason: String,
    },
}

/// Sends booking confirmations on the tenant's notification channel.
pub struct BookingNotifier {
    ledger: Arc<CreditLedger>,
    outbox: mpsc::Sender<OutboundMessage>,
}

impl BookingNotifier {
    /// Create a notifier and the receiving end of its outbox.
    #[must_use]
    pub fn new(
        ledger: Arc<CreditLedger>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (outbox, receiver) = mpsc::channel(capacity.max(1));
        (Self { ledger, outbox }, receiver)
    }

    /// Debit one credit and queue a confirmation for `booking`.
    pub async fn send_confirmation(
        &self,
        ctx: &TenantContext,
        booking: &Booking,
    ) -> NotificationOutcome {
        let channel = ctx.tenant().notification_channel;

        let permit = match self.outbox.try_reserve() {
            Ok(permit) => permit,
            Err(error) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    channel = %channel,
                    error = %error,
                    "Outbox unavailable, confirmation skipped"
                );
                return NotificationOutcome::Skipped {
                    reason: "outbox unavailable".to_string(),
                };
            }
        };

        let remaining = match self.ledger.reserve_and_debit(ctx, channel, 1).await {
            Ok(receipt) => receipt.remaining,
            Err(error @ BookingError::InsufficientCredits { .. }) => {
                tracing::warn!(
                    tenant_id = %ctx.tenant_id(),
                    booking_id = %booking.id,
                    channel = %channel,
                    "Skipping booking confirmation: {error}"
                );
                return NotificationOutcome::Skipped {
                    reason: error.to_string(),
                };
            }
            Err(error) => {
                tracing::warn!(
                    tenant_id = %ctx.tenant_id(),
                    booking_id = %booking.id,
                    error = %error,
                    "Skipping booking confirmation"
                );
                return NotificationOutcome::Skipped {
                    reason: error.to_string(),
                };
            }
        };

        let message = OutboundMessage {
            tenant_id: ctx.tenant_id(),
            channel,
            booking_id: booking.id,
            user_id: booking.user_id,
            body: format!(
                "Your seat is booked from {} to {}. Booking reference {}.",
                booking.start_time.format("%Y-%m-%d %H:%M UTC"),
                booking.end_time.format("%H:%M UTC"),
                booking.id
            ),
        };

        permit.send(message);
        NotificationOutcome::Queued { remaining }
    }
}

impl std::fmt::Debug for BookingNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingNotifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credits::ChannelAlertSink;
    use crate::memory::InMemoryStore;
    use chrono::{TimeZone, Utc};
    use seatflow_core::{
        BasisPoints, BookingStatus, CreditRates, Money, SeatId, SystemClock, Tenant,
    };

    fn tenant() -> Tenant {
        Tenant {
            id: TenantId::new(),
            commission_rate: BasisPoints::new(500),
            low_balance_threshold: 0,
            alerts_enabled: false,
            notification_channel: Channel::Sms,
        }
    }

    fn booking(tenant_id: TenantId) -> Booking {
        Booking {
            id: BookingId::new(),
            tenant_id,
            seat_id: SeatId::new(),
            user_id: UserId::new(),
            start_time: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            status: BookingStatus::Confirmed,
            payment_id: None,
            amount: Money::from_minor(1_000),
        }
    }

    #[tokio::test]
    async fn test_full_outbox_skips_without_charging() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = tenant();
        store.add_tenant(tenant.clone());
        store.set_balance(tenant.id, Channel::Sms, 5);
        let ctx = TenantContext::new(tenant.clone(), store.clone());

        let (alerts, _alert_rx) = ChannelAlertSink::new(4);
        let ledger = Arc::new(CreditLedger::new(
            CreditRates::default(),
            Arc::new(alerts),
            Arc::new(SystemClock),
        ));
        let (notifier, _outbox) = BookingNotifier::new(ledger.clone(), 1);

        let first = notifier.send_confirmation(&ctx, &booking(tenant.id)).await;
        assert_eq!(first, NotificationOutcome::Queued { remaining: 4 });

        let second = notifier.send_confirmation(&ctx, &booking(tenant.id)).await;
        assert!(matches!(second, NotificationOutcome::Skipped { .. }));

        let wallet = ledger.wallet(&ctx, Channel::Sms).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 4);
    }

    #[tokio::test]
    async fn test_closed_outbox_skips_without_charging() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = tenant();
        store.add_tenant(tenant.clone());
        store.set_balance(tenant.id, Channel::Sms, 5);
        let ctx = TenantContext::new(tenant.clone(), store.clone());

        let (alerts, _alert_rx) = ChannelAlertSink::new(4);
        let ledger = Arc::new(CreditLedger::new(
            CreditRates::default(),
            Arc::new(alerts),
            Arc::new(SystemClock),
        ));
        let (notifier, outbox) = BookingNotifier::new(ledger.clone(), 4);
        drop(outbox);

        let outcome = notifier.send_confirmation(&ctx, &booking(tenant.id)).await;
        assert!(matches!(outcome, NotificationOutcome::Skipped { .. }));

        let wallet = ledger.wallet(&ctx, Channel::Sms).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 5);
    }
}
