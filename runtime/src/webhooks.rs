//! Processor webhook reconciliation.
//!
//! Nothing is read or written before the signature checks out. Verified
//! events are applied idempotently against the stored attempt:
//!
//! | stored      | reported | effect                                        |
//! |-------------|----------|-----------------------------------------------|
//! | same        | same     | nothing                                       |
//! | `initiated` | `failed` | attempt marked failed                         |
//! | `initiated` / `failed` | `success` | attempt marked success, booking settled |
//! | `success`   | anything | ignored as stale; captures are never undone   |
//!
//! Each write is conditional on the status it was read with, so of two
//! concurrent deliveries only one is applied and the other is a duplicate.
//!
//! Settling a late success confirms a still-`pending` booking. If the
//! booking is already cancelled, or was paid by another attempt, the money is
//! refunded in full.

use crate::metrics::WebhookMetrics;
use crate::router::PaymentGatewayRouter;
use seatflow_core::{
    BookingError, BookingId, BookingStateMachine, BookingStatus, DataStore, GatewayKind,
    PaymentStatus, TenantContext, WebhookEvent,
};
use std::sync::Arc;
use thiserror::Error;

/// Webhook rejection.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature did not verify; nothing was touched
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Applying the event failed
    #[error(transparent)]
    Booking(#[from] BookingError),
}

/// What a verified webhook did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Attempt updated; booking now in `booking_status`
    Applied {
        /// Booking
        booking_id: BookingId,
        /// Booking status after the event
        booking_status: BookingStatus,
    },
    /// Event matched stored state
    Duplicate,
    /// Event contradicts a final stored state and was ignored
    Stale {
        /// Stored attempt status
        stored: PaymentStatus,
    },
    /// Late capture returned to the payer
    Refunded {
        /// Booking
        booking_id: BookingId,
        /// Processor refund reference, if the refund went through
        reference: Option<String>,
    },
    /// No attempt carries this order reference
    UnknownOrder,
}

impl WebhookOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Duplicate => "duplicate",
            Self::Stale { .. } => "stale",
            Self::Refunded { .. } => "refunded",
            Self::UnknownOrder => "unknown_order",
        }
    }
}

/// Verifies and applies processor webhooks.
pub struct WebhookProcessor {
    store: Arc<dyn DataStore>,
    router: Arc<PaymentGatewayRouter>,
    machine: BookingStateMachine,
}

impl WebhookProcessor {
    /// Create a processor.
    #[must_use]
    pub fn new(
        store: Arc<dyn DataStore>,
        router: Arc<PaymentGatewayRouter>,
        machine: BookingStateMachine,
    ) -> Self {
        Self {
            store,
            router,
            machine,
        }
    }

    /// Verify and apply one event from `gateway`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidSignature`] if the signature does not
    /// verify against that processor's secret, or the store/isolation error
    /// that stopped the event from being applied.
    pub async fn process(
        &self,
        gateway: GatewayKind,
        event: WebhookEvent,
    ) -> Result<WebhookOutcome, WebhookError> {
        if !self.router.gateway(gateway).verify_webhook(&event) {
            WebhookMetrics::record(gateway, "invalid_signature");
            tracing::warn!(
                gateway = %gateway,
                gateway_order_id = %event.gateway_order_id,
                "Dropping webhook with invalid signature"
            );
            return Err(WebhookError::InvalidSignature);
        }

        let outcome = self.apply(gateway, event).await?;
        WebhookMetrics::record(gateway, outcome.label());
        Ok(outcome)
    }

    async fn apply(
        &self,
        gateway: GatewayKind,
        event: WebhookEvent,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(mut transaction) = self
            .store
            .find_by_gateway_order(gateway, event.gateway_order_id.clone())
            .await?
        else {
            tracing::warn!(
                gateway = %gateway,
                gateway_order_id = %event.gateway_order_id,
                "Webhook for unknown order"
            );
            return Ok(WebhookOutcome::UnknownOrder);
        };

        if transaction.status == event.status {
            return Ok(WebhookOutcome::Duplicate);
        }

        let upgrade = matches!(
            (transaction.status, event.status),
            (PaymentStatus::Initiated, PaymentStatus::Failed)
                | (PaymentStatus::Initiated | PaymentStatus::Failed, PaymentStatus::Success)
        );
        if !upgrade {
            tracing::warn!(
                gateway = %gateway,
                payment_id = %transaction.id,
                stored = %transaction.status,
                reported = %event.status,
                "Ignoring stale webhook"
            );
            return Ok(WebhookOutcome::Stale {
                stored: transaction.status,
            });
        }

        let ctx = TenantContext::resolve(transaction.tenant_id, Arc::clone(&self.store)).await?;
        let booking = ctx
            .store()
            .find_booking(transaction.booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking", transaction.booking_id))?;
        ctx.ensure_owns(&booking)?;

        let previous = transaction.status;
        transaction.status = event.status;
        if !ctx
            .store()
            .update_transaction_if(transaction.clone(), previous)
            .await?
        {
            tracing::debug!(
                gateway = %gateway,
                payment_id = %transaction.id,
                "Attempt changed while applying webhook, treating as duplicate"
            );
            return Ok(WebhookOutcome::Duplicate);
        }
        tracing::info!(
            gateway = %gateway,
            booking_id = %booking.id,
            payment_id = %transaction.id,
            status = %transaction.status,
            "Payment status updated from webhook"
        );

        if transaction.status != PaymentStatus::Success {
            return Ok(WebhookOutcome::Applied {
                booking_id: booking.id,
                booking_status: booking.status,
            });
        }

        match booking.status {
            BookingStatus::Pending => {
                let confirmed = self.machine.confirm(&booking, &transaction)?;
                if ctx
                    .store()
                    .update_booking(confirmed, BookingStatus::Pending)
                    .await?
                {
                    tracing::info!(booking_id = %booking.id, "Booking confirmed by webhook");
                    return Ok(WebhookOutcome::Applied {
                        booking_id: booking.id,
                        booking_status: BookingStatus::Confirmed,
                    });
                }
                // Lost the race to the orchestrator; it settles the booking.
                Ok(WebhookOutcome::Applied {
                    booking_id: booking.id,
                    booking_status: BookingStatus::Pending,
                })
            }
            _ if booking.payment_id == Some(transaction.id) => Ok(WebhookOutcome::Applied {
                booking_id: booking.id,
                booking_status: booking.status,
            }),
            status => {
                tracing::warn!(
                    booking_id = %booking.id,
                    payment_id = %transaction.id,
                    booking_status = %status,
                    "Late capture for a booking that is cancelled or paid otherwise, refunding"
                );
                let reference = self
                    .router
                    .refund(&transaction, transaction.amount)
                    .await
                    .inspect_err(|error| {
                        tracing::error!(
                            booking_id = %booking.id,
                            payment_id = %transaction.id,
                            error = %error,
                            "Automatic refund failed, manual follow-up required"
                        );
                    })
                    .ok();
                Ok(WebhookOutcome::Refunded {
                    booking_id: booking.id,
                    reference,
                })
            }
        }
    }
}

impl std::fmt::Debug for WebhookProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookProcessor").finish_non_exhaustive()
    }
}
