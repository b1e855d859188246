//! Payment routing with a single failover.
//!
//! The router picks a processor (caller preference, else cheapest fee, else
//! the configured tie-break), records every attempt as a
//! [`PaymentTransaction`] before calling out, bounds each call with a
//! timeout, and on a processor-level failure makes exactly one more attempt
//! on the other processor. Business declines are final.

use crate::metrics::PaymentMetrics;
use seatflow_core::{
    Booking, BookingPolicy, BookingResult, Clock, FeeSchedules, GatewayError, GatewayKind, Money,
    PaymentGateway, PaymentRequest, PaymentStatus, PaymentTransaction, PaymentTransactionId,
    RouteReason, RoutingDecision, TenantContext, idempotency_key, select_gateway,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on processor attempts per [`PaymentGatewayRouter::pay`] call.
pub const MAX_ATTEMPTS: usize = 2;

/// Result of routing one booking payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Money captured.
    Paid {
        /// The successful attempt
        transaction: PaymentTransaction,
        /// Decisions of the attempts made by this call, in order; empty when
        /// an earlier call had already captured the payment
        decisions: Vec<RoutingDecision>,
    },
    /// Every attempt failed.
    Failed {
        /// Last failure
        reason: String,
        /// Decisions of the attempts made, in order
        decisions: Vec<RoutingDecision>,
    },
}

impl PaymentOutcome {
    /// Processor attempts made by this call.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        let decisions = match self {
            Self::Paid { decisions, .. } | Self::Failed { decisions, .. } => decisions,
        };
        u32::try_from(decisions.len()).unwrap_or(u32::MAX)
    }

    /// Decision of the last attempt, if any was made.
    #[must_use]
    pub fn last_decision(&self) -> Option<RoutingDecision> {
        match self {
            Self::Paid { decisions, .. } | Self::Failed { decisions, .. } => decisions.last().copied(),
        }
    }
}

/// Chooses a processor per payment and drives the attempts.
pub struct PaymentGatewayRouter {
    gateway_a: Arc<dyn PaymentGateway>,
    gateway_b: Arc<dyn PaymentGateway>,
    fees: FeeSchedules,
    tie_break: GatewayKind,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl PaymentGatewayRouter {
    /// Create a router over both processors.
    #[must_use]
    pub fn new(
        gateway_a: Arc<dyn PaymentGateway>,
        gateway_b: Arc<dyn PaymentGateway>,
        fees: FeeSchedules,
        policy: &BookingPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway_a,
            gateway_b,
            fees,
            tie_break: policy.tie_break,
            timeout: policy.gateway_timeout,
            clock,
        }
    }

    /// Client for one processor.
    #[must_use]
    pub fn gateway(&self, kind: GatewayKind) -> &dyn PaymentGateway {
        match kind {
            GatewayKind::GatewayA => self.gateway_a.as_ref(),
            GatewayKind::GatewayB => self.gateway_b.as_ref(),
        }
    }

    /// Fee schedules in force.
    #[must_use]
    pub const fn fees(&self) -> &FeeSchedules {
        &self.fees
    }

    /// First-attempt decision for `amount`. Pure in its inputs.
    #[must_use]
    pub fn select(&self, amount: Money, preference: Option<GatewayKind>) -> RoutingDecision {
        match preference {
            Some(gateway) => RoutingDecision {
                gateway,
                reason: RouteReason::Preferred,
            },
            None => select_gateway(amount, &self.fees, self.tie_break),
        }
    }

    /// Charge `booking.amount`.
    ///
    /// A booking that already has a successful attempt is not charged again.
    /// Attempt numbers continue after any earlier attempts, so idempotency
    /// keys never repeat.
    ///
    /// # Errors
    ///
    /// Returns a store error if an attempt cannot be recorded. Processor
    /// failures are reported as [`PaymentOutcome::Failed`], not as errors.
    pub async fn pay(
        &self,
        ctx: &TenantContext,
        booking: &Booking,
        preference: Option<GatewayKind>,
    ) -> BookingResult<PaymentOutcome> {
        ctx.ensure_owns(booking)?;

        let history = ctx.store().transactions_for_booking(booking.id).await?;
        if let Some(paid) = history.iter().find(|t| t.status == PaymentStatus::Success) {
            tracing::info!(
                booking_id = %booking.id,
                payment_id = %paid.id,
                gateway = %paid.gateway,
                "Booking already paid, not charging again"
            );
            return Ok(PaymentOutcome::Paid {
                transaction: paid.clone(),
                decisions: Vec::new(),
            });
        }
        let mut attempt = history.iter().map(|t| t.attempt).max().unwrap_or(0);

        let mut decisions = Vec::with_capacity(MAX_ATTEMPTS);
        let mut decision = self.select(booking.amount, preference);

        loop {
            attempt += 1;
            decisions.push(decision);
            tracing::info!(
                booking_id = %booking.id,
                attempt,
                decision = %decision,
                "Routing payment"
            );

            let error = match self.attempt(ctx, booking, decision.gateway, attempt).await? {
                Ok(transaction) => {
                    return Ok(PaymentOutcome::Paid {
                        transaction,
                        decisions,
                    });
                }
                Err(error) => error,
            };

            if !error.is_processor_failure() || decisions.len() >= MAX_ATTEMPTS {
                tracing::warn!(
                    booking_id = %booking.id,
                    gateway = %decision.gateway,
                    attempts = decisions.len(),
                    error = %error,
                    "Payment failed"
                );
                return Ok(PaymentOutcome::Failed {
                    reason: error.to_string(),
                    decisions,
                });
            }

            let from = decision.gateway;
            PaymentMetrics::record_failover(from);
            tracing::warn!(
                booking_id = %booking.id,
                gateway = %from,
                error = %error,
                "Processor failure, failing over"
            );
            decision = RoutingDecision {
                gateway: from.alternate(),
                reason: RouteReason::Failover { from },
            };
        }
    }

    /// One recorded, time-bounded processor call.
    async fn attempt(
        &self,
        ctx: &TenantContext,
        booking: &Booking,
        gateway: GatewayKind,
        attempt: u32,
    ) -> BookingResult<Result<PaymentTransaction, GatewayError>> {
        let mut transaction = PaymentTransaction {
            id: PaymentTransactionId::new(),
            tenant_id: booking.tenant_id,
            booking_id: booking.id,
            gateway,
            gateway_order_id: None,
            status: PaymentStatus::Initiated,
            idempotency_key: idempotency_key(booking.id, attempt),
            amount: booking.amount,
            attempt,
            created_at: self.clock.now(),
        };
        ctx.store().insert_transaction(transaction.clone()).await?;

        let request = PaymentRequest {
            tenant_id: booking.tenant_id,
            booking_id: booking.id,
            amount: booking.amount,
            idempotency_key: transaction.idempotency_key.clone(),
        };

        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.gateway(gateway).pay(request))
            .await
            .unwrap_or(Err(GatewayError::Timeout));
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(receipt) => {
                transaction.status = PaymentStatus::Success;
                transaction.gateway_order_id = Some(receipt.gateway_order_id);
                PaymentMetrics::record_attempt(gateway, "success", elapsed);
                Ok(())
            }
            Err(error) => {
                transaction.status = PaymentStatus::Failed;
                if let GatewayError::Declined {
                    gateway_order_id: Some(order_id),
                    ..
                } = &error
                {
                    transaction.gateway_order_id = Some(order_id.clone());
                }
                let label = match &error {
                    GatewayError::Declined { .. } => "declined",
                    GatewayError::Timeout => "timeout",
                    GatewayError::Unavailable { .. } | GatewayError::InvalidResponse { .. } => "error",
                };
                PaymentMetrics::record_attempt(gateway, label, elapsed);
                Err(error)
            }
        };

        if !ctx
            .store()
            .update_transaction_if(transaction.clone(), PaymentStatus::Initiated)
            .await?
        {
            tracing::debug!(
                booking_id = %booking.id,
                payment_id = %transaction.id,
                "Attempt already settled by webhook"
            );
        }
        tracing::debug!(
            booking_id = %booking.id,
            payment_id = %transaction.id,
            gateway = %gateway,
            attempt,
            status = %transaction.status,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Payment attempt recorded"
        );

        Ok(outcome.map(|()| transaction))
    }

    /// Refund `amount` of a captured attempt through the processor that took it.
    ///
    /// # Errors
    ///
    /// Returns the processor's [`GatewayError`]; a timeout counts as failure.
    pub async fn refund(
        &self,
        transaction: &PaymentTransaction,
        amount: Money,
    ) -> Result<String, GatewayError> {
        let Some(order_id) = transaction.gateway_order_id.clone() else {
            return Err(GatewayError::InvalidResponse {
                message: format!("payment {} has no processor order reference", transaction.id),
            });
        };

        let result = tokio::time::timeout(
            self.timeout,
            self.gateway(transaction.gateway).refund(order_id, amount),
        )
        .await
        .unwrap_or(Err(GatewayError::Timeout));

        match &result {
            Ok(reference) => {
                PaymentMetrics::record_refund(transaction.gateway, "success");
                tracing::info!(
                    booking_id = %transaction.booking_id,
                    gateway = %transaction.gateway,
                    amount = %amount,
                    refund = %reference,
                    "Refund issued"
                );
            }
            Err(error) => {
                PaymentMetrics::record_refund(transaction.gateway, "failed");
                tracing::warn!(
                    booking_id = %transaction.booking_id,
                    gateway = %transaction.gateway,
                    amount = %amount,
                    error = %error,
                    "Refund failed"
                );
            }
        }
        result
    }
}

impl std::fmt::Debug for PaymentGatewayRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGatewayRouter")
            .field("fees", &self.fees)
            .field("tie_break", &self.tie_break)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
