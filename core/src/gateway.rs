//! Payment processor contract and fee-based selection.
//!
//! Both processors implement [`PaymentGateway`]; which one is used is decided
//! here, by [`select_gateway`], and never by a processor implementation.
//! Selection is a pure function of the amount and the fee schedules.

use crate::types::{BookingId, GatewayKind, Money, PaymentStatus, TenantId};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Published fee schedule of one processor: `amount × rate + fixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Percentage component
    pub rate: crate::types::BasisPoints,
    /// Flat component per transaction
    pub fixed: Money,
}

impl FeeSchedule {
    /// Fee in ten-thousandths of a minor unit, so comparisons are exact.
    #[must_use]
    pub fn scaled_cost(&self, amount: Money) -> u128 {
        u128::from(amount.minor()) * u128::from(self.rate.value())
            + u128::from(self.fixed.minor()) * 10_000
    }

    /// Fee rounded up to a whole minor unit.
    #[must_use]
    pub fn cost(&self, amount: Money) -> Money {
        let minor = self.scaled_cost(amount).div_ceil(10_000);
        Money::from_minor(u64::try_from(minor).unwrap_or(u64::MAX))
    }
}

/// Fee schedules of both processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedules {
    /// `gatewayA` fees
    pub gateway_a: FeeSchedule,
    /// `gatewayB` fees
    pub gateway_b: FeeSchedule,
}

impl FeeSchedules {
    /// Schedule for one processor.
    #[must_use]
    pub const fn get(&self, kind: GatewayKind) -> FeeSchedule {
        match kind {
            GatewayKind::GatewayA => self.gateway_a,
            GatewayKind::GatewayB => self.gateway_b,
        }
    }
}

impl Default for FeeSchedules {
    /// `gatewayA`: 2%; `gatewayB`: 1.5% + 3.00. Break-even at 600.00.
    fn default() -> Self {
        Self {
            gateway_a: FeeSchedule {
                rate: crate::types::BasisPoints::new(200),
                fixed: Money::ZERO,
            },
            gateway_b: FeeSchedule {
                rate: crate::types::BasisPoints::new(150),
                fixed: Money::from_minor(300),
            },
        }
    }
}

/// Why a processor was used for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RouteReason {
    /// Strictly cheaper than the alternate
    CheapestFee {
        /// Fee on the chosen processor
        chosen_cost: Money,
        /// Fee on the other processor
        alternate_cost: Money,
    },
    /// Both cost the same; configured tie-break applied
    TieBreak {
        /// Fee on either processor
        cost: Money,
    },
    /// Caller asked for this processor
    Preferred,
    /// The other processor failed at processor level
    Failover {
        /// Processor that failed
        from: GatewayKind,
    },
}

/// Explainable routing decision for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Processor used
    pub gateway: GatewayKind,
    /// Why
    #[serde(flatten)]
    pub reason: RouteReason,
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            RouteReason::CheapestFee {
                chosen_cost,
                alternate_cost,
            } => write!(
                f,
                "{} (fee {chosen_cost} < {alternate_cost})",
                self.gateway
            ),
            RouteReason::TieBreak { cost } => write!(f, "{} (tie at fee {cost})", self.gateway),
            RouteReason::Preferred => write!(f, "{} (caller preference)", self.gateway),
            RouteReason::Failover { from } => write!(f, "{} (failover from {from})", self.gateway),
        }
    }
}

/// Pick the cheaper processor for `amount`; ties go to `tie_break`.
#[must_use]
pub fn select_gateway(
    amount: Money,
    fees: &FeeSchedules,
    tie_break: GatewayKind,
) -> RoutingDecision {
    let cost_a = fees.gateway_a.scaled_cost(amount);
    let cost_b = fees.gateway_b.scaled_cost(amount);

    let (gateway, reason) = match cost_a.cmp(&cost_b) {
        std::cmp::Ordering::Less => (
            GatewayKind::GatewayA,
            RouteReason::CheapestFee {
                chosen_cost: fees.gateway_a.cost(amount),
                alternate_cost: fees.gateway_b.cost(amount),
            },
        ),
        std::cmp::Ordering::Greater => (
            GatewayKind::GatewayB,
            RouteReason::CheapestFee {
                chosen_cost: fees.gateway_b.cost(amount),
                alternate_cost: fees.gateway_a.cost(amount),
            },
        ),
        std::cmp::Ordering::Equal => (
            tie_break,
            RouteReason::TieBreak {
                cost: fees.get(tie_break).cost(amount),
            },
        ),
    };

    RoutingDecision { gateway, reason }
}

/// One charge request sent to a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    /// Tenant collecting the money
    pub tenant_id: TenantId,
    /// Booking being paid for
    pub booking_id: BookingId,
    /// Amount to charge
    pub amount: Money,
    /// Stable per-attempt key; processors deduplicate on it
    pub idempotency_key: String,
}

/// Processor confirmation of a captured charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    /// Processor-side order reference
    pub gateway_order_id: String,
}

/// Processor call failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Business decline (card refused, fraud check); never failed over
    #[error("Payment declined: {reason}")]
    Declined {
        /// Decline reason
        reason: String,
        /// Processor reference, if one was created
        gateway_order_id: Option<String>,
    },
    /// Processor unreachable or returned a server error
    #[error("Gateway unavailable: {message}")]
    Unavailable {
        /// Error message
        message: String,
    },
    /// Call exceeded its time bound
    #[error("Gateway timeout")]
    Timeout,
    /// Processor answered with something unparseable
    #[error("Invalid gateway response: {message}")]
    InvalidResponse {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Processor-level failures trigger the single failover; declines do not.
    #[must_use]
    pub const fn is_processor_failure(&self) -> bool {
        !matches!(self, Self::Declined { .. })
    }
}

/// Asynchronous status notification pushed by a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// Processor-side order reference
    pub gateway_order_id: String,
    /// Reported status
    pub status: PaymentStatus,
    /// Signature over the payload, keyed by the processor's signing secret
    pub signature: String,
}

/// Contract shared by both payment processors.
pub trait PaymentGateway: Send + Sync {
    /// Which processor this is.
    fn kind(&self) -> GatewayKind;

    /// Charge `request.amount`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Declined`] for a business decline and any other
    /// variant for a processor-level failure.
    fn pay(&self, request: PaymentRequest) -> BoxFuture<'_, Result<ChargeReceipt, GatewayError>>;

    /// Whether `event` carries a valid signature from this processor.
    fn verify_webhook(&self, event: &WebhookEvent) -> bool;

    /// Refund `amount` of a captured order. Returns the processor refund reference.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if the refund is refused or the call fails.
    fn refund(
        &self,
        gateway_order_id: String,
        amount: Money,
    ) -> BoxFuture<'_, Result<String, GatewayError>>;
}
