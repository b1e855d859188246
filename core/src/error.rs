//! Error taxonomy of the booking engine.
//!
//! Expected business outcomes (validation, conflict, insufficient credits) are
//! ordinary variants callers must match on. Infrastructure failures surface as
//! [`BookingError::Store`].

use crate::types::{BookingId, BookingStatus, Channel, SeatId, TenantId};
use thiserror::Error;

/// Errors produced by booking, payment and credit operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed input (bad time range, unknown or inactive seat)
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong
        message: String,
    },

    /// The seat is already held for an overlapping window
    #[error("Seat {seat_id} is already booked for an overlapping window")]
    Conflict {
        /// Contended seat
        seat_id: SeatId,
    },

    /// The requested status change is not in the transition table
    #[error("Invalid state transition for booking {booking_id}: {from} -> {to}")]
    InvalidStateTransition {
        /// Booking
        booking_id: BookingId,
        /// Current status
        from: BookingStatus,
        /// Requested status
        to: BookingStatus,
    },

    /// Payment could not be completed; the booking has been cancelled
    #[error("Payment failed for booking {booking_id} after {attempts} attempt(s): {reason}")]
    Gateway {
        /// Booking
        booking_id: BookingId,
        /// Processor attempts made
        attempts: u32,
        /// Last failure
        reason: String,
    },

    /// Wallet balance too low; wallet untouched
    #[error("Insufficient {channel} credits: requested {requested}, available {available}")]
    InsufficientCredits {
        /// Channel
        channel: Channel,
        /// Units requested
        requested: u64,
        /// Units available
        available: u64,
    },

    /// Resource belongs to a different tenant than the resolved context
    #[error("Tenant isolation violation: {resource} belongs to tenant {owner}, context tenant is {context}")]
    TenantIsolationViolation {
        /// Resource description
        resource: String,
        /// Owning tenant
        owner: TenantId,
        /// Tenant of the calling context
        context: TenantId,
    },

    /// Entity does not exist
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Identifier looked up
        id: String,
    },

    /// Persistence or other infrastructure failure
    #[error("Store error: {0}")]
    Store(String),
}

impl BookingError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::Gateway { .. } => "PAYMENT_FAILED",
            Self::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            Self::TenantIsolationViolation { .. } => "TENANT_ISOLATION_VIOLATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Expected traffic that is handled without alerting.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Conflict { .. }
                | Self::InsufficientCredits { .. }
                | Self::NotFound { .. }
        )
    }
}

/// Result alias used across the engine.
pub type BookingResult<T> = Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_http_contract() {
        assert_eq!(BookingError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(
            BookingError::Conflict {
                seat_id: SeatId::new()
            }
            .code(),
            "CONFLICT"
        );
        assert_eq!(
            BookingError::Gateway {
                booking_id: BookingId::new(),
                attempts: 2,
                reason: "timeout".to_string()
            }
            .code(),
            "PAYMENT_FAILED"
        );
    }

    #[test]
    fn test_isolation_violation_is_never_expected() {
        let err = BookingError::TenantIsolationViolation {
            resource: "seat".to_string(),
            owner: TenantId::new(),
            context: TenantId::new(),
        };
        assert!(!err.is_expected());
        assert!(BookingError::validation("bad").is_expected());
    }
}
