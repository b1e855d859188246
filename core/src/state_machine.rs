//! Booking lifecycle.
//!
//! ```text
//! pending     → confirmed | cancelled
//! confirmed   → checked_in | cancelled
//! checked_in  → checked_out | completed
//! checked_out → completed
//! ```
//!
//! `cancelled` and `completed` are terminal. Every operation returns an
//! updated copy; a rejected transition leaves the caller's booking as it was.

use crate::error::{BookingError, BookingResult};
use crate::types::{
    BasisPoints, Booking, BookingId, BookingStatus, Money, PaymentStatus, PaymentTransaction,
    SeatId, TenantId, TimeWindow, UserId,
};

/// Statuses reachable in one step from `from`.
#[must_use]
pub const fn allowed_transitions(from: BookingStatus) -> &'static [BookingStatus] {
    match from {
        BookingStatus::Pending => &[BookingStatus::Confirmed, BookingStatus::Cancelled],
        BookingStatus::Confirmed => &[BookingStatus::CheckedIn, BookingStatus::Cancelled],
        BookingStatus::CheckedIn => &[BookingStatus::CheckedOut, BookingStatus::Completed],
        BookingStatus::CheckedOut => &[BookingStatus::Completed],
        BookingStatus::Cancelled | BookingStatus::Completed => &[],
    }
}

/// Whether `from → to` is in the transition table.
#[must_use]
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Validates and executes booking status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingStateMachine {
    cancellation_fee: BasisPoints,
}

impl BookingStateMachine {
    /// Create a state machine retaining `cancellation_fee` on cancellation.
    #[must_use]
    pub const fn new(cancellation_fee: BasisPoints) -> Self {
        Self { cancellation_fee }
    }

    /// New booking; always starts `pending` and unpaid.
    #[must_use]
    pub fn create(
        &self,
        tenant_id: TenantId,
        seat_id: SeatId,
        user_id: UserId,
        window: TimeWindow,
        amount: Money,
    ) -> Booking {
        Booking {
            id: BookingId::new(),
            tenant_id,
            seat_id,
            user_id,
            start_time: window.start(),
            end_time: window.end(),
            status: BookingStatus::Pending,
            payment_id: None,
            amount,
        }
    }

    /// `amount − floor(amount × cancellation_fee)`.
    #[must_use]
    pub fn refund_amount(&self, amount: Money) -> Money {
        amount.saturating_sub(amount.portion(self.cancellation_fee))
    }

    /// Move `booking` to `to` if the table allows it.
    ///
    /// Confirmation has an extra precondition; use [`Self::confirm`] for it.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] if `to` is not
    /// reachable from the current status, or if `to` is `confirmed`.
    pub fn transition(&self, booking: &Booking, to: BookingStatus) -> BookingResult<Booking> {
        if to == BookingStatus::Confirmed || !can_transition(booking.status, to) {
            return Err(Self::rejected(booking, to));
        }
        let mut next = booking.clone();
        next.status = to;
        Ok(next)
    }

    /// `pending → confirmed`, only against a successful payment for this booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] if the booking is not
    /// pending or `payment` is not a `success` for this booking.
    pub fn confirm(
        &self,
        booking: &Booking,
        payment: &PaymentTransaction,
    ) -> BookingResult<Booking> {
        let paid = payment.status == PaymentStatus::Success
            && payment.booking_id == booking.id
            && payment.tenant_id == booking.tenant_id;

        if !paid || !can_transition(booking.status, BookingStatus::Confirmed) {
            if !paid {
                tracing::warn!(
                    booking_id = %booking.id,
                    payment_id = %payment.id,
                    payment_status = %payment.status,
                    "Refusing to confirm booking without a matching successful payment"
                );
            }
            return Err(Self::rejected(booking, BookingStatus::Confirmed));
        }

        let mut next = booking.clone();
        next.status = BookingStatus::Confirmed;
        next.payment_id = Some(payment.id);
        Ok(next)
    }

    /// Cancel a `pending` or `confirmed` booking; returns it with the refund due.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] once the booking is
    /// checked in or later; those are disputes, not cancellations.
    pub fn cancel(&self, booking: &Booking) -> BookingResult<(Booking, Money)> {
        let next = self.transition(booking, BookingStatus::Cancelled)?;
        Ok((next, self.refund_amount(booking.amount)))
    }

    /// `confirmed → checked_in`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] from any other status.
    pub fn check_in(&self, booking: &Booking) -> BookingResult<Booking> {
        self.transition(booking, BookingStatus::CheckedIn)
    }

    /// `checked_in → checked_out`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] from any other status.
    pub fn check_out(&self, booking: &Booking) -> BookingResult<Booking> {
        self.transition(booking, BookingStatus::CheckedOut)
    }

    /// `checked_in | checked_out → completed`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] from any other status.
    pub fn complete(&self, booking: &Booking) -> BookingResult<Booking> {
        self.transition(booking, BookingStatus::Completed)
    }

    fn rejected(booking: &Booking, to: BookingStatus) -> BookingError {
        BookingError::InvalidStateTransition {
            booking_id: booking.id,
            from: booking.status,
            to,
        }
    }
}

impl Default for BookingStateMachine {
    fn default() -> Self {
        Self::new(BasisPoints::from_percent(10))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{GatewayKind, PaymentTransactionId, idempotency_key};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::CheckedIn,
        BookingStatus::CheckedOut,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    fn pending(amount: u64) -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        BookingStateMachine::default().create(
            TenantId::new(),
            SeatId::new(),
            UserId::new(),
            TimeWindow::new(start, end).unwrap(),
            Money::from_minor(amount),
        )
    }

    fn payment(booking: &Booking, status: PaymentStatus) -> PaymentTransaction {
        PaymentTransaction {
            id: PaymentTransactionId::new(),
            tenant_id: booking.tenant_id,
            booking_id: booking.id,
            gateway: GatewayKind::GatewayA,
            gateway_order_id: Some("order-1".to_string()),
            status,
            idempotency_key: idempotency_key(booking.id, 1),
            amount: booking.amount,
            attempt: 1,
            created_at: Utc::now(),
        }
    }

    fn confirmed(amount: u64) -> Booking {
        let booking = pending(amount);
        let txn = payment(&booking, PaymentStatus::Success);
        BookingStateMachine::default().confirm(&booking, &txn).unwrap()
    }

    #[test]
    fn test_create_starts_pending() {
        let booking = pending(100);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.payment_id.is_none());
    }

    #[test]
    fn test_confirm_requires_successful_payment() {
        let machine = BookingStateMachine::default();
        let booking = pending(100);

        let failed = payment(&booking, PaymentStatus::Failed);
        assert!(matches!(
            machine.confirm(&booking, &failed),
            Err(BookingError::InvalidStateTransition { .. })
        ));

        let mut foreign = payment(&booking, PaymentStatus::Success);
        foreign.booking_id = BookingId::new();
        assert!(machine.confirm(&booking, &foreign).is_err());

        let ok = payment(&booking, PaymentStatus::Success);
        let confirmed = machine.confirm(&booking, &ok).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_id, Some(ok.id));
    }

    #[test]
    fn test_generic_transition_cannot_confirm() {
        let booking = pending(100);
        assert!(
            BookingStateMachine::default()
                .transition(&booking, BookingStatus::Confirmed)
                .is_err()
        );
    }

    #[test]
    fn test_cancel_confirmed_refunds_amount_minus_fee() {
        let (cancelled, refund) = BookingStateMachine::default().cancel(&confirmed(100)).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(refund, Money::from_minor(90));
    }

    #[test]
    fn test_refund_floors_the_fee() {
        let machine = BookingStateMachine::new(BasisPoints::from_percent(10));
        // fee = floor(10.5) = 10
        assert_eq!(machine.refund_amount(Money::from_minor(105)), Money::from_minor(95));
    }

    #[test]
    fn test_cancel_after_check_in_is_rejected() {
        let machine = BookingStateMachine::default();
        let checked_in = machine.check_in(&confirmed(100)).unwrap();

        let err = machine.cancel(&checked_in).unwrap_err();
        assert_eq!(
            err,
            BookingError::InvalidStateTransition {
                booking_id: checked_in.id,
                from: BookingStatus::CheckedIn,
                to: BookingStatus::Cancelled,
            }
        );
    }

    #[test]
    fn test_happy_path_lifecycle() {
        let machine = BookingStateMachine::default();
        let booking = machine.check_in(&confirmed(100)).unwrap();
        let booking = machine.check_out(&booking).unwrap();
        let booking = machine.complete(&booking).unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
        assert!(machine.cancel(&booking).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!can_transition(BookingStatus::Cancelled, to));
            assert!(!can_transition(BookingStatus::Completed, to));
        }
    }

    fn any_status() -> impl Strategy<Value = BookingStatus> {
        proptest::sample::select(ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_realized_walk_follows_table(steps in proptest::collection::vec(any_status(), 0..12)) {
            let machine = BookingStateMachine::default();
            let mut booking = pending(1_000);
            let mut walk = vec![booking.status];

            for to in steps {
                let before = booking.clone();
                let result = if to == BookingStatus::Confirmed {
                    let txn = payment(&booking, PaymentStatus::Success);
                    machine.confirm(&booking, &txn)
                } else {
                    machine.transition(&booking, to)
                };
                match result {
                    Ok(next) => {
                        prop_assert!(can_transition(before.status, next.status));
                        booking = next;
                        walk.push(booking.status);
                    }
                    Err(_) => prop_assert_eq!(&booking, &before),
                }
            }

            for pair in walk.windows(2) {
                prop_assert!(can_transition(pair[0], pair[1]));
            }
            if walk.contains(&BookingStatus::Confirmed) {
                prop_assert!(booking.payment_id.is_some());
            }
        }

        #[test]
        fn prop_refund_never_exceeds_amount(amount in 0u64..10_000_000, fee in 0u32..=10_000) {
            let machine = BookingStateMachine::new(BasisPoints::new(fee));
            let refund = machine.refund_amount(Money::from_minor(amount));
            prop_assert!(refund.minor() <= amount);
        }
    }
}
