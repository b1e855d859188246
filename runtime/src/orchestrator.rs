//! Booking orchestration.
//!
//! One [`BookingOrchestrator::create_booking`] call takes a request from
//! validation to a terminal answer:
//!
//! 1. validate the window and seat
//! 2. take the seat lock, re-check availability, commit a `pending` booking,
//!    release the lock
//! 3. route the payment (outside the lock, in its own task)
//! 4. `confirmed` on success, `cancelled` on any failure, panic included
//!
//! No booking is left `pending` once the call returns.

use crate::locks::SeatLockRegistry;
use crate::metrics::BookingMetrics;
use crate::notifications::{BookingNotifier, NotificationOutcome};
use crate::router::{PaymentGatewayRouter, PaymentOutcome};
use chrono::{DateTime, Utc};
use seatflow_core::{
    Booking, BookingConflictDetector, BookingError, BookingId, BookingPolicy, BookingResult,
    BookingStateMachine, BookingStatus, Clock, GatewayKind, LibraryId, Money, PaymentStatus,
    PaymentTransaction, RoutingDecision, SeatId, TenantContext, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A request to book one seat for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Library the seat is in
    pub library_id: LibraryId,
    /// Seat to book
    pub seat_id: SeatId,
    /// Booking user
    pub user_id: UserId,
    /// Inclusive start
    pub start_time: DateTime<Utc>,
    /// Exclusive end
    pub end_time: DateTime<Utc>,
    /// Processor the caller wants, overriding fee-based selection
    pub payment_preference: Option<GatewayKind>,
}

/// A confirmed, paid booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfirmation {
    /// The booking, `confirmed`
    pub booking: Booking,
    /// Successful payment
    pub payment: PaymentTransaction,
    /// Routing decisions of this call's attempts
    pub decisions: Vec<RoutingDecision>,
    /// Platform commission on the booking amount
    pub commission: Money,
    /// Confirmation message result, if a notifier is configured
    pub notification: Option<NotificationOutcome>,
}

/// A cancelled booking and the money returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    /// The booking, `cancelled`
    pub booking: Booking,
    /// Amount refunded to the user (zero if nothing was captured)
    pub refund_amount: Money,
    /// Processor refund reference, if a refund was issued
    pub refund_reference: Option<String>,
}

/// A booking with its payment history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingDetails {
    /// The booking
    pub booking: Booking,
    /// Every payment attempt, oldest first
    pub payments: Vec<PaymentTransaction>,
}

/// Composes availability, lifecycle and payment routing per request.
pub struct BookingOrchestrator {
    detector: BookingConflictDetector,
    machine: BookingStateMachine,
    router: Arc<PaymentGatewayRouter>,
    locks: SeatLockRegistry,
    notifier: Option<Arc<BookingNotifier>>,
}

impl BookingOrchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        policy: BookingPolicy,
        router: Arc<PaymentGatewayRouter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let machine = BookingStateMachine::new(policy.cancellation_fee);
        Self {
            detector: BookingConflictDetector::new(policy, clock),
            machine,
            router,
            locks: SeatLockRegistry::new(),
            notifier: None,
        }
    }

    /// Send a paid confirmation message for every confirmed booking.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<BookingNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Payment router.
    #[must_use]
    pub fn router(&self) -> &Arc<PaymentGatewayRouter> {
        &self.router
    }

    /// Booking lifecycle rules.
    #[must_use]
    pub const fn state_machine(&self) -> &BookingStateMachine {
        &self.machine
    }

    /// Book, pay and confirm.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for a bad window or unbookable seat
    /// - [`BookingError::Conflict`] if the window overlaps a live booking
    /// - [`BookingError::Gateway`] if payment failed; the booking is already
    ///   `cancelled` when this is returned
    /// - [`BookingError::TenantIsolationViolation`] for another tenant's seat
    pub async fn create_booking(
        &self,
        ctx: &TenantContext,
        request: BookingRequest,
    ) -> BookingResult<BookingConfirmation> {
        let result = self.book_and_pay(ctx, request).await;

        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(BookingError::Conflict { .. }) => "conflict",
            Err(BookingError::Gateway { .. }) => "payment_failed",
            Err(BookingError::Validation { .. } | BookingError::NotFound { .. }) => "rejected",
            Err(_) => "error",
        };
        BookingMetrics::record_outcome(outcome);

        match &result {
            Err(error) if error.is_expected() => {
                tracing::debug!(tenant_id = %ctx.tenant_id(), error = %error, "Booking rejected");
            }
            Err(error @ BookingError::Gateway { .. }) => {
                tracing::warn!(tenant_id = %ctx.tenant_id(), error = %error, "Booking cancelled");
            }
            Err(BookingError::TenantIsolationViolation { .. }) | Ok(_) => {}
            Err(error) => {
                tracing::error!(tenant_id = %ctx.tenant_id(), error = %error, "Booking failed");
            }
        }
        result
    }

    async fn book_and_pay(
        &self,
        ctx: &TenantContext,
        request: BookingRequest,
    ) -> BookingResult<BookingConfirmation> {
        let preference = request.payment_preference;
        let booking = self.reserve(ctx, &request).await?;
        tracing::info!(
            tenant_id = %ctx.tenant_id(),
            booking_id = %booking.id,
            seat_id = %booking.seat_id,
            window = %booking.window(),
            amount = %booking.amount,
            "Pending booking committed"
        );

        // Own task: a panic inside a processor client surfaces as a JoinError
        // instead of unwinding through the orchestrator.
        let payment = {
            let router = Arc::clone(&self.router);
            let task_ctx = ctx.clone();
            let task_booking = booking.clone();
            tokio::spawn(async move { router.pay(&task_ctx, &task_booking, preference).await }).await
        };

        match payment {
            Ok(Ok(PaymentOutcome::Paid {
                transaction,
                decisions,
            })) => self.settle_paid(ctx, booking, transaction, decisions).await,
            Ok(Ok(PaymentOutcome::Failed { reason, decisions })) => {
                let attempts = u32::try_from(decisions.len()).unwrap_or(u32::MAX);
                self.abandon(ctx, &booking, decisions, BookingError::Gateway {
                    booking_id: booking.id,
                    attempts,
                    reason,
                })
                .await
            }
            Ok(Err(error)) => self.abandon(ctx, &booking, Vec::new(), error).await,
            Err(join_error) => {
                tracing::error!(
                    booking_id = %booking.id,
                    error = %join_error,
                    "Payment task aborted"
                );
                self.abandon(ctx, &booking, Vec::new(), BookingError::Gateway {
                    booking_id: booking.id,
                    attempts: 0,
                    reason: "payment processing aborted".to_string(),
                })
                .await
            }
        }
    }

    /// Validate, then check and commit the pending booking under the seat lock.
    async fn reserve(
        &self,
        ctx: &TenantContext,
        request: &BookingRequest,
    ) -> BookingResult<Booking> {
        let window = self
            .detector
            .validate_window(request.start_time, request.end_time)?;
        let seat = self
            .detector
            .bookable_seat(ctx, request.seat_id, Some(request.library_id))
            .await?;

        let amount = seat.price_for(&window);
        if amount.is_zero() {
            return Err(BookingError::validation(format!("seat {} has no price", seat.id)));
        }

        // Cheap rejection before queueing on the lock.
        self.detector.ensure_available(ctx, &seat, window, None).await?;

        let _guard = self.locks.acquire(ctx.tenant_id(), seat.id).await;
        self.detector.ensure_available(ctx, &seat, window, None).await?;

        let booking = self
            .machine
            .create(ctx.tenant_id(), seat.id, request.user_id, window, amount);
        ctx.store().insert_booking(booking.clone()).await?;
        BookingMetrics::record_transition(BookingStatus::Pending);
        Ok(booking)
    }

    async fn settle_paid(
        &self,
        ctx: &TenantContext,
        booking: Booking,
        transaction: PaymentTransaction,
        decisions: Vec<RoutingDecision>,
    ) -> BookingResult<BookingConfirmation> {
        let confirmed = self.machine.confirm(&booking, &transaction)?;
        if ctx
            .store()
            .update_booking(confirmed.clone(), BookingStatus::Pending)
            .await?
        {
            BookingMetrics::record_transition(BookingStatus::Confirmed);
            return Ok(self.finish(ctx, confirmed, transaction, decisions).await);
        }

        // Changed while paying: a webhook confirmed it, or it was cancelled.
        let current = self.load(ctx, booking.id).await?;
        match (current.status, current.payment_id) {
            (BookingStatus::Confirmed, Some(payment_id)) if payment_id == transaction.id => {
                Ok(self.finish(ctx, current, transaction, decisions).await)
            }
            (BookingStatus::Confirmed, Some(payment_id)) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    duplicate_payment = %transaction.id,
                    "Booking already paid by an earlier attempt, refunding duplicate charge"
                );
                self.refund_in_full(&transaction).await;
                let original = ctx
                    .store()
                    .find_transaction(payment_id)
                    .await?
                    .ok_or_else(|| BookingError::not_found("PaymentTransaction", payment_id))?;
                Ok(self.finish(ctx, current, original, decisions).await)
            }
            (status, _) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    status = %status,
                    "Booking changed while payment was in flight, refunding"
                );
                self.refund_in_full(&transaction).await;
                Err(BookingError::InvalidStateTransition {
                    booking_id: booking.id,
                    from: status,
                    to: BookingStatus::Confirmed,
                })
            }
        }
    }

    async fn finish(
        &self,
        ctx: &TenantContext,
        booking: Booking,
        payment: PaymentTransaction,
        decisions: Vec<RoutingDecision>,
    ) -> BookingConfirmation {
        let commission = booking.amount.portion(ctx.tenant().commission_rate);
        tracing::info!(
            tenant_id = %ctx.tenant_id(),
            booking_id = %booking.id,
            gateway = %payment.gateway,
            attempts = decisions.len(),
            amount = %booking.amount,
            commission = %commission,
            "Booking confirmed"
        );

        let notification = match &self.notifier {
            Some(notifier) => Some(notifier.send_confirmation(ctx, &booking).await),
            None => None,
        };

        BookingConfirmation {
            booking,
            payment,
            decisions,
            commission,
            notification,
        }
    }

    /// Cancel a booking whose payment did not go through and return `error`,
    /// unless the booking got paid concurrently.
    async fn abandon(
        &self,
        ctx: &TenantContext,
        booking: &Booking,
        decisions: Vec<RoutingDecision>,
        error: BookingError,
    ) -> BookingResult<BookingConfirmation> {
        self.fail_dangling_attempts(ctx, booking.id).await;

        let cancelled = match self.machine.cancel(booking) {
            Ok((cancelled, _)) => cancelled,
            Err(transition_error) => {
                tracing::error!(booking_id = %booking.id, error = %transition_error, "Cannot cancel booking");
                return Err(error);
            }
        };

        match ctx.store().update_booking(cancelled, BookingStatus::Pending).await {
            Ok(true) => {
                BookingMetrics::record_transition(BookingStatus::Cancelled);
                Err(error)
            }
            Ok(false) => {
                let current = self.load(ctx, booking.id).await?;
                if current.status != BookingStatus::Confirmed {
                    return Err(error);
                }
                let Some(payment_id) = current.payment_id else {
                    return Err(error);
                };
                tracing::info!(
                    booking_id = %booking.id,
                    "Payment confirmed asynchronously while attempts failed"
                );
                let payment = ctx
                    .store()
                    .find_transaction(payment_id)
                    .await?
                    .ok_or_else(|| BookingError::not_found("PaymentTransaction", payment_id))?;
                Ok(self.finish(ctx, current, payment, decisions).await)
            }
            Err(store_error) => {
                tracing::error!(
                    booking_id = %booking.id,
                    error = %store_error,
                    "Failed to cancel unpaid booking"
                );
                Err(error)
            }
        }
    }

    /// Attempts still `initiated` after the router returned never got an answer.
    async fn fail_dangling_attempts(&self, ctx: &TenantContext, booking_id: BookingId) {
        let Ok(history) = ctx.store().transactions_for_booking(booking_id).await else {
            return;
        };
        for mut transaction in history
            .into_iter()
            .filter(|t| t.status == PaymentStatus::Initiated)
        {
            transaction.status = PaymentStatus::Failed;
            if let Err(error) = ctx
                .store()
                .update_transaction_if(transaction, PaymentStatus::Initiated)
                .await
            {
                tracing::warn!(booking_id = %booking_id, error = %error, "Failed to close payment attempt");
            }
        }
    }

    async fn refund_in_full(&self, transaction: &PaymentTransaction) {
        if let Err(error) = self.router.refund(transaction, transaction.amount).await {
            tracing::error!(
                booking_id = %transaction.booking_id,
                payment_id = %transaction.id,
                error = %error,
                "Automatic refund failed, manual follow-up required"
            );
        }
    }

    /// Cancel a `pending` or `confirmed` booking and refund what was paid,
    /// minus the cancellation fee.
    ///
    /// The cancellation is written before the refund is requested, so two
    /// racing callers (or a racing check-in) cannot both get past it. A failed
    /// refund restores the previous status.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidStateTransition`] once checked in or later, or
    ///   if another caller changed the booking first
    /// - [`BookingError::Gateway`] if the refund call fails; the booking is
    ///   put back as it was
    /// - [`BookingError::NotFound`] / [`BookingError::TenantIsolationViolation`]
    pub async fn cancel_booking(
        &self,
        ctx: &TenantContext,
        booking_id: BookingId,
    ) -> BookingResult<Cancellation> {
        let booking = self.load(ctx, booking_id).await?;
        let (cancelled, refund_due) = self.machine.cancel(&booking).inspect_err(|error| {
            tracing::warn!(booking_id = %booking_id, error = %error, "Cancellation rejected");
        })?;

        let payment = match booking.payment_id {
            Some(payment_id) => ctx.store().find_transaction(payment_id).await?,
            None => None,
        };

        if !ctx.store().update_booking(cancelled.clone(), booking.status).await? {
            let current = self.load(ctx, booking_id).await?;
            tracing::warn!(
                booking_id = %booking_id,
                status = %current.status,
                "Booking changed during cancellation"
            );
            return Err(BookingError::InvalidStateTransition {
                booking_id,
                from: current.status,
                to: BookingStatus::Cancelled,
            });
        }

        let (refund_amount, refund_reference) = match payment {
            Some(payment) if payment.status == PaymentStatus::Success && !refund_due.is_zero() => {
                match self.router.refund(&payment, refund_due).await {
                    Ok(reference) => (refund_due, Some(reference)),
                    Err(error) => {
                        self.restore_after_failed_refund(ctx, &booking).await;
                        return Err(BookingError::Gateway {
                            booking_id,
                            attempts: 1,
                            reason: format!("refund failed: {error}"),
                        });
                    }
                }
            }
            _ => (Money::ZERO, None),
        };

        BookingMetrics::record_transition(BookingStatus::Cancelled);
        tracing::info!(
            tenant_id = %ctx.tenant_id(),
            booking_id = %booking_id,
            refund = %refund_amount,
            "Booking cancelled"
        );

        Ok(Cancellation {
            booking: cancelled,
            refund_amount,
            refund_reference,
        })
    }

    /// Undo a claimed cancellation whose refund did not go through.
    async fn restore_after_failed_refund(&self, ctx: &TenantContext, previous: &Booking) {
        match ctx
            .store()
            .update_booking(previous.clone(), BookingStatus::Cancelled)
            .await
        {
            Ok(true) => tracing::warn!(
                booking_id = %previous.id,
                status = %previous.status,
                "Refund failed, cancellation rolled back"
            ),
            Ok(false) => tracing::error!(
                booking_id = %previous.id,
                "Refund failed and booking left cancelled state, manual follow-up required"
            ),
            Err(error) => tracing::error!(
                booking_id = %previous.id,
                error = %error,
                "Refund failed and cancellation could not be rolled back, manual follow-up required"
            ),
        }
    }

    /// `confirmed → checked_in`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] from any other status.
    pub async fn check_in(
        &self,
        ctx: &TenantContext,
        booking_id: BookingId,
    ) -> BookingResult<Booking> {
        self.advance(ctx, booking_id, BookingStateMachine::check_in).await
    }

    /// `checked_in → checked_out`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] from any other status.
    pub async fn check_out(
        &self,
        ctx: &TenantContext,
        booking_id: BookingId,
    ) -> BookingResult<Booking> {
        self.advance(ctx, booking_id, BookingStateMachine::check_out).await
    }

    /// `checked_in | checked_out → completed`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidStateTransition`] from any other status.
    pub async fn complete(
        &self,
        ctx: &TenantContext,
        booking_id: BookingId,
    ) -> BookingResult<Booking> {
        self.advance(ctx, booking_id, BookingStateMachine::complete).await
    }

    async fn advance(
        &self,
        ctx: &TenantContext,
        booking_id: BookingId,
        step: fn(&BookingStateMachine, &Booking) -> BookingResult<Booking>,
    ) -> BookingResult<Booking> {
        let booking = self.load(ctx, booking_id).await?;
        let next = step(&self.machine, &booking).inspect_err(|error| {
            tracing::warn!(booking_id = %booking_id, error = %error, "Transition rejected");
        })?;

        if !ctx.store().update_booking(next.clone(), booking.status).await? {
            let current = self.load(ctx, booking_id).await?;
            return Err(BookingError::InvalidStateTransition {
                booking_id,
                from: current.status,
                to: next.status,
            });
        }

        BookingMetrics::record_transition(next.status);
        tracing::info!(booking_id = %booking_id, from = %booking.status, to = %next.status, "Booking advanced");
        Ok(next)
    }

    /// A booking with its payment attempts.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] or [`BookingError::TenantIsolationViolation`].
    pub async fn booking_details(
        &self,
        ctx: &TenantContext,
        booking_id: BookingId,
    ) -> BookingResult<BookingDetails> {
        let booking = self.load(ctx, booking_id).await?;
        let payments = ctx.store().transactions_for_booking(booking_id).await?;
        for payment in &payments {
            ctx.ensure_owns(payment)?;
        }
        Ok(BookingDetails { booking, payments })
    }

    /// Whether `seat_id` is free for `[start, end)`.
    ///
    /// # Errors
    ///
    /// See [`BookingConflictDetector::check_available`].
    pub async fn check_available(
        &self,
        ctx: &TenantContext,
        seat_id: SeatId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<bool> {
        self.detector.check_available(ctx, seat_id, start, end, None).await
    }

    async fn load(&self, ctx: &TenantContext, booking_id: BookingId) -> BookingResult<Booking> {
        let booking = ctx
            .store()
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking", booking_id))?;
        ctx.ensure_owns(&booking)?;
        Ok(booking)
    }
}

impl std::fmt::Debug for BookingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingOrchestrator")
            .field("detector", &self.detector)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}
