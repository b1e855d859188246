//! Seat availability and double-booking detection.
//!
//! Two windows `[s1,e1)` and `[s2,e2)` overlap iff `s1 < e2 && s2 < e1`.
//! A window is available on a seat iff no booking on that seat that still
//! holds it (anything but `cancelled`) overlaps the window.
//!
//! The detector only answers the question. Serializing check and insert is
//! the caller's job (see the runtime's seat lock registry).

use crate::environment::Clock;
use crate::error::{BookingError, BookingResult};
use crate::policy::BookingPolicy;
use crate::tenant::TenantContext;
use crate::types::{Booking, BookingId, LibraryId, Seat, SeatId, SeatStatus, TimeWindow};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Whether `[a_start, a_end)` and `[b_start, b_end)` overlap.
#[must_use]
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// First booking in `existing` that holds its seat during `window`.
///
/// `exclude` skips the booking being re-evaluated.
#[must_use]
pub fn find_conflict<'a>(
    existing: &'a [Booking],
    window: &TimeWindow,
    exclude: Option<BookingId>,
) -> Option<&'a Booking> {
    existing.iter().find(|booking| {
        Some(booking.id) != exclude
            && booking.status.holds_seat()
            && booking.window().overlaps(window)
    })
}

/// Validates booking windows and checks seats for overlapping bookings.
#[derive(Clone)]
pub struct BookingConflictDetector {
    policy: BookingPolicy,
    clock: Arc<dyn Clock>,
}

impl BookingConflictDetector {
    /// Create a detector.
    #[must_use]
    pub fn new(policy: BookingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    /// Policy in force.
    #[must_use]
    pub const fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Cheap preconditions checked before any overlap query.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if `end <= start`, the window is
    /// shorter than the minimum or longer than the maximum duration, or it
    /// starts in the past.
    pub fn validate_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<TimeWindow> {
        let window = TimeWindow::new(start, end)?;
        let duration = window.duration();

        if duration < self.policy.min_duration {
            return Err(BookingError::validation(format!(
                "booking must last at least {} minutes",
                self.policy.min_duration.num_minutes()
            )));
        }
        if duration > self.policy.max_duration {
            return Err(BookingError::validation(format!(
                "booking must not exceed {} minutes",
                self.policy.max_duration.num_minutes()
            )));
        }
        if start < self.clock.now() {
            return Err(BookingError::validation("booking cannot start in the past"));
        }

        Ok(window)
    }

    /// Load a seat the calling tenant may book.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] if the seat does not exist, is in
    ///   another library than `library_id`, or is under maintenance
    /// - [`BookingError::TenantIsolationViolation`] if another tenant owns it
    pub async fn bookable_seat(
        &self,
        ctx: &TenantContext,
        seat_id: SeatId,
        library_id: Option<LibraryId>,
    ) -> BookingResult<Seat> {
        let seat = ctx
            .store()
            .find_seat(seat_id)
            .await?
            .ok_or_else(|| BookingError::validation(format!("seat {seat_id} does not exist")))?;

        ctx.ensure_owns(&seat)?;

        if let Some(library_id) = library_id {
            if seat.library_id != library_id {
                return Err(BookingError::validation(format!(
                    "seat {seat_id} is not in library {library_id}"
                )));
            }
        }
        if seat.status != SeatStatus::Active {
            return Err(BookingError::validation(format!(
                "seat {seat_id} is under {}",
                seat.status.as_str()
            )));
        }

        Ok(seat)
    }

    /// Whether `seat_id` is free for `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for a malformed window or
    /// unbookable seat and [`BookingError::TenantIsolationViolation`] for a
    /// seat of another tenant. Overlap is reported as `Ok(false)`, not as an
    /// error.
    pub async fn check_available(
        &self,
        ctx: &TenantContext,
        seat_id: SeatId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<BookingId>,
    ) -> BookingResult<bool> {
        let window = self.validate_window(start, end)?;
        let seat = self.bookable_seat(ctx, seat_id, None).await?;
        let existing = ctx.store().live_bookings_for_seat(seat.id, window).await?;
        Ok(find_conflict(&existing, &window, exclude).is_none())
    }

    /// Fail with [`BookingError::Conflict`] if `window` is taken on `seat`.
    ///
    /// The seat and window must already be validated.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Conflict`] on overlap or
    /// [`BookingError::Store`] on infrastructure failure.
    pub async fn ensure_available(
        &self,
        ctx: &TenantContext,
        seat: &Seat,
        window: TimeWindow,
        exclude: Option<BookingId>,
    ) -> BookingResult<()> {
        let existing = ctx.store().live_bookings_for_seat(seat.id, window).await?;
        if let Some(holder) = find_conflict(&existing, &window, exclude) {
            tracing::debug!(
                seat_id = %seat.id,
                requested = %window,
                held_by = %holder.id,
                "Seat window already taken"
            );
            return Err(BookingError::Conflict { seat_id: seat.id });
        }
        Ok(())
    }
}

impl std::fmt::Debug for BookingConflictDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingConflictDetector")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{BookingStatus, Money, TenantId, UserId};
    use chrono::{Duration, TimeZone};

    struct Frozen(DateTime<Utc>);

    impl Clock for Frozen {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn detector() -> BookingConflictDetector {
        BookingConflictDetector::new(BookingPolicy::default(), Arc::new(Frozen(at(8))))
    }

    fn booking(start: u32, end: u32, status: BookingStatus) -> Booking {
        Booking {
            id: BookingId::new(),
            tenant_id: TenantId::new(),
            seat_id: SeatId::new(),
            user_id: UserId::new(),
            start_time: at(start),
            end_time: at(end),
            status,
            payment_id: None,
            amount: Money::from_minor(100),
        }
    }

    #[test]
    fn test_overlap_is_half_open() {
        assert!(windows_overlap(at(10), at(12), at(11), at(13)));
        assert!(!windows_overlap(at(10), at(12), at(12), at(14)));
        assert!(windows_overlap(at(10), at(14), at(11), at(12)));
    }

    #[test]
    fn test_cancelled_bookings_do_not_block() {
        let existing = vec![booking(10, 12, BookingStatus::Cancelled)];
        let window = TimeWindow::new(at(11), at(13)).unwrap();
        assert!(find_conflict(&existing, &window, None).is_none());
    }

    #[test]
    fn test_live_bookings_block_overlaps() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::CheckedIn,
            BookingStatus::CheckedOut,
            BookingStatus::Completed,
        ] {
            let existing = vec![booking(10, 12, status)];
            let window = TimeWindow::new(at(11), at(13)).unwrap();
            assert!(find_conflict(&existing, &window, None).is_some(), "{status}");
        }
    }

    #[test]
    fn test_excluded_booking_is_ignored() {
        let existing = vec![booking(10, 12, BookingStatus::Confirmed)];
        let window = TimeWindow::new(at(10), at(11)).unwrap();
        assert!(find_conflict(&existing, &window, Some(existing[0].id)).is_none());
    }

    #[test]
    fn test_window_validation() {
        let detector = detector();

        assert!(detector.validate_window(at(10), at(12)).is_ok());
        assert!(matches!(
            detector.validate_window(at(12), at(10)),
            Err(BookingError::Validation { .. })
        ));
        assert!(matches!(
            detector.validate_window(at(10), at(10) + Duration::minutes(29)),
            Err(BookingError::Validation { .. })
        ));
        assert!(detector.validate_window(at(10), at(10) + Duration::minutes(30)).is_ok());
        assert!(matches!(
            detector.validate_window(at(9), at(22)),
            Err(BookingError::Validation { .. })
        ));
        // Clock is at 08:00.
        assert!(matches!(
            detector.validate_window(at(7), at(9)),
            Err(BookingError::Validation { .. })
        ));
    }
}
