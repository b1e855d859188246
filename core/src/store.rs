//! Persistence traits.
//!
//! Lookups are by primary key only; callers verify ownership through
//! [`TenantContext::ensure_owns`](crate::tenant::TenantContext::ensure_owns)
//! so that a cross-tenant access is reported instead of silently hidden.
//!
//! Methods return [`BoxFuture`] so the traits stay object-safe and a single
//! `Arc<dyn DataStore>` can be shared by every request handler.

use crate::error::BookingResult;
use crate::types::{
    Booking, BookingId, BookingStatus, Channel, CreditWallet, GatewayKind, LedgerEntry, Money,
    PaymentStatus, PaymentTransaction, PaymentTransactionId, Seat, SeatId, Tenant, TenantId,
    TimeWindow,
};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

/// Tenant lookups.
pub trait TenantStore: Send + Sync {
    /// Load a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn find_tenant(&self, id: TenantId) -> BoxFuture<'_, BookingResult<Option<Tenant>>>;
}

/// Seat lookups. Seats are managed outside the engine.
pub trait SeatStore: Send + Sync {
    /// Load a seat.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn find_seat(&self, id: SeatId) -> BoxFuture<'_, BookingResult<Option<Seat>>>;
}

/// Booking rows.
pub trait BookingStore: Send + Sync {
    /// Load a booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn find_booking(&self, id: BookingId) -> BoxFuture<'_, BookingResult<Option<Booking>>>;

    /// Non-cancelled bookings on `seat_id` that may overlap `window`.
    ///
    /// Implementations may return a superset; callers re-check overlap.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn live_bookings_for_seat(
        &self,
        seat_id: SeatId,
        window: TimeWindow,
    ) -> BoxFuture<'_, BookingResult<Vec<Booking>>>;

    /// Persist a new booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Conflict`](crate::BookingError::Conflict) if the
    /// store itself detects an overlapping live booking, or
    /// [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, BookingResult<()>>;

    /// Overwrite a booking only if its stored status is still `expected`.
    ///
    /// Returns `false` when the stored status changed underneath the caller.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Conflict`](crate::BookingError::Conflict) if the
    /// write would make the booking hold a window another live booking holds,
    /// or [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn update_booking(
        &self,
        booking: Booking,
        expected: BookingStatus,
    ) -> BoxFuture<'_, BookingResult<bool>>;
}

/// Payment transaction rows. Failed attempts are kept for audit.
pub trait PaymentStore: Send + Sync {
    /// Persist a new attempt.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure
    /// failure or duplicate idempotency key.
    fn insert_transaction(&self, transaction: PaymentTransaction)
    -> BoxFuture<'_, BookingResult<()>>;

    /// Overwrite an attempt (status and processor order id).
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn update_transaction(&self, transaction: PaymentTransaction)
    -> BoxFuture<'_, BookingResult<()>>;

    /// Overwrite an attempt only if its stored status is still `expected`.
    ///
    /// Returns `false` when another writer changed the status first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn update_transaction_if(
        &self,
        transaction: PaymentTransaction,
        expected: PaymentStatus,
    ) -> BoxFuture<'_, BookingResult<bool>>;

    /// Load an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn find_transaction(
        &self,
        id: PaymentTransactionId,
    ) -> BoxFuture<'_, BookingResult<Option<PaymentTransaction>>>;

    /// Load an attempt by processor order reference.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn find_by_gateway_order(
        &self,
        gateway: GatewayKind,
        gateway_order_id: String,
    ) -> BoxFuture<'_, BookingResult<Option<PaymentTransaction>>>;

    /// All attempts for a booking, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn transactions_for_booking(
        &self,
        booking_id: BookingId,
    ) -> BoxFuture<'_, BookingResult<Vec<PaymentTransaction>>>;
}

/// Result of an atomic check-and-deduct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Balance was sufficient and has been reduced
    Debited {
        /// Balance after the debit
        remaining: u64,
    },
    /// Balance was insufficient and is unchanged
    Insufficient {
        /// Balance observed
        available: u64,
    },
}

/// Prepaid credit wallets and their ledger.
pub trait WalletStore: Send + Sync {
    /// Load a wallet.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn find_wallet(
        &self,
        tenant_id: TenantId,
        channel: Channel,
    ) -> BoxFuture<'_, BookingResult<Option<CreditWallet>>>;

    /// Atomically check `balance >= units`, deduct, add `cost` to
    /// `total_spent` and append a usage ledger row.
    ///
    /// Concurrent callers on the same `(tenant_id, channel)` are serialized; two
    /// callers can never both succeed when only one could be satisfied. A
    /// missing wallet behaves as a zero balance.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn debit(
        &self,
        tenant_id: TenantId,
        channel: Channel,
        units: u64,
        cost: Money,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, BookingResult<DebitOutcome>>;

    /// Add purchased credits, creating the wallet if needed, and append a
    /// purchase ledger row. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn credit(
        &self,
        tenant_id: TenantId,
        channel: Channel,
        units: u64,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, BookingResult<u64>>;

    /// Ledger rows for one wallet, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`](crate::BookingError::Store) on infrastructure failure.
    fn ledger_entries(
        &self,
        tenant_id: TenantId,
        channel: Channel,
    ) -> BoxFuture<'_, BookingResult<Vec<LedgerEntry>>>;
}

/// Everything the engine persists, behind one connection handle.
pub trait DataStore: TenantStore + SeatStore + BookingStore + PaymentStore + WalletStore {}

impl<T> DataStore for T where T: TenantStore + SeatStore + BookingStore + PaymentStore + WalletStore {}
