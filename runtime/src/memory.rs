//! In-memory implementation of every store trait.
//!
//! Used by tests and by the server when no database is configured. All tables
//! live behind one mutex that is never held across an `.await`, so each
//! method is atomic. Like the PostgreSQL schema it refuses to persist an
//! overlapping live booking.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use seatflow_core::{
    Booking, BookingError, BookingId, BookingResult, BookingStatus, BookingStore, Channel,
    CreditWallet, DebitOutcome, GatewayKind, LedgerEntry, LedgerEntryKind, Money, PaymentStatus,
    PaymentStore, PaymentTransaction, PaymentTransactionId, Seat, SeatId, SeatStore, Tenant,
    TenantId, TenantStore, TimeWindow, WalletStore, find_conflict,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    tenants: HashMap<TenantId, Tenant>,
    seats: HashMap<SeatId, Seat>,
    bookings: HashMap<BookingId, Booking>,
    transactions: Vec<PaymentTransaction>,
    wallets: HashMap<(TenantId, Channel), CreditWallet>,
    ledger: Vec<LedgerEntry>,
}

/// Tenant-scoped data held in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a tenant (onboarding happens outside the engine).
    pub fn add_tenant(&self, tenant: Tenant) {
        self.tables().tenants.insert(tenant.id, tenant);
    }

    /// Register a seat.
    pub fn add_seat(&self, seat: Seat) {
        self.tables().seats.insert(seat.id, seat);
    }

    /// Overwrite a wallet balance without a ledger row (fixtures only).
    pub fn set_balance(&self, tenant_id: TenantId, channel: Channel, balance: u64) {
        self.tables()
            .wallets
            .entry((tenant_id, channel))
            .and_modify(|wallet| wallet.balance = balance)
            .or_insert(CreditWallet {
                tenant_id,
                channel,
                balance,
                total_spent: Money::ZERO,
            });
    }

    /// Every booking on a seat, cancelled ones included.
    #[must_use]
    pub fn bookings_for_seat(&self, seat_id: SeatId) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .tables()
            .bookings
            .values()
            .filter(|booking| booking.seat_id == seat_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|booking| booking.start_time);
        bookings
    }

    /// Every booking held.
    #[must_use]
    pub fn all_bookings(&self) -> Vec<Booking> {
        self.tables().bookings.values().cloned().collect()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables();
        f.debug_struct("InMemoryStore")
            .field("tenants", &tables.tenants.len())
            .field("seats", &tables.seats.len())
            .field("bookings", &tables.bookings.len())
            .field("transactions", &tables.transactions.len())
            .finish_non_exhaustive()
    }
}

impl TenantStore for InMemoryStore {
    fn find_tenant(&self, id: TenantId) -> BoxFuture<'_, BookingResult<Option<Tenant>>> {
        Box::pin(async move { Ok(self.tables().tenants.get(&id).cloned()) })
    }
}

impl SeatStore for InMemoryStore {
    fn find_seat(&self, id: SeatId) -> BoxFuture<'_, BookingResult<Option<Seat>>> {
        Box::pin(async move { Ok(self.tables().seats.get(&id).cloned()) })
    }
}

impl BookingStore for InMemoryStore {
    fn find_booking(&self, id: BookingId) -> BoxFuture<'_, BookingResult<Option<Booking>>> {
        Box::pin(async move { Ok(self.tables().bookings.get(&id).cloned()) })
    }

    fn live_bookings_for_seat(
        &self,
        seat_id: SeatId,
        window: TimeWindow,
    ) -> BoxFuture<'_, BookingResult<Vec<Booking>>> {
        Box::pin(async move {
            Ok(self
                .tables()
                .bookings
                .values()
                .filter(|b| {
                    b.seat_id == seat_id && b.status.holds_seat() && b.window().overlaps(&window)
                })
                .cloned()
                .collect())
        })
    }

    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            let mut tables = self.tables();
            if tables.bookings.contains_key(&booking.id) {
                return Err(BookingError::Store(format!("duplicate booking id {}", booking.id)));
            }
            if booking.status.holds_seat() {
                let same_seat: Vec<Booking> = tables
                    .bookings
                    .values()
                    .filter(|b| b.seat_id == booking.seat_id)
                    .cloned()
                    .collect();
                if find_conflict(&same_seat, &booking.window(), None).is_some() {
                    return Err(BookingError::Conflict {
                        seat_id: booking.seat_id,
                    });
                }
            }
            tables.bookings.insert(booking.id, booking);
            Ok(())
        })
    }

    fn update_booking(
        &self,
        booking: Booking,
        expected: BookingStatus,
    ) -> BoxFuture<'_, BookingResult<bool>> {
        Box::pin(async move {
            let mut tables = self.tables();
            match tables.bookings.get(&booking.id) {
                Some(stored) if stored.status == expected => {}
                Some(_) => return Ok(false),
                None => return Err(BookingError::not_found("Booking", booking.id)),
            }
            if booking.status.holds_seat() {
                let same_seat: Vec<Booking> = tables
                    .bookings
                    .values()
                    .filter(|b| b.seat_id == booking.seat_id)
                    .cloned()
                    .collect();
                if find_conflict(&same_seat, &booking.window(), Some(booking.id)).is_some() {
                    return Err(BookingError::Conflict {
                        seat_id: booking.seat_id,
                    });
                }
            }
            tables.bookings.insert(booking.id, booking);
            Ok(true)
        })
    }
}

impl PaymentStore for InMemoryStore {
    fn insert_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            let mut tables = self.tables();
            if tables
                .transactions
                .iter()
                .any(|t| t.idempotency_key == transaction.idempotency_key)
            {
                return Err(BookingError::Store(format!(
                    "duplicate idempotency key {}",
                    transaction.idempotency_key
                )));
            }
            tables.transactions.push(transaction);
            Ok(())
        })
    }

    fn update_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            let mut tables = self.tables();
            let stored = tables
                .transactions
                .iter_mut()
                .find(|t| t.id == transaction.id)
                .ok_or_else(|| BookingError::not_found("PaymentTransaction", transaction.id))?;
            *stored = transaction;
            Ok(())
        })
    }

    fn update_transaction_if(
        &self,
        transaction: PaymentTransaction,
        expected: PaymentStatus,
    ) -> BoxFuture<'_, BookingResult<bool>> {
        Box::pin(async move {
            let mut tables = self.tables();
            let stored = tables
                .transactions
                .iter_mut()
                .find(|t| t.id == transaction.id)
                .ok_or_else(|| BookingError::not_found("PaymentTransaction", transaction.id))?;
            if stored.status != expected {
                return Ok(false);
            }
            *stored = transaction;
            Ok(true)
        })
    }

    fn find_transaction(
        &self,
        id: PaymentTransactionId,
    ) -> BoxFuture<'_, BookingResult<Option<PaymentTransaction>>> {
        Box::pin(async move {
            Ok(self.tables().transactions.iter().find(|t| t.id == id).cloned())
        })
    }

    fn find_by_gateway_order(
        &self,
        gateway: GatewayKind,
        gateway_order_id: String,
    ) -> BoxFuture<'_, BookingResult<Option<PaymentTransaction>>> {
        Box::pin(async move {
            Ok(self
                .tables()
                .transactions
                .iter()
                .find(|t| {
                    t.gateway == gateway
                        && t.gateway_order_id.as_deref() == Some(gateway_order_id.as_str())
                })
                .cloned())
        })
    }

    fn transactions_for_booking(
        &self,
        booking_id: BookingId,
    ) -> BoxFuture<'_, BookingResult<Vec<PaymentTransaction>>> {
        Box::pin(async move {
            let mut transactions: Vec<PaymentTransaction> = self
                .tables()
                .transactions
                .iter()
                .filter(|t| t.booking_id == booking_id)
                .cloned()
                .collect();
            transactions.sort_by_key(|t| t.attempt);
            Ok(transactions)
        })
    }
}

impl WalletStore for InMemoryStore {
    fn find_wallet(
        &self,
        tenant_id: TenantId,
        channel: Channel,
    ) -> BoxFuture<'_, BookingResult<Option<CreditWallet>>> {
        Box::pin(async move { Ok(self.tables().wallets.get(&(tenant_id, channel)).cloned()) })
    }

    fn debit(
        &self,
        tenant_id: TenantId,
        channel: Channel,
        units: u64,
        cost: Money,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, BookingResult<DebitOutcome>> {
        Box::pin(async move {
            let mut tables = self.tables();
            let Some(wallet) = tables.wallets.get_mut(&(tenant_id, channel)) else {
                return Ok(DebitOutcome::Insufficient { available: 0 });
            };
            if wallet.balance < units {
                return Ok(DebitOutcome::Insufficient {
                    available: wallet.balance,
                });
            }

            let total_spent = wallet
                .total_spent
                .checked_add(cost)
                .ok_or_else(|| BookingError::Store("total_spent overflow".to_string()))?;
            wallet.balance -= units;
            wallet.total_spent = total_spent;
            let remaining = wallet.balance;

            tables.ledger.push(LedgerEntry {
                id: Uuid::new_v4(),
                tenant_id,
                channel,
                kind: LedgerEntryKind::Usage,
                units,
                cost,
                balance_after: remaining,
                created_at: at,
            });
            Ok(DebitOutcome::Debited { remaining })
        })
    }

    fn credit(
        &self,
        tenant_id: TenantId,
        channel: Channel,
        units: u64,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, BookingResult<u64>> {
        Box::pin(async move {
            let mut tables = self.tables();
            let wallet = tables
                .wallets
                .entry((tenant_id, channel))
                .or_insert(CreditWallet {
                    tenant_id,
                    channel,
                    balance: 0,
                    total_spent: Money::ZERO,
                });
            wallet.balance = wallet
                .balance
                .checked_add(units)
                .ok_or_else(|| BookingError::validation("credit balance overflow"))?;
            let balance = wallet.balance;

            tables.ledger.push(LedgerEntry {
                id: Uuid::new_v4(),
                tenant_id,
                channel,
                kind: LedgerEntryKind::Purchase,
                units,
                cost: Money::ZERO,
                balance_after: balance,
                created_at: at,
            });
            Ok(balance)
        })
    }

    fn ledger_entries(
        &self,
        tenant_id: TenantId,
        channel: Channel,
    ) -> BoxFuture<'_, BookingResult<Vec<LedgerEntry>>> {
        Box::pin(async move {
            Ok(self
                .tables()
                .ledger
                .iter()
                .filter(|e| e.tenant_id == tenant_id && e.channel == channel)
                .cloned()
                .collect())
        })
    }
}
