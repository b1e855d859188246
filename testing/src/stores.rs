//! Store wrappers for concurrency tests.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use seatflow_core::{
    Booking, BookingId, BookingResult, BookingStatus, BookingStore, Channel, CreditWallet,
    DebitOutcome, GatewayKind, LedgerEntry, Money, PaymentStatus, PaymentStore,
    PaymentTransaction, PaymentTransactionId, Seat, SeatId, SeatStore, Tenant, TenantId,
    TenantStore, TimeWindow, WalletStore,
};
use seatflow_runtime::InMemoryStore;
use std::sync::Arc;

/// [`InMemoryStore`] that yields to the scheduler before every call.
///
/// The in-memory store answers without ever suspending, so two tasks racing
/// through the engine would run one after the other. Yielding first lets
/// their reads and writes interleave the way they do against a networked
/// database.
#[derive(Debug, Clone)]
pub struct YieldingStore {
    inner: Arc<InMemoryStore>,
}

impl YieldingStore {
    /// Wrap `inner`; both handles see the same data.
    #[must_use]
    pub const fn new(inner: Arc<InMemoryStore>) -> Self {
        Self { inner }
    }
}

impl TenantStore for YieldingStore {
    fn find_tenant(&self, id: TenantId) -> BoxFuture<'_, BookingResult<Option<Tenant>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.find_tenant(id).await
        })
    }
}

impl SeatStore for YieldingStore {
    fn find_seat(&self, id: SeatId) -> BoxFuture<'_, BookingResult<Option<Seat>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.find_seat(id).await
        })
    }
}

impl BookingStore for YieldingStore {
    fn find_booking(&self, id: BookingId) -> BoxFuture<'_, BookingResult<Option<Booking>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.find_booking(id).await
        })
    }

    fn live_bookings_for_seat(
        &self,
        seat_id: SeatId,
        window: TimeWindow,
    ) -> BoxFuture<'_, BookingResult<Vec<Booking>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.live_bookings_for_seat(seat_id, window).await
        })
    }

    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.insert_booking(booking).await
        })
    }

    fn update_booking(
        &self,
        booking: Booking,
        expected: BookingStatus,
    ) -> BoxFuture<'_, BookingResult<bool>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.update_booking(booking, expected).await
        })
    }
}

impl PaymentStore for YieldingStore {
    fn insert_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.insert_transaction(transaction).await
        })
    }

    fn update_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.update_transaction(transaction).await
        })
    }

    fn update_transaction_if(
        &self,
        transaction: PaymentTransaction,
        expected: PaymentStatus,
    ) -> BoxFuture<'_, BookingResult<bool>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.update_transaction_if(transaction, expected).await
        })
    }

    fn find_transaction(
        &self,
        id: PaymentTransactionId,
    ) -> BoxFuture<'_, BookingResult<Option<PaymentTransaction>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.find_transaction(id).await
        })
    }

    fn find_by_gateway_order(
        &self,
        gateway: GatewayKind,
        gateway_order_id: String,
    ) -> BoxFuture<'_, BookingResult<Option<PaymentTransaction>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.find_by_gateway_order(gateway, gateway_order_id).await
        })
    }

    fn transactions_for_booking(
        &self,
        booking_id: BookingId,
    ) -> BoxFuture<'_, BookingResult<Vec<PaymentTransaction>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.transactions_for_booking(booking_id).await
        })
    }
}

impl WalletStore for YieldingStore {
    fn find_wallet(
        &self,
        tenant_id: TenantId,
        channel: Channel,
    ) -> BoxFuture<'_, BookingResult<Option<CreditWallet>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.find_wallet(tenant_id, channel).await
        })
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
            tokio::task::yield_now().await;
            self.inner.debit(tenant_id, channel, units, cost, at).await
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
            tokio::task::yield_now().await;
            self.inner.credit(tenant_id, channel, units, at).await
        })
    }

    fn ledger_entries(
        &self,
        tenant_id: TenantId,
        channel: Channel,
    ) -> BoxFuture<'_, BookingResult<Vec<LedgerEntry>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.inner.ledger_entries(tenant_id, channel).await
        })
    }
}
