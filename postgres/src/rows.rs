//! Row decoding and integer conversions between domain and SQL types.
//!
//! PostgreSQL has no unsigned integers; counts and money are stored as
//! `BIGINT` and checked on the way in and out.

use seatflow_core::{
    BasisPoints, Booking, BookingError, BookingId, BookingResult, BookingStatus, Channel,
    CreditWallet, GatewayKind, LedgerEntry, LedgerEntryKind, LibraryId, Money, PaymentStatus,
    PaymentTransaction, PaymentTransactionId, Seat, SeatId, SeatStatus, Tenant, TenantId, UserId,
};
use sqlx::Row;
use sqlx::postgres::PgRow;

pub(crate) fn db_error(context: &str, e: &sqlx::Error) -> BookingError {
    BookingError::Store(format!("{context}: {e}"))
}

pub(crate) fn to_i64(value: u64, field: &str) -> BookingResult<i64> {
    i64::try_from(value).map_err(|_| BookingError::Store(format!("{field} out of range: {value}")))
}

fn to_u64(value: i64, field: &str) -> BookingResult<u64> {
    u64::try_from(value).map_err(|_| BookingError::Store(format!("negative {field}: {value}")))
}

fn to_u32(value: i32, field: &str) -> BookingResult<u32> {
    u32::try_from(value).map_err(|_| BookingError::Store(format!("negative {field}: {value}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> BookingResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| db_error(&format!("decode column {column}"), &e))
}

pub(crate) fn tenant(row: &PgRow) -> BookingResult<Tenant> {
    Ok(Tenant {
        id: TenantId::from_uuid(get(row, "id")?),
        commission_rate: BasisPoints::new(to_u32(get(row, "commission_bps")?, "commission_bps")?),
        low_balance_threshold: to_u64(get(row, "low_balance_threshold")?, "low_balance_threshold")?,
        alerts_enabled: get(row, "alerts_enabled")?,
        notification_channel: Channel::parse(get(row, "notification_channel")?)
            .map_err(|e| BookingError::Store(e.to_string()))?,
    })
}

pub(crate) fn seat(row: &PgRow) -> BookingResult<Seat> {
    Ok(Seat {
        id: SeatId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        library_id: LibraryId::from_uuid(get(row, "library_id")?),
        status: SeatStatus::parse(get(row, "status")?)
            .map_err(|e| BookingError::Store(e.to_string()))?,
        hourly_rate: Money::from_minor(to_u64(get(row, "hourly_rate")?, "hourly_rate")?),
    })
}

pub(crate) fn booking(row: &PgRow) -> BookingResult<Booking> {
    let payment_id: Option<uuid::Uuid> = get(row, "payment_id")?;
    Ok(Booking {
        id: BookingId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        seat_id: SeatId::from_uuid(get(row, "seat_id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        start_time: get(row, "start_time")?,
        end_time: get(row, "end_time")?,
        status: BookingStatus::parse(get(row, "status")?)?,
        payment_id: payment_id.map(PaymentTransactionId::from_uuid),
        amount: Money::from_minor(to_u64(get(row, "amount")?, "amount")?),
    })
}

pub(crate) fn transaction(row: &PgRow) -> BookingResult<PaymentTransaction> {
    Ok(PaymentTransaction {
        id: PaymentTransactionId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        booking_id: BookingId::from_uuid(get(row, "booking_id")?),
        gateway: GatewayKind::parse(get(row, "gateway")?)
            .map_err(|e| BookingError::Store(e.to_string()))?,
        gateway_order_id: get(row, "gateway_order_id")?,
        status: PaymentStatus::parse(get(row, "status")?)
            .map_err(|e| BookingError::Store(e.to_string()))?,
        idempotency_key: get(row, "idempotency_key")?,
        amount: Money::from_minor(to_u64(get(row, "amount")?, "amount")?),
        attempt: to_u32(get(row, "attempt")?, "attempt")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn wallet(row: &PgRow) -> BookingResult<CreditWallet> {
    Ok(CreditWallet {
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        channel: Channel::parse(get(row, "channel")?)
            .map_err(|e| BookingError::Store(e.to_string()))?,
        balance: to_u64(get(row, "balance")?, "balance")?,
        total_spent: Money::from_minor(to_u64(get(row, "total_spent")?, "total_spent")?),
    })
}

pub(crate) fn ledger_entry(row: &PgRow) -> BookingResult<LedgerEntry> {
    Ok(LedgerEntry {
        id: get(row, "id")?,
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        channel: Channel::parse(get(row, "channel")?)
            .map_err(|e| BookingError::Store(e.to_string()))?,
        kind: LedgerEntryKind::parse(get(row, "kind")?)?,
        units: to_u64(get(row, "units")?, "units")?,
        cost: Money::from_minor(to_u64(get(row, "cost")?, "cost")?),
        balance_after: to_u64(get(row, "balance_after")?, "balance_after")?,
        created_at: get(row, "created_at")?,
    })
}
