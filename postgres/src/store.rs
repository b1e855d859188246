//! sqlx implementation of the Seatflow store traits.

use crate::rows::{self, db_error, to_i64};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use seatflow_core::{
    Booking, BookingError, BookingId, BookingResult, BookingStatus, BookingStore, Channel,
    CreditWallet, DebitOutcome, GatewayKind, LedgerEntry, LedgerEntryKind, Money, PaymentStatus,
    PaymentStore, PaymentTransaction, PaymentTransactionId, Seat, SeatId, SeatStore, Tenant,
    TenantId, TenantStore, TimeWindow, WalletStore,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// SQLSTATE raised by an exclusion constraint.
const EXCLUSION_VIOLATION: &str = "23P01";

const BOOKING_COLUMNS: &str =
    "id, tenant_id, seat_id, user_id, start_time, end_time, status, payment_id, amount";

const TRANSACTION_COLUMNS: &str = "id, tenant_id, booking_id, gateway, gateway_order_id, status, \
     idempotency_key, amount, attempt, created_at";

/// `PostgreSQL`-backed data store.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> BookingResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| db_error("connect", &e))?;
        Ok(Self::from_pool(pool))
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if a migration fails.
    pub async fn migrate(&self) -> BookingResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| BookingError::Store(format!("Migration failed: {e}")))?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or replace a tenant (onboarding happens outside the engine).
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on database failure.
    pub async fn upsert_tenant(&self, tenant: &Tenant) -> BookingResult<()> {
        sqlx::query(
            r"
            INSERT INTO tenants
                (id, commission_bps, low_balance_threshold, alerts_enabled, notification_channel)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                commission_bps = EXCLUDED.commission_bps,
                low_balance_threshold = EXCLUDED.low_balance_threshold,
                alerts_enabled = EXCLUDED.alerts_enabled,
                notification_channel = EXCLUDED.notification_channel
            ",
        )
        .bind(tenant.id.as_uuid())
        .bind(i32::try_from(tenant.commission_rate.value()).unwrap_or(i32::MAX))
        .bind(to_i64(tenant.low_balance_threshold, "low_balance_threshold")?)
        .bind(tenant.alerts_enabled)
        .bind(tenant.notification_channel.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("upsert tenant", &e))?;
        Ok(())
    }

    /// Insert or replace a seat.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on database failure.
    pub async fn upsert_seat(&self, seat: &Seat) -> BookingResult<()> {
        sqlx::query(
            r"
            INSERT INTO seats (id, tenant_id, library_id, status, hourly_rate)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                library_id = EXCLUDED.library_id,
                status = EXCLUDED.status,
                hourly_rate = EXCLUDED.hourly_rate
            ",
        )
        .bind(seat.id.as_uuid())
        .bind(seat.tenant_id.as_uuid())
        .bind(seat.library_id.as_uuid())
        .bind(seat.status.as_str())
        .bind(to_i64(seat.hourly_rate.minor(), "hourly_rate")?)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("upsert seat", &e))?;
        Ok(())
    }

    async fn insert_ledger_row(
        tx: &mut Transaction<'_, Postgres>,
        entry: &LedgerEntry,
    ) -> BookingResult<()> {
        sqlx::query(
            r"
            INSERT INTO credit_ledger
                (id, tenant_id, channel, kind, units, cost, balance_after, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(entry.id)
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.channel.as_str())
        .bind(entry.kind.as_str())
        .bind(to_i64(entry.units, "units")?)
        .bind(to_i64(entry.cost.minor(), "cost")?)
        .bind(to_i64(entry.balance_after, "balance_after")?)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("insert ledger entry", &e))?;
        Ok(())
    }
}

fn is_exclusion_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(EXCLUSION_VIOLATION))
}

impl TenantStore for PostgresStore {
    fn find_tenant(&self, id: TenantId) -> BoxFuture<'_, BookingResult<Option<Tenant>>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, commission_bps, low_balance_threshold, alerts_enabled, notification_channel
                FROM tenants
                WHERE id = $1
                ",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find tenant", &e))?;
            row.as_ref().map(rows::tenant).transpose()
        })
    }
}

impl SeatStore for PostgresStore {
    fn find_seat(&self, id: SeatId) -> BoxFuture<'_, BookingResult<Option<Seat>>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, tenant_id, library_id, status, hourly_rate FROM seats WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find seat", &e))?;
            row.as_ref().map(rows::seat).transpose()
        })
    }
}

impl BookingStore for PostgresStore {
    fn find_booking(&self, id: BookingId) -> BoxFuture<'_, BookingResult<Option<Booking>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find booking", &e))?;
            row.as_ref().map(rows::booking).transpose()
        })
    }

    fn live_bookings_for_seat(
        &self,
        seat_id: SeatId,
        window: TimeWindow,
    ) -> BoxFuture<'_, BookingResult<Vec<Booking>>> {
        Box::pin(async move {
            let found = sqlx::query(&format!(
                r"
                SELECT {BOOKING_COLUMNS}
                FROM bookings
                WHERE seat_id = $1
                  AND status <> 'cancelled'
                  AND start_time < $3
                  AND end_time > $2
                ORDER BY start_time
                "
            ))
            .bind(seat_id.as_uuid())
            .bind(window.start())
            .bind(window.end())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("load seat bookings", &e))?;
            found.iter().map(rows::booking).collect()
        })
    }

    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO bookings
                    (id, tenant_id, seat_id, user_id, start_time, end_time, status, payment_id, amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(booking.id.as_uuid())
            .bind(booking.tenant_id.as_uuid())
            .bind(booking.seat_id.as_uuid())
            .bind(booking.user_id.as_uuid())
            .bind(booking.start_time)
            .bind(booking.end_time)
            .bind(booking.status.as_str())
            .bind(booking.payment_id.map(|id| *id.as_uuid()))
            .bind(to_i64(booking.amount.minor(), "amount")?)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_exclusion_violation(&e) => {
                    tracing::debug!(
                        seat_id = %booking.seat_id,
                        booking_id = %booking.id,
                        "overlap rejected by exclusion constraint"
                    );
                    metrics::counter!("seatflow_store_exclusion_conflicts_total").increment(1);
                    Err(BookingError::Conflict {
                        seat_id: booking.seat_id,
                    })
                }
                Err(e) => Err(db_error("insert booking", &e)),
            }
        })
    }

    fn update_booking(
        &self,
        booking: Booking,
        expected: BookingStatus,
    ) -> BoxFuture<'_, BookingResult<bool>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE bookings
                SET status = $2, payment_id = $3, amount = $4
                WHERE id = $1 AND status = $5
                ",
            )
            .bind(booking.id.as_uuid())
            .bind(booking.status.as_str())
            .bind(booking.payment_id.map(|id| *id.as_uuid()))
            .bind(to_i64(booking.amount.minor(), "amount")?)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await;
            let result = match result {
                Ok(result) => result,
                Err(e) if is_exclusion_violation(&e) => {
                    tracing::debug!(
                        seat_id = %booking.seat_id,
                        booking_id = %booking.id,
                        "status change rejected by exclusion constraint"
                    );
                    metrics::counter!("seatflow_store_exclusion_conflicts_total").increment(1);
                    return Err(BookingError::Conflict {
                        seat_id: booking.seat_id,
                    });
                }
                Err(e) => return Err(db_error("update booking", &e)),
            };

            if result.rows_affected() == 1 {
                return Ok(true);
            }
            // Distinguish a lost race from a missing row.
            match self.find_booking(booking.id).await? {
                Some(_) => Ok(false),
                None => Err(BookingError::not_found("Booking", booking.id)),
            }
        })
    }
}

impl PaymentStore for PostgresStore {
    fn insert_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            sqlx::query(&format!(
                r"
                INSERT INTO payment_transactions ({TRANSACTION_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "
            ))
            .bind(transaction.id.as_uuid())
            .bind(transaction.tenant_id.as_uuid())
            .bind(transaction.booking_id.as_uuid())
            .bind(transaction.gateway.as_str())
            .bind(transaction.gateway_order_id.as_deref())
            .bind(transaction.status.as_str())
            .bind(&transaction.idempotency_key)
            .bind(to_i64(transaction.amount.minor(), "amount")?)
            .bind(i32::try_from(transaction.attempt).unwrap_or(i32::MAX))
            .bind(transaction.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => BookingError::Store(
                    format!("duplicate idempotency key {}", transaction.idempotency_key),
                ),
                _ => db_error("insert payment transaction", &e),
            })?;
            Ok(())
        })
    }

    fn update_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> BoxFuture<'_, BookingResult<()>> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE payment_transactions SET status = $2, gateway_order_id = $3 WHERE id = $1",
            )
            .bind(transaction.id.as_uuid())
            .bind(transaction.status.as_str())
            .bind(transaction.gateway_order_id.as_deref())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update payment transaction", &e))?;

            if result.rows_affected() == 0 {
                return Err(BookingError::not_found("PaymentTransaction", transaction.id));
            }
            Ok(())
        })
    }

    fn update_transaction_if(
        &self,
        transaction: PaymentTransaction,
        expected: PaymentStatus,
    ) -> BoxFuture<'_, BookingResult<bool>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE payment_transactions
                SET status = $2, gateway_order_id = $3
                WHERE id = $1 AND status = $4
                ",
            )
            .bind(transaction.id.as_uuid())
            .bind(transaction.status.as_str())
            .bind(transaction.gateway_order_id.as_deref())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update payment transaction", &e))?;

            if result.rows_affected() == 1 {
                return Ok(true);
            }
            match self.find_transaction(transaction.id).await? {
                Some(_) => Ok(false),
                None => Err(BookingError::not_found("PaymentTransaction", transaction.id)),
            }
        })
    }

    fn find_transaction(
        &self,
        id: PaymentTransactionId,
    ) -> BoxFuture<'_, BookingResult<Option<PaymentTransaction>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM payment_transactions WHERE id = $1"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find payment transaction", &e))?;
            row.as_ref().map(rows::transaction).transpose()
        })
    }

    fn find_by_gateway_order(
        &self,
        gateway: GatewayKind,
        gateway_order_id: String,
    ) -> BoxFuture<'_, BookingResult<Option<PaymentTransaction>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                r"
                SELECT {TRANSACTION_COLUMNS}
                FROM payment_transactions
                WHERE gateway = $1 AND gateway_order_id = $2
                "
            ))
            .bind(gateway.as_str())
            .bind(&gateway_order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find payment by order", &e))?;
            row.as_ref().map(rows::transaction).transpose()
        })
    }

    fn transactions_for_booking(
        &self,
        booking_id: BookingId,
    ) -> BoxFuture<'_, BookingResult<Vec<PaymentTransaction>>> {
        Box::pin(async move {
            let found = sqlx::query(&format!(
                r"
                SELECT {TRANSACTION_COLUMNS}
                FROM payment_transactions
                WHERE booking_id = $1
                ORDER BY attempt
                "
            ))
            .bind(booking_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("load payment history", &e))?;
            found.iter().map(rows::transaction).collect()
        })
    }
}

impl WalletStore for PostgresStore {
    fn find_wallet(
        &self,
        tenant_id: TenantId,
        channel: Channel,
    ) -> BoxFuture<'_, BookingResult<Option<CreditWallet>>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT tenant_id, channel, balance, total_spent
                FROM credit_wallets
                WHERE tenant_id = $1 AND channel = $2
                ",
            )
            .bind(tenant_id.as_uuid())
            .bind(channel.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find wallet", &e))?;
            row.as_ref().map(rows::wallet).transpose()
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
            let units_sql = to_i64(units, "units")?;
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("begin debit", &e))?;

            // The row lock taken by this UPDATE serializes concurrent debits.
            let remaining: Option<i64> = sqlx::query_scalar(
                r"
                UPDATE credit_wallets
                SET balance = balance - $3, total_spent = total_spent + $4
                WHERE tenant_id = $1 AND channel = $2 AND balance >= $3
                RETURNING balance
                ",
            )
            .bind(tenant_id.as_uuid())
            .bind(channel.as_str())
            .bind(units_sql)
            .bind(to_i64(cost.minor(), "cost")?)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("debit wallet", &e))?;

            let Some(remaining) = remaining else {
                let available: Option<i64> = sqlx::query_scalar(
                    "SELECT balance FROM credit_wallets WHERE tenant_id = $1 AND channel = $2",
                )
                .bind(tenant_id.as_uuid())
                .bind(channel.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("read wallet balance", &e))?;
                tx.rollback()
                    .await
                    .map_err(|e| db_error("rollback debit", &e))?;
                return Ok(DebitOutcome::Insufficient {
                    available: available.and_then(|b| u64::try_from(b).ok()).unwrap_or(0),
                });
            };
            let remaining = u64::try_from(remaining)
                .map_err(|_| BookingError::Store(format!("negative balance: {remaining}")))?;

            Self::insert_ledger_row(
                &mut tx,
                &LedgerEntry {
                    id: Uuid::new_v4(),
                    tenant_id,
                    channel,
                    kind: LedgerEntryKind::Usage,
                    units,
                    cost,
                    balance_after: remaining,
                    created_at: at,
                },
            )
            .await?;

            tx.commit().await.map_err(|e| db_error("commit debit", &e))?;
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
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("begin credit", &e))?;

            let balance: i64 = sqlx::query_scalar(
                r"
                INSERT INTO credit_wallets (tenant_id, channel, balance, total_spent)
                VALUES ($1, $2, $3, 0)
                ON CONFLICT (tenant_id, channel)
                DO UPDATE SET balance = credit_wallets.balance + EXCLUDED.balance
                RETURNING balance
                ",
            )
            .bind(tenant_id.as_uuid())
            .bind(channel.as_str())
            .bind(to_i64(units, "units")?)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("credit wallet", &e))?;
            let balance = u64::try_from(balance)
                .map_err(|_| BookingError::Store(format!("negative balance: {balance}")))?;

            Self::insert_ledger_row(
                &mut tx,
                &LedgerEntry {
                    id: Uuid::new_v4(),
                    tenant_id,
                    channel,
                    kind: LedgerEntryKind::Purchase,
                    units,
                    cost: Money::ZERO,
                    balance_after: balance,
                    created_at: at,
                },
            )
            .await?;

            tx.commit().await.map_err(|e| db_error("commit credit", &e))?;
            Ok(balance)
        })
    }

    fn ledger_entries(
        &self,
        tenant_id: TenantId,
        channel: Channel,
    ) -> BoxFuture<'_, BookingResult<Vec<LedgerEntry>>> {
        Box::pin(async move {
            let found = sqlx::query(
                r"
                SELECT id, tenant_id, channel, kind, units, cost, balance_after, created_at
                FROM credit_ledger
                WHERE tenant_id = $1 AND channel = $2
                ORDER BY seq
                ",
            )
            .bind(tenant_id.as_uuid())
            .bind(channel.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("load ledger", &e))?;
            found.iter().map(rows::ledger_entry).collect()
        })
    }
}
