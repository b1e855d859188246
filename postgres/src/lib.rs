//! `PostgreSQL` persistence for the Seatflow booking engine.
//!
//! [`PostgresStore`] implements every store trait of `seatflow-core` on a
//! single sqlx connection pool, so the runtime can share one
//! `Arc<dyn DataStore>` across request handlers exactly as it does with the
//! in-memory store.
//!
//! The schema (see `migrations/`) backs the engine's guarantees with database
//! constraints:
//!
//! - an exclusion constraint over `(seat_id, [start_time, end_time))` for
//!   non-cancelled bookings, so two processes can never persist an overlap
//! - a unique `idempotency_key` per payment attempt
//! - non-negative wallet balances, with debits done as one conditional
//!   `UPDATE` committed together with their ledger row
//!
//! # Example
//!
//! ```no_run
//! use seatflow_postgres::PostgresStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresStore::connect("postgres://localhost/seatflow", 10).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod rows;
pub mod store;

pub use store::PostgresStore;
