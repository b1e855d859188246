//! # Seatflow Core
//!
//! Domain types and pure rules for the Seatflow booking engine.
//!
//! This crate decides *what* is allowed; the runtime crate decides *when*
//! and under which locks it happens.
//!
//! ## Components
//!
//! - **[`TenantContext`]**: resolved calling tenant plus its data connection;
//!   every operation takes one, nothing reads tenant state from a global
//! - **[`BookingConflictDetector`]**: window validation and overlap checks
//! - **[`BookingStateMachine`]**: the booking lifecycle and refund rule
//! - **[`PaymentGateway`]** and [`select_gateway`]: processor contract and
//!   deterministic fee-based selection
//! - **Store traits** ([`DataStore`]): object-safe persistence seams
//!
//! ## Example
//!
//! ```
//! use seatflow_core::{select_gateway, FeeSchedules, GatewayKind, Money};
//!
//! // 600.00 is the break-even amount of the default fee schedules.
//! let fees = FeeSchedules::default();
//! let decision = select_gateway(Money::from_minor(60_000), &fees, GatewayKind::GatewayA);
//! assert_eq!(decision.gateway, GatewayKind::GatewayA);
//! ```

pub mod alerts;
pub mod conflict;
pub mod environment;
pub mod error;
pub mod gateway;
pub mod policy;
pub mod state_machine;
pub mod store;
pub mod tenant;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub use alerts::{AlertSink, LowBalanceAlert};
pub use conflict::{BookingConflictDetector, find_conflict, windows_overlap};
pub use environment::{Clock, SystemClock};
pub use error::{BookingError, BookingResult};
pub use gateway::{
    ChargeReceipt, FeeSchedule, FeeSchedules, GatewayError, PaymentGateway, PaymentRequest,
    RouteReason, RoutingDecision, WebhookEvent, select_gateway,
};
pub use policy::{BookingPolicy, CreditRates};
pub use state_machine::{BookingStateMachine, allowed_transitions, can_transition};
pub use store::{
    BookingStore, DataStore, DebitOutcome, PaymentStore, SeatStore, TenantStore, WalletStore,
};
pub use tenant::{Owned, TenantContext};
pub use types::{
    BasisPoints, Booking, BookingId, BookingStatus, Channel, CreditBalances, CreditWallet,
    GatewayKind, LedgerEntry, LedgerEntryKind, LibraryId, Money, PaymentStatus, PaymentTransaction,
    PaymentTransactionId, Seat, SeatId, SeatStatus, Tenant, TenantId, TimeWindow, UserId,
    idempotency_key,
};
