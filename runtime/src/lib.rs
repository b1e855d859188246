//! # Seatflow Runtime
//!
//! The concurrent half of the booking engine: everything that waits on a
//! lock, a store or a payment processor.
//!
//! - [`BookingOrchestrator`]: validate, lock, commit `pending`, pay, finalize
//! - [`PaymentGatewayRouter`]: processor choice, timeouts, single failover
//! - [`CreditLedger`]: atomic credit debits with low-balance alerts
//! - [`WebhookProcessor`]: signed processor callbacks
//! - [`InMemoryStore`]: process-local implementation of every store trait
//! - [`gateways`]: HTTP clients for both processors
//!
//! ## Example
//!
//! ```ignore
//! let router = Arc::new(PaymentGatewayRouter::new(gateway_a, gateway_b, FeeSchedules::default(), &policy, clock.clone()));
//! let orchestrator = BookingOrchestrator::new(policy, router, clock);
//!
//! let ctx = TenantContext::resolve(tenant_id, store).await?;
//! let confirmation = orchestrator.create_booking(&ctx, request).await?;
//! assert_eq!(confirmation.booking.status, BookingStatus::Confirmed);
//! ```

pub mod credits;
pub mod gateways;
pub mod locks;
pub mod memory;
pub mod metrics;
pub mod notifications;
pub mod orchestrator;
pub mod router;
pub mod webhooks;

pub use credits::{ChannelAlertSink, CreditLedger, DebitReceipt};
pub use locks::{SeatGuard, SeatLockRegistry};
pub use memory::InMemoryStore;
pub use notifications::{BookingNotifier, NotificationOutcome, OutboundMessage};
pub use orchestrator::{
    BookingConfirmation, BookingDetails, BookingOrchestrator, BookingRequest, Cancellation,
};
pub use router::{MAX_ATTEMPTS, PaymentGatewayRouter, PaymentOutcome};
pub use webhooks::{WebhookError, WebhookOutcome, WebhookProcessor};
