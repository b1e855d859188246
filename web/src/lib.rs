//! Axum HTTP surface for the Seatflow booking engine.
//!
//! Handlers are thin: they resolve the calling tenant, translate JSON into
//! runtime calls and map [`BookingError`](seatflow_core::BookingError) into
//! status codes through [`AppError`]. All rules live in `seatflow-core` and
//! `seatflow-runtime`.
//!
//! # Request Flow
//!
//! 1. **Correlate**: the middleware tags the request span with `X-Correlation-ID`
//! 2. **Resolve tenant** from `X-Tenant-Id` (user from `X-User-Id`)
//! 3. **Call** the orchestrator, ledger or webhook processor
//! 4. **Map** the result to JSON or an error body `{ error, message }`
//!
//! # Example
//!
//! ```ignore
//! use seatflow_web::{AppState, build_router};
//!
//! let state = AppState::new(store, orchestrator, ledger, webhooks);
//! let app = build_router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{CorrelationId, CurrentUser, TenantScope};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use routes::build_router;
pub use state::AppState;

/// Header carrying the calling tenant.
pub const TENANT_HEADER: &str = "X-Tenant-Id";

/// Header carrying the calling user (authenticated upstream).
pub const USER_HEADER: &str = "X-User-Id";

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
