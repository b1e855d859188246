//! HTTP request handlers, one module per resource.

pub mod bookings;
pub mod credits;
pub mod health;
pub mod seats;
pub mod webhooks;

pub use health::health_check;
