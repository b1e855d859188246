//! # Seatflow Testing
//!
//! Testing utilities and fakes for the Seatflow booking engine.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic, manually advanced time
//! - [`ScriptedGateway`]: a payment processor that follows a script
//! - [`RecordingAlertSink`]: captures low-balance alerts
//! - [`TestWorld`]: a fully wired engine over an in-memory store
//! - [`YieldingStore`]: an in-memory store whose calls suspend, for race tests
//! - [`properties`]: proptest strategies for domain values
//!
//! No fake here touches the network.
//!
//! ## Example
//!
//! ```ignore
//! use seatflow_testing::{TestWorld, GatewayScript};
//!
//! #[tokio::test]
//! async fn test_failover() {
//!     let world = TestWorld::new();
//!     world.gateway_a.push(GatewayScript::Hang);
//!
//!     let confirmation = world
//!         .orchestrator
//!         .create_booking(&world.ctx(), world.request(10, 12))
//!         .await
//!         .unwrap();
//!     assert_eq!(confirmation.payment.gateway, GatewayKind::GatewayB);
//! }
//! ```

pub mod fixtures;
pub mod gateways;
pub mod mocks;
pub mod properties;
pub mod stores;

// Re-export commonly used items
pub use fixtures::TestWorld;
pub use gateways::{GatewayScript, ScriptedGateway};
pub use mocks::{FixedClock, RecordingAlertSink, init_test_tracing, test_clock};
pub use stores::YieldingStore;
