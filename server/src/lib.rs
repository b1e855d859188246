//! # Seatflow Server
//!
//! Binary support for the booking engine: environment configuration
//! ([`config::Config`]), storage selection and wiring ([`app`]), and startup
//! seed data ([`seed`]).

pub mod app;
pub mod config;
pub mod seed;

pub use app::{Backend, Engine, assemble};
pub use config::Config;
pub use seed::SeedData;
