//! # Ticketing
//!
//! Wires the seat inventory engine to real infrastructure:
//!
//! - [`Config`]: environment-driven configuration
//! - [`ResourceManager`]: `PostgreSQL` pool, migrations, Redis cache backend
//! - [`build_coordinator`]: a `BookingCoordinator` using the configured strategy
//!
//! The `demo` binary runs a contention scenario against these resources.

pub mod bootstrap;
pub mod config;

pub use bootstrap::{BootstrapError, ResourceManager, build_coordinator};
pub use config::Config;
