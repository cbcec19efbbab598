//! # Seat Inventory Core
//!
//! Core types and traits for the seat inventory engine.
//!
//! This crate defines what the engine manipulates and the seams it is built
//! around; it performs no I/O itself.
//!
//! ## Core Concepts
//!
//! - **`SeatLedger`**: total and available seats for one event, plus a revision
//! - **`Booking`**: a customer's claim on seats (reservation or ticket)
//! - **`EventProjection`**: the denormalized view served from cache
//! - **`ConcurrencyStrategy`**: how seats are debited/credited under contention
//! - **`LedgerStore` / `BookingStore`**: the authoritative store
//! - **`CacheBackend`**: the key/value cache behind the projection cache
//!
//! ## Architecture
//!
//! ```text
//!  reserve / cancel                      get_projection
//!         │                                    │
//!         ▼                                    ▼
//!  BookingCoordinator ──invalidate──▶  ProjectionCache ──▶ CacheBackend
//!         │                                    │ miss / outage
//!         ▼                                    ▼
//!  ConcurrencyStrategy ─────────────▶    LedgerStore (authoritative)
//! ```
//!
//! ## Example
//!
//! ```
//! use seat_inventory_core::ledger::SeatLedger;
//! use seat_inventory_core::types::EventId;
//!
//! let ledger = SeatLedger::new(EventId::new(), 10);
//! let after = ledger.debited(6).unwrap();
//! assert_eq!(after.available_seats, 4);
//! assert!(after.debited(6).is_err());
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use futures::future::BoxFuture;
pub use serde::{Deserialize, Serialize};

pub mod cache;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod store;
pub mod strategy;
pub mod types;

pub use cache::CacheBackend;
pub use error::{BookingRef, CacheError, InventoryError, StoreError};
pub use ledger::SeatLedger;
pub use store::{BookingStore, LedgerLock, LedgerStore};
pub use strategy::{ConcurrencyStrategy, StrategyKind};
pub use types::{
    Booking, BookingCode, BookingId, BookingKind, BookingStatus, CustomerInfo, EventDetails,
    EventId, EventProjection, EventRecord, Money, NewEvent,
};
