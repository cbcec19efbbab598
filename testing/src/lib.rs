//! # Seat Inventory Testing
//!
//! Testing utilities for the seat inventory engine.
//!
//! This crate provides:
//! - In-memory ledger store, booking store and cache backend, with latency,
//!   failure and outage injection
//! - Deterministic environment mocks (`FixedClock`, `SequentialCodeGenerator`)
//! - A `FixedDelay` hold hook that widens the locking strategy's critical section
//! - [`TestHarness`], which wires all of the above into a `BookingCoordinator`
//!
//! ## Example
//!
//! ```ignore
//! use seat_inventory_testing::TestHarness;
//! use seat_inventory_core::StrategyKind;
//!
//! #[tokio::test]
//! async fn reserve_then_cancel() {
//!     let harness = TestHarness::new(StrategyKind::Atomic);
//!     let event_id = harness.create_event(10).await;
//!
//!     let booking = harness.coordinator.reserve(event_id, 3, harness.customer()).await.unwrap();
//!     harness.coordinator.cancel(booking.id).await.unwrap();
//!
//!     harness.assert_consistent(event_id);
//! }
//! ```

mod booking_store;
mod cache_backend;
mod harness;
mod ledger_store;

pub use booking_store::InMemoryBookingStore;
pub use cache_backend::InMemoryCacheBackend;
pub use harness::{HarnessBuilder, TestHarness, sample_event};
pub use ledger_store::InMemoryLedgerStore;

/// Mock implementations of environment traits.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use futures::future::BoxFuture;
    use seat_inventory_core::environment::{Clock, CodeGenerator};
    use seat_inventory_core::ledger::SeatLedger;
    use seat_inventory_core::types::{BookingCode, BookingKind};
    use seat_inventory_runtime::strategies::HoldHook;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use seat_inventory_testing::mocks::FixedClock;
    /// use seat_inventory_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Fixed clock at 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }

    /// Predictable booking codes: `RES-00000001`, `RES-00000002`, …
    ///
    /// Two generators share no state, so two coordinators each holding one
    /// will collide on their first code, which exercises regeneration.
    #[derive(Debug)]
    pub struct SequentialCodeGenerator {
        next: AtomicU64,
    }

    impl Default for SequentialCodeGenerator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SequentialCodeGenerator {
        /// Start at 1
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(1),
            }
        }
    }

    impl CodeGenerator for SequentialCodeGenerator {
        fn generate(&self, kind: BookingKind) -> BookingCode {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            BookingCode::new(format!("{}-{n:08}", kind.code_prefix()))
        }
    }

    /// Hold hook that sleeps while the row is held.
    #[derive(Debug, Clone, Copy)]
    pub struct FixedDelay(pub Duration);

    impl HoldHook for FixedDelay {
        fn while_held<'a>(&'a self, _ledger: &'a SeatLedger) -> BoxFuture<'a, ()> {
            Box::pin(tokio::time::sleep(self.0))
        }
    }
}

/// Install a `tracing` subscriber for test output, honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, FixedDelay, SequentialCodeGenerator, test_clock};
