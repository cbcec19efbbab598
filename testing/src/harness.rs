//! Fully wired coordinator over in-memory doubles.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test infrastructure
#![allow(clippy::missing_panics_doc)]

use crate::mocks::{FixedDelay, SequentialCodeGenerator, test_clock};
use crate::{InMemoryBookingStore, InMemoryCacheBackend, InMemoryLedgerStore};
use seat_inventory_core::environment::Clock;
use seat_inventory_core::strategy::StrategyKind;
use seat_inventory_core::types::{CustomerInfo, EventDetails, EventId, Money, NewEvent};
use seat_inventory_runtime::circuit_breaker::CircuitBreakerConfig;
use seat_inventory_runtime::projection_cache::{ProjectionCache, ProjectionCacheConfig};
use seat_inventory_runtime::retry::RetryPolicy;
use seat_inventory_runtime::strategies::{StrategyConfig, build_strategy};
use seat_inventory_runtime::BookingCoordinator;
use std::sync::Arc;
use std::time::Duration;

/// In-memory stores, cache and a coordinator built on them.
pub struct TestHarness {
    /// Authoritative event rows
    pub ledgers: Arc<InMemoryLedgerStore>,
    /// Authoritative bookings
    pub bookings: Arc<InMemoryBookingStore>,
    /// Cache backend behind the projection cache
    pub cache_backend: Arc<InMemoryCacheBackend>,
    /// Projection cache shared with the coordinator
    pub cache: Arc<ProjectionCache>,
    /// Coordinator under test
    pub coordinator: BookingCoordinator,
}

impl TestHarness {
    /// Harness with default settings for `kind`.
    #[must_use]
    pub fn new(kind: StrategyKind) -> Self {
        Self::builder(kind).build()
    }

    /// Customizable harness.
    #[must_use]
    pub fn builder(kind: StrategyKind) -> HarnessBuilder {
        HarnessBuilder {
            kind,
            store_latency: Duration::ZERO,
            hold_delay: Duration::ZERO,
            lock_wait: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(5),
            optimistic_retry: RetryPolicy::builder()
                .max_retries(100)
                .initial_delay(Duration::from_millis(1))
                .max_delay(Duration::from_millis(10))
                .build(),
            cache_ttl: Duration::from_secs(60),
            breaker: CircuitBreakerConfig::builder()
                .failure_threshold(3)
                .timeout(Duration::from_secs(30))
                .build(),
        }
    }

    /// Another coordinator over the same stores and cache, with its own code
    /// generator and the given strategy.
    #[must_use]
    pub fn sibling_coordinator(&self, kind: StrategyKind) -> BookingCoordinator {
        let config = StrategyConfig {
            kind,
            ..StrategyConfig::default()
        };
        BookingCoordinator::new(
            build_strategy(&config, self.ledgers.clone(), Arc::new(FixedDelay(Duration::ZERO))),
            self.ledgers.clone(),
            self.bookings.clone(),
            Arc::clone(&self.cache),
            Arc::new(SequentialCodeGenerator::new()),
            Arc::new(test_clock()),
        )
    }

    /// A valid customer.
    #[must_use]
    pub fn customer(&self) -> CustomerInfo {
        CustomerInfo::new("Test Customer", "customer@example.com")
    }

    /// Create an event priced at 25.00 per seat and return its id.
    pub async fn create_event(&self, capacity: u32) -> EventId {
        self.coordinator
            .create_event(sample_event(capacity))
            .await
            .expect("event creation should succeed")
            .event_id
    }

    /// Assert the ledger invariants for an event:
    /// `0 <= available <= total` and active seats equal sold seats.
    pub fn assert_consistent(&self, event_id: EventId) {
        let ledger = self.ledgers.ledger(event_id).expect("event should exist");
        assert!(
            ledger.is_consistent(),
            "ledger out of bounds: {ledger:?}"
        );
        assert_eq!(
            self.bookings.active_seats(event_id),
            u64::from(ledger.sold()),
            "active bookings disagree with sold seats: {ledger:?}"
        );
    }
}

/// An event definition with sensible defaults.
#[must_use]
pub fn sample_event(capacity: u32) -> NewEvent {
    NewEvent {
        details: EventDetails {
            name: "Test Concert".to_string(),
            description: Some("Integration test event".to_string()),
            venue: "Test Arena".to_string(),
            event_date: test_clock().now() + chrono::Duration::days(30),
            price: Money::from_cents(2_500),
        },
        total_capacity: capacity,
    }
}

/// Builder for [`TestHarness`].
#[derive(Debug, Clone)]
pub struct HarnessBuilder {
    kind: StrategyKind,
    store_latency: Duration,
    hold_delay: Duration,
    lock_wait: Duration,
    statement_timeout: Duration,
    optimistic_retry: RetryPolicy,
    cache_ttl: Duration,
    breaker: CircuitBreakerConfig,
}

impl HarnessBuilder {
    /// Delay every ledger store call.
    #[must_use]
    pub const fn store_latency(mut self, latency: Duration) -> Self {
        self.store_latency = latency;
        self
    }

    /// Sleep while the locking strategy holds a row.
    #[must_use]
    pub const fn hold_delay(mut self, delay: Duration) -> Self {
        self.hold_delay = delay;
        self
    }

    /// Maximum wait for a row hold.
    #[must_use]
    pub const fn lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Limit for each guarded ledger statement.
    #[must_use]
    pub const fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Optimistic retry bound.
    #[must_use]
    pub fn optimistic_retry(mut self, policy: RetryPolicy) -> Self {
        self.optimistic_retry = policy;
        self
    }

    /// Projection cache entry lifetime.
    #[must_use]
    pub const fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Breaker settings for cache reads.
    #[must_use]
    pub fn breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Wire everything together.
    #[must_use]
    pub fn build(self) -> TestHarness {
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        let ledgers =
            Arc::new(InMemoryLedgerStore::new(Arc::clone(&clock)).with_latency(self.store_latency));
        let bookings = Arc::new(InMemoryBookingStore::new(Arc::clone(&clock)));
        let cache_backend = Arc::new(InMemoryCacheBackend::new());

        let cache = Arc::new(ProjectionCache::new(
            cache_backend.clone(),
            ledgers.clone(),
            ProjectionCacheConfig {
                ttl: self.cache_ttl,
                key_prefix: "test".to_string(),
                breaker: self.breaker,
            },
        ));

        let strategy_config = StrategyConfig {
            kind: self.kind,
            lock_wait: self.lock_wait,
            statement_timeout: self.statement_timeout,
            optimistic_retry: self.optimistic_retry,
        };
        let strategy = build_strategy(
            &strategy_config,
            ledgers.clone(),
            Arc::new(FixedDelay(self.hold_delay)),
        );

        let coordinator = BookingCoordinator::new(
            strategy,
            ledgers.clone(),
            bookings.clone(),
            Arc::clone(&cache),
            Arc::new(SequentialCodeGenerator::new()),
            clock,
        )
        .with_compensation_policy(
            RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(1))
                .build(),
        );

        TestHarness {
            ledgers,
            bookings,
            cache_backend,
            cache,
            coordinator,
        }
    }
}
