//! # Seat Inventory Runtime
//!
//! Runtime implementation of the seat inventory engine.
//!
//! ## Core Components
//!
//! - **Strategies**: locking, atomic conditional update and optimistic retry
//!   implementations of [`ConcurrencyStrategy`](seat_inventory_core::strategy::ConcurrencyStrategy)
//! - **`BookingCoordinator`**: reserve, issue, cancel and administer events
//! - **`ProjectionCache`**: fenced read-through cache with outage fallback
//! - **Resilience**: retry with jittered backoff, circuit breaker
//! - **Metrics**: Prometheus exporter and recorders
//!
//! ## Example
//!
//! ```ignore
//! use seat_inventory_runtime::{BookingCoordinator, ProjectionCache, build_strategy};
//!
//! let strategy = build_strategy(&config.strategy, ledgers.clone(), Arc::new(NoHoldDelay));
//! let cache = Arc::new(ProjectionCache::new(backend, ledgers.clone(), config.cache));
//! let coordinator = BookingCoordinator::new(strategy, ledgers, bookings, cache, codes, clock);
//!
//! let booking = coordinator.reserve(event_id, 2, customer).await?;
//! coordinator.cancel(booking.id).await?;
//! ```

/// Retry logic with exponential backoff
pub mod retry;

/// Circuit breaker guarding the cache backend
pub mod circuit_breaker;

/// Prometheus metrics for observability
pub mod metrics;

/// Concurrency strategy implementations
pub mod strategies;

/// Read-through projection cache
pub mod projection_cache;

/// Booking orchestration
pub mod coordinator;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use coordinator::BookingCoordinator;
pub use projection_cache::{ProjectionCache, ProjectionCacheConfig};
pub use retry::RetryPolicy;
pub use strategies::{
    AtomicStrategy, HoldHook, LockingStrategy, NoHoldDelay, OptimisticStrategy, StrategyConfig,
    build_strategy,
};
