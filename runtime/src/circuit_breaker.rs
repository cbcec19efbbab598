//! Circuit breaker guarding calls to the projection cache.
//!
//! When the cache backend keeps failing, every read would otherwise pay a
//! connection timeout before falling back to the store. The breaker opens
//! after `failure_threshold` consecutive failures and short-circuits reads
//! straight to the store until `timeout` has passed.
//!
//! # States
//!
//! - **Closed**: calls pass through; consecutive failures are counted.
//! - **Open**: calls are rejected until the timeout elapses.
//! - **HalfOpen**: probe calls pass; `success_threshold` successes close the
//!   circuit, any failure reopens it.
//!
//! # Example
//!
//! ```rust
//! use seat_inventory_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, State};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     "cache",
//!     CircuitBreakerConfig::builder()
//!         .failure_threshold(2)
//!         .timeout(Duration::from_secs(30))
//!         .build(),
//! );
//!
//! assert!(breaker.allows_request());
//! breaker.record_failure();
//! breaker.record_failure();
//! assert_eq!(breaker.state(), State::Open);
//! assert!(!breaker.allows_request());
//! ```

use crate::metrics::CircuitBreakerMetrics;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// Time spent Open before probing again
    pub timeout: Duration,
    /// Successes in `HalfOpen` before closing the circuit
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: usize,
    timeout: Duration,
    success_threshold: usize,
}

impl CircuitBreakerConfigBuilder {
    /// Set the failure threshold (minimum 1).
    #[must_use]
    pub const fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set how long the circuit stays Open.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Set the success threshold (minimum 1).
    #[must_use]
    pub const fn success_threshold(mut self, threshold: usize) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.max(1),
            timeout: self.timeout,
            success_threshold: self.success_threshold.max(1),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Requests pass through normally
    Closed,
    /// Requests are rejected
    Open,
    /// Probing whether the backend recovered
    HalfOpen,
}

impl State {
    const fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: State,
    failures: usize,
    successes: usize,
    opened_at: Option<Instant>,
}

/// Thread-safe circuit breaker.
///
/// The state lock is never held across an `.await`, so a plain mutex is used
/// and every method is synchronous.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker. `name` labels its metrics.
    #[must_use]
    pub const fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, inner: &mut Inner, to: State) {
        if inner.state == to {
            return;
        }
        tracing::info!(breaker = self.name, from = ?inner.state, to = ?to, "Circuit breaker transition");
        inner.state = to;
        inner.failures = 0;
        inner.successes = 0;
        inner.opened_at = (to == State::Open).then(Instant::now);
        CircuitBreakerMetrics::record_state(self.name, to.gauge_value());
    }

    /// Current state. An Open circuit whose timeout elapsed reports `HalfOpen`.
    #[must_use]
    pub fn state(&self) -> State {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state == State::Open
            && inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.timeout)
        {
            self.transition(inner, State::HalfOpen);
        }
    }

    /// Whether a call should be attempted now.
    #[must_use]
    pub fn allows_request(&self) -> bool {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        if inner.state == State::Open {
            CircuitBreakerMetrics::record_rejection(self.name);
            return false;
        }
        true
    }

    /// Report a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match inner.state {
            State::Closed => inner.failures = 0,
            State::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    self.transition(&mut inner, State::Closed);
                }
            }
            State::Open => {}
        }
    }

    /// Report a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match inner.state {
            State::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    self.transition(&mut inner, State::Open);
                }
            }
            State::HalfOpen => self.transition(&mut inner, State::Open),
            State::Open => {}
        }
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, State::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig::builder()
                .failure_threshold(3)
                .success_threshold(2)
                .timeout(timeout)
                .build(),
        )
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let cb = breaker(Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), State::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), State::Open);
        assert!(!cb.allows_request());
    }

    #[test]
    fn test_half_open_recovers_or_reopens() {
        let cb = breaker(Duration::ZERO);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), State::HalfOpen);
        assert!(cb.allows_request());

        cb.record_failure();
        assert_eq!(cb.state(), State::HalfOpen);

        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), State::Closed);
    }

    #[test]
    fn test_reset_closes() {
        let cb = breaker(Duration::from_secs(60));
        for _ in 0..3 {
            cb.record_failure();
        }
        cb.reset();
        assert_eq!(cb.state(), State::Closed);
        assert!(cb.allows_request());
    }
}
