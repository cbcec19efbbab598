//! Prometheus metrics for the seat inventory engine.
//!
//! Covered components:
//!
//! - Seat mutations per strategy (debit/credit outcome and latency)
//! - Booking lifecycle (created, cancelled, compensated)
//! - Projection cache (hits, misses, outage fallbacks, invalidation failures)
//! - Circuit breaker and retry behaviour
//!
//! # Example
//!
//! ```rust,no_run
//! use seat_inventory_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Installs the global recorder and serves `/metrics` on `addr`.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder and spawn the HTTP exporter on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (common in tests), this logs a
    /// warning and leaves `handle()` empty.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();
        let addr = self.addr;
        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                // The exporter's error type has no Display or Debug impl.
                tokio::spawn(async move {
                    if exporter.await.is_err() {
                        tracing::error!(addr = %addr, "Metrics exporter stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
                Ok(())
            }
            Err(_) => {
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                Ok(())
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Seat mutations
    describe_counter!(
        "inventory_debits_total",
        "Seat debits by strategy and outcome"
    );
    describe_counter!(
        "inventory_credits_total",
        "Seat credits by strategy and outcome"
    );
    describe_histogram!(
        "inventory_mutation_duration_seconds",
        "Time taken by a strategy to debit or credit seats"
    );
    describe_histogram!(
        "inventory_lock_wait_duration_seconds",
        "Time spent waiting for an exclusive ledger hold"
    );
    describe_counter!(
        "inventory_optimistic_conflicts_total",
        "Revision conflicts observed by the optimistic strategy"
    );

    // Bookings
    describe_counter!("bookings_created_total", "Bookings persisted, by kind");
    describe_counter!("bookings_cancelled_total", "Bookings cancelled, by kind");
    describe_counter!(
        "booking_compensations_total",
        "Compensating credits after a failed booking write, by outcome"
    );

    // Projection cache
    describe_counter!("projection_cache_hits_total", "Projection reads served from cache");
    describe_counter!(
        "projection_cache_misses_total",
        "Projection reads that went to the store on a miss"
    );
    describe_counter!(
        "projection_cache_fallbacks_total",
        "Projection reads that went to the store because the cache was unavailable"
    );
    describe_counter!(
        "projection_cache_stale_discards_total",
        "Cached projections discarded because they predate the invalidation fence"
    );
    describe_counter!(
        "projection_cache_invalidation_failures_total",
        "Invalidations that could not reach the cache"
    );

    // Circuit Breaker Metrics
    describe_gauge!(
        "circuit_breaker_state",
        "Current circuit breaker state (0=closed, 1=half-open, 2=open)"
    );
    describe_counter!(
        "circuit_breaker_rejections_total",
        "Calls short-circuited while the breaker was open"
    );

    // Retry Metrics
    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!(
        "retry_successes_total",
        "Operations that succeeded after at least one retry"
    );
    describe_counter!(
        "retry_exhausted_total",
        "Operations that failed after exhausting retries"
    );
}

/// Seat mutation and booking metrics recorder.
pub struct InventoryMetrics;

impl InventoryMetrics {
    /// Record a debit attempt.
    pub fn record_debit(strategy: &'static str, outcome: &'static str, duration: Duration) {
        counter!("inventory_debits_total", "strategy" => strategy, "outcome" => outcome)
            .increment(1);
        histogram!("inventory_mutation_duration_seconds", "strategy" => strategy, "op" => "debit")
            .record(duration.as_secs_f64());
    }

    /// Record a credit attempt.
    pub fn record_credit(strategy: &'static str, outcome: &'static str, duration: Duration) {
        counter!("inventory_credits_total", "strategy" => strategy, "outcome" => outcome)
            .increment(1);
        histogram!("inventory_mutation_duration_seconds", "strategy" => strategy, "op" => "credit")
            .record(duration.as_secs_f64());
    }

    /// Record time spent acquiring a ledger hold.
    pub fn record_lock_wait(duration: Duration) {
        histogram!("inventory_lock_wait_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a lost compare-and-set.
    pub fn record_conflict() {
        counter!("inventory_optimistic_conflicts_total").increment(1);
    }

    /// Record a persisted booking.
    pub fn record_booking_created(kind: &'static str) {
        counter!("bookings_created_total", "kind" => kind).increment(1);
    }

    /// Record a cancelled booking.
    pub fn record_booking_cancelled(kind: &'static str) {
        counter!("bookings_cancelled_total", "kind" => kind).increment(1);
    }

    /// Record a compensating credit (`"applied"` or `"failed"`).
    pub fn record_compensation(outcome: &'static str) {
        counter!("booking_compensations_total", "outcome" => outcome).increment(1);
    }
}

/// Projection cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a cache hit.
    pub fn record_hit() {
        counter!("projection_cache_hits_total").increment(1);
    }

    /// Record a cache miss.
    pub fn record_miss() {
        counter!("projection_cache_misses_total").increment(1);
    }

    /// Record a read served from the store because the cache was unavailable.
    pub fn record_fallback() {
        counter!("projection_cache_fallbacks_total").increment(1);
    }

    /// Record a cached projection rejected by its fence.
    pub fn record_stale_discard() {
        counter!("projection_cache_stale_discards_total").increment(1);
    }

    /// Record a failed invalidation.
    pub fn record_invalidation_failure() {
        counter!("projection_cache_invalidation_failures_total").increment(1);
    }
}

/// Circuit breaker metrics recorder.
pub struct CircuitBreakerMetrics;

impl CircuitBreakerMetrics {
    /// Record circuit breaker state.
    ///
    /// 0 = Closed, 1 = `HalfOpen`, 2 = Open
    pub fn record_state(name: &'static str, state: f64) {
        gauge!("circuit_breaker_state", "breaker" => name).set(state);
    }

    /// Record a rejected call (circuit open).
    pub fn record_rejection(name: &'static str) {
        counter!("circuit_breaker_rejections_total", "breaker" => name).increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}
