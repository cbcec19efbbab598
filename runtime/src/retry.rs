//! Bounded retries with exponential backoff and jitter.
//!
//! Used in two places:
//!
//! - the optimistic strategy, which retries revision conflicts
//! - the coordinator, which retries a compensating credit after a failed
//!   booking write
//!
//! # Example
//!
//! ```rust
//! use seat_inventory_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(4)
//!     .initial_delay(Duration::from_millis(2))
//!     .max_delay(Duration::from_millis(50))
//!     .build();
//!
//! let value = retry_with_predicate(
//!     &policy,
//!     || async { Ok::<_, String>(42) },
//!     |err: &String| err.contains("conflict"),
//! )
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use crate::metrics::RetryMetrics;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration.
///
/// `max_retries` counts retries, so an operation runs at most
/// `max_retries + 1` times.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `initial_delay`: 10ms
/// - `max_delay`: 1 second
/// - `multiplier`: 2.0
/// - `jitter`: enabled
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Randomize each delay within `[delay / 2, delay]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Total number of times an operation may run.
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Un-jittered delay before retry number `attempt` (0-based).
    ///
    /// `initial_delay * multiplier^attempt`, capped at `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Delay actually slept before retry number `attempt`.
    #[must_use]
    pub fn backoff(&self, attempt: usize) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let ceiling = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(rand::thread_rng().gen_range(ceiling / 2..=ceiling))
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: usize,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl RetryPolicyBuilder {
    /// Set maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial delay before first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub const fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter: self.jitter,
        }
    }
}

/// Retry every failure until the policy is exhausted.
///
/// # Errors
///
/// Returns the last error once `policy.max_retries` retries have failed.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_predicate(policy, operation, |_| true).await
}

/// Retry only failures for which `is_retryable` returns `true`.
///
/// Non-retryable errors are returned immediately.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last retryable error once the
/// policy is exhausted.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    RetryMetrics::record_success();
                    tracing::debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) => {
                if attempt >= policy.max_retries {
                    RetryMetrics::record_exhausted();
                    tracing::warn!(attempt, error = %err, "Retries exhausted");
                    return Err(err);
                }

                let delay = policy.backoff(attempt);
                RetryMetrics::record_attempt();
                tracing::debug!(
                    attempt,
                    delay_us = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX),
                    error = %err,
                    "Retrying after failure"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
