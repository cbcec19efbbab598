//! The three [`ConcurrencyStrategy`] implementations and a factory that picks
//! one from configuration.
//!
//! All of them are interchangeable behind `Arc<dyn ConcurrencyStrategy>`; the
//! coordinator never knows which one it is driving.

mod atomic;
mod locking;
mod optimistic;

pub use atomic::AtomicStrategy;
pub use locking::{HoldHook, LockingStrategy, NoHoldDelay};
pub use optimistic::OptimisticStrategy;

use crate::retry::RetryPolicy;
use seat_inventory_core::error::InventoryError;
use seat_inventory_core::ledger::SeatLedger;
use seat_inventory_core::store::LedgerStore;
use seat_inventory_core::strategy::{ConcurrencyStrategy, StrategyKind};
use std::sync::Arc;
use std::time::Duration;

/// Settings for every strategy; only the fields of the selected kind are used.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Which strategy to build
    pub kind: StrategyKind,
    /// Locking: maximum wait for the row hold
    pub lock_wait: Duration,
    /// Atomic: maximum duration of the conditional update
    pub statement_timeout: Duration,
    /// Optimistic: retry bound and backoff between lost rounds
    pub optimistic_retry: RetryPolicy,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: StrategyKind::Atomic,
            lock_wait: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(5),
            optimistic_retry: RetryPolicy::builder()
                .max_retries(9)
                .initial_delay(Duration::from_millis(2))
                .max_delay(Duration::from_millis(100))
                .build(),
        }
    }
}

/// Build the strategy named by `config.kind`.
///
/// `hold_hook` only affects [`LockingStrategy`].
#[must_use]
pub fn build_strategy(
    config: &StrategyConfig,
    store: Arc<dyn LedgerStore>,
    hold_hook: Arc<dyn HoldHook>,
) -> Arc<dyn ConcurrencyStrategy> {
    match config.kind {
        StrategyKind::Locking => {
            Arc::new(LockingStrategy::new(store, config.lock_wait).with_hold_hook(hold_hook))
        }
        StrategyKind::Atomic => Arc::new(AtomicStrategy::new(store, config.statement_timeout)),
        StrategyKind::Optimistic => Arc::new(OptimisticStrategy::new(
            store,
            config.optimistic_retry.clone(),
        )),
    }
}

/// Metrics label for a mutation result.
fn outcome(result: &Result<SeatLedger, InventoryError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    }
}
