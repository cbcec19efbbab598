//! Pessimistic strategy: hold the row, check, write, release.

use super::outcome;
use crate::metrics::InventoryMetrics;
use futures::future::BoxFuture;
use seat_inventory_core::error::{InventoryError, StoreError};
use seat_inventory_core::ledger::{SeatLedger, validate_seats};
use seat_inventory_core::store::LedgerStore;
use seat_inventory_core::strategy::{ConcurrencyStrategy, StrategyKind};
use seat_inventory_core::types::EventId;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Work performed while the exclusive hold is taken, before the capacity check.
///
/// Production uses [`NoHoldDelay`]. Tests and demos inject an artificial delay
/// to widen the critical section and make queueing observable.
pub trait HoldHook: Send + Sync {
    /// Called with the ledger as observed under the hold.
    fn while_held<'a>(&'a self, ledger: &'a SeatLedger) -> BoxFuture<'a, ()>;
}

/// Hold hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHoldDelay;

impl HoldHook for NoHoldDelay {
    fn while_held<'a>(&'a self, _ledger: &'a SeatLedger) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

/// Debits and credits under an exclusive hold on the event row.
///
/// Callers on the same event queue behind one another. Acquisition is bounded
/// by `lock_wait`; a caller that cannot get the hold in time fails with
/// [`InventoryError::Timeout`] instead of waiting forever.
pub struct LockingStrategy {
    store: Arc<dyn LedgerStore>,
    lock_wait: Duration,
    hook: Arc<dyn HoldHook>,
}

impl LockingStrategy {
    /// Create a locking strategy with no hold delay.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, lock_wait: Duration) -> Self {
        Self {
            store,
            lock_wait,
            hook: Arc::new(NoHoldDelay),
        }
    }

    /// Replace the hold hook.
    #[must_use]
    pub fn with_hold_hook(mut self, hook: Arc<dyn HoldHook>) -> Self {
        self.hook = hook;
        self
    }

    async fn apply<F>(&self, event_id: EventId, change: F) -> Result<SeatLedger, InventoryError>
    where
        F: FnOnce(&SeatLedger) -> Result<SeatLedger, InventoryError> + Send,
    {
        let started = Instant::now();
        let lock = match self.store.lock(event_id, self.lock_wait).await {
            Ok(Some(lock)) => lock,
            Ok(None) => return Err(InventoryError::LedgerNotFound(event_id)),
            Err(StoreError::LockTimeout) => {
                return Err(InventoryError::Timeout {
                    event_id,
                    waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                });
            }
            Err(err) => return Err(err.into()),
        };
        InventoryMetrics::record_lock_wait(started.elapsed());

        let observed = *lock.ledger();
        self.hook.while_held(&observed).await;

        // An error here drops the lock, which releases the hold unchanged.
        let next = change(&observed)?;
        Ok(lock.commit(next.available_seats).await?)
    }
}

impl ConcurrencyStrategy for LockingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Locking
    }

    fn debit(&self, event_id: EventId, seats: u32) -> BoxFuture<'_, Result<SeatLedger, InventoryError>> {
        Box::pin(async move {
            validate_seats(seats)?;
            let started = Instant::now();
            let result = self.apply(event_id, |ledger| ledger.debited(seats)).await;
            InventoryMetrics::record_debit("locking", outcome(&result), started.elapsed());
            result
        })
    }

    fn credit(&self, event_id: EventId, seats: u32) -> BoxFuture<'_, Result<SeatLedger, InventoryError>> {
        Box::pin(async move {
            validate_seats(seats)?;
            let started = Instant::now();
            let result = self.apply(event_id, |ledger| ledger.credited(seats)).await;
            InventoryMetrics::record_credit("locking", outcome(&result), started.elapsed());
            result
        })
    }
}
