//! Conditional-update strategy: one guarded write, no read-modify-write.

use super::outcome;
use crate::metrics::InventoryMetrics;
use futures::future::BoxFuture;
use seat_inventory_core::error::{InventoryError, StoreError};
use seat_inventory_core::ledger::{SeatLedger, validate_seats};
use seat_inventory_core::store::{LedgerStore, StoreResult};
use seat_inventory_core::strategy::{ConcurrencyStrategy, StrategyKind};
use seat_inventory_core::types::EventId;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Debits with `available_seats -= n WHERE available_seats >= n`.
///
/// The store serializes concurrent writes to the row, so the guard and the
/// write can never be interleaved by another caller. Each statement is bounded
/// by `statement_timeout`, enforced by the store: a statement that runs out
/// of time is rolled back there, so a timeout never hides an applied write.
pub struct AtomicStrategy {
    store: Arc<dyn LedgerStore>,
    statement_timeout: Duration,
}

impl AtomicStrategy {
    /// Create an atomic strategy.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, statement_timeout: Duration) -> Self {
        Self {
            store,
            statement_timeout,
        }
    }

    fn timed_out<T>(&self, event_id: EventId, result: StoreResult<T>) -> Result<T, InventoryError> {
        result.map_err(|error| match error {
            StoreError::StatementTimeout => InventoryError::Timeout {
                event_id,
                waited_ms: u64::try_from(self.statement_timeout.as_millis()).unwrap_or(u64::MAX),
            },
            other => other.into(),
        })
    }

    async fn try_debit(&self, event_id: EventId, seats: u32) -> Result<SeatLedger, InventoryError> {
        validate_seats(seats)?;
        let debited = self
            .store
            .decrement_if_available(event_id, seats, self.statement_timeout)
            .await;
        if let Some(ledger) = self.timed_out(event_id, debited)? {
            return Ok(ledger);
        }

        // No row matched: either the event is gone or the guard failed.
        match self.store.load(event_id).await? {
            None => Err(InventoryError::LedgerNotFound(event_id)),
            Some(record) => Err(InventoryError::InsufficientCapacity {
                event_id,
                requested: seats,
                available: record.ledger.available_seats,
            }),
        }
    }

    async fn try_credit(&self, event_id: EventId, seats: u32) -> Result<SeatLedger, InventoryError> {
        validate_seats(seats)?;
        let credited = self
            .store
            .increment(event_id, seats, self.statement_timeout)
            .await;
        self.timed_out(event_id, credited)?
            .ok_or(InventoryError::LedgerNotFound(event_id))
    }
}

impl ConcurrencyStrategy for AtomicStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Atomic
    }

    fn debit(&self, event_id: EventId, seats: u32) -> BoxFuture<'_, Result<SeatLedger, InventoryError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.try_debit(event_id, seats).await;
            InventoryMetrics::record_debit("atomic", outcome(&result), started.elapsed());
            result
        })
    }

    fn credit(&self, event_id: EventId, seats: u32) -> BoxFuture<'_, Result<SeatLedger, InventoryError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.try_credit(event_id, seats).await;
            InventoryMetrics::record_credit("atomic", outcome(&result), started.elapsed());
            result
        })
    }
}
