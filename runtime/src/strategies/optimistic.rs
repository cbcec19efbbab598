//! Optimistic strategy: read the revision, compute, compare-and-set, retry.

use super::outcome;
use crate::metrics::InventoryMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use futures::future::BoxFuture;
use seat_inventory_core::error::InventoryError;
use seat_inventory_core::ledger::{SeatLedger, validate_seats};
use seat_inventory_core::store::LedgerStore;
use seat_inventory_core::strategy::{ConcurrencyStrategy, StrategyKind};
use seat_inventory_core::types::EventId;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a single compare-and-set round.
#[derive(Debug)]
enum Round {
    /// Another writer moved the revision first
    Lost,
    /// Anything that retrying cannot fix
    Failed(InventoryError),
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lost => f.write_str("revision moved during update"),
            Self::Failed(err) => err.fmt(f),
        }
    }
}

/// Reads the ledger without any hold and writes back conditioned on the
/// revision it read. Losers retry with jittered backoff; after
/// `policy.max_attempts()` losses the caller gets
/// [`InventoryError::ConcurrentUpdateConflict`].
///
/// Capacity is re-evaluated on every round, so a retry against a ledger that
/// has since sold out fails with `InsufficientCapacity`, not a conflict.
pub struct OptimisticStrategy {
    store: Arc<dyn LedgerStore>,
    policy: RetryPolicy,
}

impl OptimisticStrategy {
    /// Create an optimistic strategy with the given retry bound.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    async fn round<F>(&self, event_id: EventId, change: F) -> Result<SeatLedger, Round>
    where
        F: Fn(&SeatLedger) -> Result<SeatLedger, InventoryError>,
    {
        let record = self
            .store
            .load(event_id)
            .await
            .map_err(|e| Round::Failed(e.into()))?
            .ok_or(Round::Failed(InventoryError::LedgerNotFound(event_id)))?;

        let current = record.ledger;
        let next = change(&current).map_err(Round::Failed)?;

        match self
            .store
            .compare_and_set(event_id, current.revision, next.available_seats)
            .await
        {
            Ok(Some(written)) => Ok(written),
            Ok(None) => {
                InventoryMetrics::record_conflict();
                tracing::debug!(%event_id, revision = current.revision, "Lost compare-and-set");
                Err(Round::Lost)
            }
            Err(err) => Err(Round::Failed(err.into())),
        }
    }

    async fn apply<F>(&self, event_id: EventId, change: F) -> Result<SeatLedger, InventoryError>
    where
        F: Fn(&SeatLedger) -> Result<SeatLedger, InventoryError> + Copy,
    {
        retry_with_predicate(
            &self.policy,
            || self.round(event_id, change),
            |round| matches!(round, Round::Lost),
        )
        .await
        .map_err(|round| match round {
            Round::Lost => InventoryError::ConcurrentUpdateConflict {
                event_id,
                attempts: self.policy.max_attempts(),
            },
            Round::Failed(err) => err,
        })
    }
}

impl ConcurrencyStrategy for OptimisticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Optimistic
    }

    fn debit(&self, event_id: EventId, seats: u32) -> BoxFuture<'_, Result<SeatLedger, InventoryError>> {
        Box::pin(async move {
            validate_seats(seats)?;
            let started = Instant::now();
            let result = self
                .apply(event_id, move |ledger: &SeatLedger| ledger.debited(seats))
                .await;
            InventoryMetrics::record_debit("optimistic", outcome(&result), started.elapsed());
            result
        })
    }

    fn credit(&self, event_id: EventId, seats: u32) -> BoxFuture<'_, Result<SeatLedger, InventoryError>> {
        Box::pin(async move {
            validate_seats(seats)?;
            let started = Instant::now();
            let result = self
                .apply(event_id, move |ledger: &SeatLedger| ledger.credited(seats))
                .await;
            InventoryMetrics::record_credit("optimistic", outcome(&result), started.elapsed());
            result
        })
    }
}
