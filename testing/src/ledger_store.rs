//! In-memory [`LedgerStore`] that behaves like a row-locking database.
//!
//! Each event row has two parts:
//!
//! - a committed snapshot, read by [`LedgerStore::load`] without waiting
//!   (like an MVCC read)
//! - a row write lock, taken by every mutation and held by a [`LedgerLock`]
//!   until commit or drop (like `SELECT … FOR UPDATE`)
//!
//! An optional per-call latency models the network round trip. It is what
//! makes optimistic conflicts and lock queueing observable in tests. A bounded
//! statement whose latency exceeds its limit is cancelled before it applies,
//! the way a server-side `statement_timeout` rolls the statement back.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use seat_inventory_core::environment::Clock;
use seat_inventory_core::error::StoreError;
use seat_inventory_core::ledger::SeatLedger;
use seat_inventory_core::store::{LedgerLock, LedgerStore, StoreResult};
use seat_inventory_core::types::{EventDetails, EventId, EventRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

struct Row {
    committed: Mutex<EventRecord>,
    write_lock: Arc<RowLock<()>>,
}

impl Row {
    fn snapshot(&self) -> EventRecord {
        self.committed.lock().unwrap().clone()
    }

    fn write(&self, ledger: SeatLedger, now: DateTime<Utc>) -> EventRecord {
        let mut record = self.committed.lock().unwrap();
        record.ledger = ledger;
        record.updated_at = now;
        record.clone()
    }
}

/// In-memory ledger store for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use seat_inventory_testing::{InMemoryLedgerStore, test_clock};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = InMemoryLedgerStore::new(Arc::new(test_clock()))
///     .with_latency(Duration::from_millis(1));
/// assert!(store.is_empty());
/// ```
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    rows: Arc<RwLock<HashMap<EventId, Arc<Row>>>>,
    clock: Arc<dyn Clock>,
    latency_us: Arc<AtomicU64>,
    failing_writes: Arc<AtomicUsize>,
}

impl InMemoryLedgerStore {
    /// Create an empty store stamping rows with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            clock,
            latency_us: Arc::new(AtomicU64::new(0)),
            failing_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Change the per-call latency.
    pub fn set_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_us.store(micros, Ordering::SeqCst);
    }

    /// Make the next `count` seat mutations fail with a database error.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Committed ledger of an event, read without waiting.
    #[must_use]
    pub fn ledger(&self, event_id: EventId) -> Option<SeatLedger> {
        self.row(event_id).map(|row| row.snapshot().ledger)
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    /// Whether the store holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().unwrap().is_empty()
    }

    fn row(&self, event_id: EventId) -> Option<Arc<Row>> {
        self.rows.read().unwrap().get(&event_id).cloned()
    }

    /// Whether `row` is still the stored row, i.e. not deleted while a caller
    /// waited for its lock.
    fn is_live(&self, event_id: EventId, row: &Arc<Row>) -> bool {
        self.rows
            .read()
            .unwrap()
            .get(&event_id)
            .is_some_and(|live| Arc::ptr_eq(live, row))
    }

    fn latency(&self) -> Duration {
        Duration::from_micros(self.latency_us.load(Ordering::SeqCst))
    }

    async fn round_trip(&self) {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    async fn bounded_round_trip(&self, limit: Duration) -> StoreResult<()> {
        let latency = self.latency();
        if latency > limit {
            tokio::time::sleep(limit).await;
            return Err(StoreError::StatementTimeout);
        }
        self.round_trip().await;
        Ok(())
    }

    fn injected_failure(&self) -> StoreResult<()> {
        let took = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match took {
            Ok(_) => Err(StoreError::Database("injected write failure".to_string())),
            Err(_) => Ok(()),
        }
    }

    /// Run `change` against the row under its write lock. `None` if the event
    /// is missing or `change` declines.
    ///
    /// With a `limit`, the round trip and the wait for the row lock together
    /// must finish within it, otherwise nothing is applied.
    async fn mutate<F>(
        &self,
        event_id: EventId,
        limit: Option<Duration>,
        change: F,
    ) -> StoreResult<Option<EventRecord>>
    where
        F: FnOnce(&EventRecord) -> StoreResult<Option<(SeatLedger, Option<EventDetails>)>>,
    {
        let started = tokio::time::Instant::now();
        match limit {
            Some(limit) => self.bounded_round_trip(limit).await?,
            None => self.round_trip().await,
        }
        self.injected_failure()?;
        let Some(row) = self.row(event_id) else {
            return Ok(None);
        };
        let _write = match limit {
            Some(limit) => {
                let remaining = limit.saturating_sub(started.elapsed());
                tokio::time::timeout(remaining, row.write_lock.lock())
                    .await
                    .map_err(|_| StoreError::StatementTimeout)?
            }
            None => row.write_lock.lock().await,
        };
        if !self.is_live(event_id, &row) {
            return Ok(None);
        }
        let current = row.snapshot();
        let Some((ledger, details)) = change(&current)? else {
            return Ok(None);
        };
        if let Some(details) = details {
            row.committed.lock().unwrap().details = details;
        }
        Ok(Some(row.write(ledger, self.clock.now())))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert_event(&self, record: &EventRecord) -> BoxFuture<'_, StoreResult<()>> {
        let record = record.clone();
        Box::pin(async move {
            self.round_trip().await;
            let mut rows = self.rows.write().unwrap();
            let event_id = record.event_id();
            if rows.contains_key(&event_id) {
                return Err(StoreError::Duplicate(event_id.to_string()));
            }
            rows.insert(
                event_id,
                Arc::new(Row {
                    committed: Mutex::new(record),
                    write_lock: Arc::new(RowLock::new(())),
                }),
            );
            Ok(())
        })
    }

    fn load(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<Option<EventRecord>>> {
        Box::pin(async move {
            self.round_trip().await;
            Ok(self.row(event_id).map(|row| row.snapshot()))
        })
    }

    fn lock(
        &self,
        event_id: EventId,
        wait: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<Box<dyn LedgerLock>>>> {
        Box::pin(async move {
            self.round_trip().await;
            let Some(row) = self.row(event_id) else {
                return Ok(None);
            };
            let guard = tokio::time::timeout(wait, Arc::clone(&row.write_lock).lock_owned())
                .await
                .map_err(|_| StoreError::LockTimeout)?;
            if !self.is_live(event_id, &row) {
                return Ok(None);
            }
            let ledger = row.snapshot().ledger;
            let lock: Box<dyn LedgerLock> = Box::new(InMemoryLedgerLock {
                store: self.clone(),
                row,
                ledger,
                _guard: guard,
            });
            Ok(Some(lock))
        })
    }

    fn decrement_if_available(
        &self,
        event_id: EventId,
        seats: u32,
        limit: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>> {
        Box::pin(async move {
            let updated = self
                .mutate(event_id, Some(limit), |record| {
                    Ok(record.ledger.debited(seats).ok().map(|ledger| (ledger, None)))
                })
                .await?;
            Ok(updated.map(|record| record.ledger))
        })
    }

    fn increment(
        &self,
        event_id: EventId,
        seats: u32,
        limit: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>> {
        Box::pin(async move {
            let updated = self
                .mutate(event_id, Some(limit), |record| {
                    record
                        .ledger
                        .credited(seats)
                        .map(|ledger| Some((ledger, None)))
                        .map_err(|e| StoreError::Constraint(e.to_string()))
                })
                .await?;
            Ok(updated.map(|record| record.ledger))
        })
    }

    fn compare_and_set(
        &self,
        event_id: EventId,
        expected_revision: u64,
        available_seats: u32,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>> {
        Box::pin(async move {
            let updated = self
                .mutate(event_id, None, |record| {
                    Ok((record.ledger.revision == expected_revision).then(|| {
                        let ledger = SeatLedger {
                            available_seats,
                            revision: expected_revision + 1,
                            ..record.ledger
                        };
                        (ledger, None)
                    }))
                })
                .await?;
            Ok(updated.map(|record| record.ledger))
        })
    }

    fn resize_if_covered(
        &self,
        event_id: EventId,
        new_total: u32,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>> {
        Box::pin(async move {
            let updated = self
                .mutate(event_id, None, |record| {
                    Ok(record.ledger.resized(new_total).ok().map(|ledger| (ledger, None)))
                })
                .await?;
            Ok(updated.map(|record| record.ledger))
        })
    }

    fn update_event(
        &self,
        event_id: EventId,
        details: &EventDetails,
        new_total: u32,
    ) -> BoxFuture<'_, StoreResult<Option<EventRecord>>> {
        let details = details.clone();
        Box::pin(async move {
            self.mutate(event_id, None, move |record| {
                Ok(record
                    .ledger
                    .resized(new_total)
                    .ok()
                    .map(|ledger| (ledger, Some(details))))
            })
            .await
        })
    }

    fn delete_event(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            self.round_trip().await;
            let Some(row) = self.row(event_id) else {
                return Ok(false);
            };
            let _write = row.write_lock.lock().await;
            if !self.is_live(event_id, &row) || row.snapshot().ledger.sold() > 0 {
                return Ok(false);
            }
            Ok(self.rows.write().unwrap().remove(&event_id).is_some())
        })
    }
}

/// Exclusive hold on one in-memory row.
struct InMemoryLedgerLock {
    store: InMemoryLedgerStore,
    row: Arc<Row>,
    ledger: SeatLedger,
    _guard: OwnedMutexGuard<()>,
}

impl LedgerLock for InMemoryLedgerLock {
    fn ledger(&self) -> &SeatLedger {
        &self.ledger
    }

    fn commit(self: Box<Self>, available_seats: u32) -> BoxFuture<'static, StoreResult<SeatLedger>> {
        Box::pin(async move {
            self.store.round_trip().await;
            self.store.injected_failure()?;
            let ledger = SeatLedger {
                available_seats,
                revision: self.ledger.revision + 1,
                ..self.ledger
            };
            let record = self.row.write(ledger, self.store.clock.now());
            Ok(record.ledger)
        })
    }
}
