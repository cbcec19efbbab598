//! In-memory [`BookingStore`].

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use futures::future::BoxFuture;
use seat_inventory_core::environment::Clock;
use seat_inventory_core::error::StoreError;
use seat_inventory_core::store::{BookingStore, StoreResult};
use seat_inventory_core::types::{Booking, BookingCode, BookingId, BookingStatus, EventId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Default)]
struct Bookings {
    by_id: HashMap<BookingId, (u64, Booking)>,
    next_seq: u64,
}

/// In-memory booking store with latency and failure injection.
///
/// Enforces unique ids and unique codes, like the database constraints.
#[derive(Clone)]
pub struct InMemoryBookingStore {
    inner: Arc<RwLock<Bookings>>,
    clock: Arc<dyn Clock>,
    latency_us: Arc<AtomicU64>,
    failing_inserts: Arc<AtomicUsize>,
}

impl InMemoryBookingStore {
    /// Create an empty store stamping status changes with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Bookings::default())),
            clock,
            latency_us: Arc::new(AtomicU64::new(0)),
            failing_inserts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delay every call by `latency` before it reads or writes.
    pub fn set_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_us.store(micros, Ordering::SeqCst);
    }

    async fn round_trip(&self) {
        let micros = self.latency_us.load(Ordering::SeqCst);
        if micros > 0 {
            tokio::time::sleep(Duration::from_micros(micros)).await;
        }
    }

    /// Make the next `count` inserts fail with a database error.
    pub fn fail_next_inserts(&self, count: usize) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Number of stored bookings (any status).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_id.len()
    }

    /// Whether no booking is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of `seats_held` over the active bookings of an event.
    #[must_use]
    pub fn active_seats(&self, event_id: EventId) -> u64 {
        self.inner
            .read()
            .unwrap()
            .by_id
            .values()
            .filter(|(_, b)| b.event_id == event_id && b.is_active())
            .map(|(_, b)| u64::from(b.seats_held))
            .sum()
    }

    fn set_status(&self, id: BookingId, from: BookingStatus, to: BookingStatus) -> Option<Booking> {
        let mut inner = self.inner.write().unwrap();
        let (_, booking) = inner.by_id.get_mut(&id)?;
        if booking.status != from {
            return None;
        }
        booking.status = to;
        booking.updated_at = self.clock.now();
        Some(booking.clone())
    }
}

impl BookingStore for InMemoryBookingStore {
    fn insert(&self, booking: &Booking) -> BoxFuture<'_, StoreResult<()>> {
        let booking = booking.clone();
        Box::pin(async move {
            self.round_trip().await;
            let took = self
                .failing_inserts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if took.is_ok() {
                return Err(StoreError::Database("injected insert failure".to_string()));
            }

            let mut inner = self.inner.write().unwrap();
            if inner.by_id.contains_key(&booking.id) {
                return Err(StoreError::Duplicate(booking.id.to_string()));
            }
            if inner.by_id.values().any(|(_, b)| b.code == booking.code) {
                return Err(StoreError::Duplicate(booking.code.to_string()));
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.by_id.insert(booking.id, (seq, booking));
            Ok(())
        })
    }

    fn get(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Option<Booking>>> {
        Box::pin(async move {
            self.round_trip().await;
            Ok(self
                .inner
                .read()
                .unwrap()
                .by_id
                .get(&id)
                .map(|(_, b)| b.clone()))
        })
    }

    fn find_by_code(&self, code: &BookingCode) -> BoxFuture<'_, StoreResult<Option<Booking>>> {
        let code = code.clone();
        Box::pin(async move {
            self.round_trip().await;
            Ok(self
                .inner
                .read()
                .unwrap()
                .by_id
                .values()
                .find(|(_, b)| b.code == code)
                .map(|(_, b)| b.clone()))
        })
    }

    fn list_for_event(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        Box::pin(async move {
            self.round_trip().await;
            let inner = self.inner.read().unwrap();
            let mut found: Vec<_> = inner
                .by_id
                .values()
                .filter(|(_, b)| b.event_id == event_id)
                .collect();
            found.sort_by_key(|(seq, _)| *seq);
            Ok(found.into_iter().map(|(_, b)| b.clone()).collect())
        })
    }

    fn count_active(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<u64>> {
        Box::pin(async move {
            self.round_trip().await;
            let count = self
                .inner
                .read()
                .unwrap()
                .by_id
                .values()
                .filter(|(_, b)| b.event_id == event_id && b.is_active())
                .count();
            Ok(u64::try_from(count).unwrap_or(u64::MAX))
        })
    }

    fn mark_cancelled(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Option<Booking>>> {
        Box::pin(async move {
            self.round_trip().await;
            Ok(self.set_status(id, BookingStatus::Active, BookingStatus::Cancelled))
        })
    }

    fn revert_cancellation(&self, id: BookingId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.round_trip().await;
            self.set_status(id, BookingStatus::Cancelled, BookingStatus::Active);
            Ok(())
        })
    }
}
