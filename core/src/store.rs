//! Authoritative store abstractions.
//!
//! The store offers three mutation primitives, one per concurrency strategy:
//!
//! - [`LedgerStore::lock`]: exclusive row hold, released by commit or drop
//! - [`LedgerStore::decrement_if_available`]: single conditional write
//! - [`LedgerStore::compare_and_set`]: write conditioned on an unchanged revision
//!
//! # Implementations
//!
//! - `PostgresLedgerStore` / `PostgresBookingStore` (in `seat-inventory-postgres`)
//! - `InMemoryLedgerStore` / `InMemoryBookingStore` (in `seat-inventory-testing`)
//!
//! # Dyn Compatibility
//!
//! Methods return [`BoxFuture`] so the stores can be shared as
//! `Arc<dyn LedgerStore>` between strategies, the coordinator and the cache.

use crate::error::StoreError;
use crate::ledger::SeatLedger;
use crate::types::{Booking, BookingCode, BookingId, EventDetails, EventId, EventRecord};
use futures::future::BoxFuture;
use std::time::Duration;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for event rows and their seat ledgers.
pub trait LedgerStore: Send + Sync {
    /// Insert a new event row.
    ///
    /// # Errors
    ///
    /// - `Duplicate` if the event id already exists
    /// - `Database` on connection or query failure
    fn insert_event(&self, record: &EventRecord) -> BoxFuture<'_, StoreResult<()>>;

    /// Point lookup without any hold.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn load(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<Option<EventRecord>>>;

    /// Take an exclusive hold on the event row, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` if the event does not exist. Other writers of the same
    /// row block until the returned lock is committed or dropped.
    ///
    /// # Errors
    ///
    /// - `LockTimeout` if the hold could not be acquired within `wait`
    /// - `Database` on connection or query failure
    fn lock(
        &self,
        event_id: EventId,
        wait: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<Box<dyn LedgerLock>>>>;

    /// `available_seats -= seats WHERE available_seats >= seats`, atomically.
    ///
    /// Returns the updated ledger, or `None` when no row matched (missing event
    /// or not enough seats; callers disambiguate with [`LedgerStore::load`]).
    ///
    /// The store enforces `limit` itself: a statement that runs longer is
    /// rolled back, so a timeout never leaves the debit applied.
    ///
    /// # Errors
    ///
    /// Returns `StatementTimeout` if `limit` elapsed, `Database` on connection
    /// or query failure.
    fn decrement_if_available(
        &self,
        event_id: EventId,
        seats: u32,
        limit: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>>;

    /// `available_seats += seats`, atomically. `None` if the event does not exist.
    ///
    /// Bounded by `limit` the same way as [`LedgerStore::decrement_if_available`].
    ///
    /// # Errors
    ///
    /// Returns `Constraint` if the credit would exceed total capacity,
    /// `StatementTimeout` if `limit` elapsed, `Database` on connection or query
    /// failure.
    fn increment(
        &self,
        event_id: EventId,
        seats: u32,
        limit: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>>;

    /// Write `available_seats` only if the row is still at `expected_revision`.
    ///
    /// Returns the updated ledger, or `None` if the revision moved or the event
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn compare_and_set(
        &self,
        event_id: EventId,
        expected_revision: u64,
        available_seats: u32,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>>;

    /// Change total capacity, keeping sold seats, only if the new total still
    /// covers them. `None` if the event is missing or the floor would be broken.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn resize_if_covered(
        &self,
        event_id: EventId,
        new_total: u32,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>>;

    /// Replace event details and resize capacity in one conditional write.
    /// `None` if the event is missing or the sold-seats floor would be broken.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn update_event(
        &self,
        event_id: EventId,
        details: &EventDetails,
        new_total: u32,
    ) -> BoxFuture<'_, StoreResult<Option<EventRecord>>>;

    /// Delete the event row, but only while none of its seats are sold and no
    /// active booking references it. The check and the delete are one atomic
    /// step, so a concurrent debit either lands first (and the delete is
    /// refused) or finds the row gone.
    ///
    /// Returns whether a row was removed. `false` covers both a missing event
    /// and a refused delete; callers disambiguate with [`LedgerStore::load`].
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn delete_event(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<bool>>;
}

/// An exclusive hold on one event row.
///
/// Dropping the lock without calling [`LedgerLock::commit`] releases it and
/// discards any pending change.
pub trait LedgerLock: Send {
    /// The ledger as observed under the hold.
    fn ledger(&self) -> &SeatLedger;

    /// Durably write `available_seats` (bumping the revision), then release.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the write or the commit fails; the hold is
    /// released either way.
    fn commit(self: Box<Self>, available_seats: u32) -> BoxFuture<'static, StoreResult<SeatLedger>>;
}

/// Storage for bookings.
pub trait BookingStore: Send + Sync {
    /// Persist a new booking.
    ///
    /// # Errors
    ///
    /// - `Duplicate` if the id or code is already taken
    /// - `Database` on connection or query failure
    fn insert(&self, booking: &Booking) -> BoxFuture<'_, StoreResult<()>>;

    /// Lookup by id.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn get(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Option<Booking>>>;

    /// Lookup by customer-facing code.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn find_by_code(&self, code: &BookingCode) -> BoxFuture<'_, StoreResult<Option<Booking>>>;

    /// All bookings (any status) for an event, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn list_for_event(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<Vec<Booking>>>;

    /// Number of active bookings for an event.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn count_active(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<u64>>;

    /// Flip `Active → Cancelled` atomically.
    ///
    /// Returns the cancelled booking, or `None` if the booking was not active
    /// (already cancelled, or missing). Exactly one of several concurrent
    /// callers observes `Some`.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn mark_cancelled(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Option<Booking>>>;

    /// Undo a [`BookingStore::mark_cancelled`] whose seat credit could not be
    /// applied. Only used as compensation before the cancellation is reported.
    ///
    /// # Errors
    ///
    /// Returns `Database` on connection or query failure.
    fn revert_cancellation(&self, id: BookingId) -> BoxFuture<'_, StoreResult<()>>;
}
