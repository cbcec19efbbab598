//! Error taxonomy for the seat inventory engine.
//!
//! - [`InventoryError`]: what callers of the coordinator see
//! - [`StoreError`]: failures of the authoritative store
//! - [`CacheError`]: failures of the cache backend, never surfaced to callers

use crate::types::{BookingCode, BookingId, EventId};
use thiserror::Error;

/// How a booking was looked up when it could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingRef {
    /// By storage id
    Id(BookingId),
    /// By customer-facing code
    Code(BookingCode),
}

impl std::fmt::Display for BookingRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Code(code) => write!(f, "code {code}"),
        }
    }
}

/// Errors returned by inventory operations.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Bad input. Nothing was mutated.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Not enough seats left. Nothing was mutated and the cache is untouched.
    #[error("Insufficient capacity for event {event_id}: requested {requested}, available {available}")]
    InsufficientCapacity {
        /// Event that was debited
        event_id: EventId,
        /// Seats requested
        requested: u32,
        /// Seats available when the request was rejected
        available: u32,
    },

    /// Optimistic retries were exhausted. Safe to retry.
    #[error("Concurrent update conflict on event {event_id} after {attempts} attempts")]
    ConcurrentUpdateConflict {
        /// Contended event
        event_id: EventId,
        /// Attempts made before giving up
        attempts: usize,
    },

    /// The event (and its ledger) does not exist.
    #[error("Event not found: {0}")]
    LedgerNotFound(EventId),

    /// The booking does not exist.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingRef),

    /// The booking was already cancelled.
    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(BookingId),

    /// A resize would put total capacity below the seats already sold.
    #[error("Cannot resize event {event_id} to {requested_total} seats: {sold} already sold")]
    CapacityBelowSold {
        /// Event being resized
        event_id: EventId,
        /// Requested new total
        requested_total: u32,
        /// Seats currently held by active bookings
        sold: u32,
    },

    /// The event still has active bookings and cannot be deleted.
    #[error("Event {event_id} still has {active} active bookings")]
    EventHasActiveBookings {
        /// Event being deleted
        event_id: EventId,
        /// Number of active bookings
        active: u64,
    },

    /// A bounded wait expired before the mutation could proceed. Safe to retry.
    #[error("Timed out after {waited_ms}ms waiting on event {event_id}")]
    Timeout {
        /// Contended event
        event_id: EventId,
        /// How long we waited
        waited_ms: u64,
    },

    /// The authoritative store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl InventoryError {
    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentUpdateConflict { .. } | Self::Timeout { .. }
        )
    }

    /// Stable, low-cardinality label for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InsufficientCapacity { .. } => "insufficient_capacity",
            Self::ConcurrentUpdateConflict { .. } => "conflict",
            Self::LedgerNotFound(_) => "ledger_not_found",
            Self::BookingNotFound(_) => "booking_not_found",
            Self::AlreadyCancelled(_) => "already_cancelled",
            Self::CapacityBelowSold { .. } => "capacity_below_sold",
            Self::EventHasActiveBookings { .. } => "event_has_active_bookings",
            Self::Timeout { .. } => "timeout",
            Self::Store(_) => "store",
        }
    }
}

/// Errors from the authoritative store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A row lock could not be acquired within the allowed wait.
    #[error("Lock wait timed out")]
    LockTimeout,

    /// A statement ran past its time limit and was rolled back.
    #[error("Statement timed out")]
    StatementTimeout,

    /// A check constraint rejected the write.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// A uniqueness constraint was violated (e.g. booking code collision).
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    /// Database connection or query failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend could not be reached. Distinct from a plain miss.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// A cached payload could not be encoded or decoded.
    #[error("Cache codec error: {0}")]
    Codec(String),
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
