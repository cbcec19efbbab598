//! Domain types for seat inventory.
//!
//! Identifiers, money, event details, bookings and the cached projection.
//! The seat ledger itself lives in [`crate::ledger`] because it owns the
//! capacity invariant.

use crate::ledger::SeatLedger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event (and its seat ledger)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable booking code shown to customers (e.g. `RES-1A2B3C4D`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingCode(String);

impl BookingCode {
    /// Wrap an already generated code
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Borrow the code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Amount of money in minor units (cents). Single currency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Multiply by a seat count, returning `None` on overflow
    #[must_use]
    pub fn checked_mul(self, seats: u32) -> Option<Self> {
        self.0.checked_mul(u64::from(seats)).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Descriptive attributes of an event. None of these affect seat accounting
/// except `price`, which is captured into each booking at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    /// Display name
    pub name: String,
    /// Optional long description
    pub description: Option<String>,
    /// Venue name
    pub venue: String,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Price per seat
    pub price: Money,
}

/// Input for creating or replacing an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Descriptive attributes
    pub details: EventDetails,
    /// Total seat capacity (must be > 0)
    pub total_capacity: u32,
}

/// Authoritative event row: details plus seat ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Descriptive attributes
    pub details: EventDetails,
    /// Seat accounting
    pub ledger: SeatLedger,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl EventRecord {
    /// Event identifier
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.ledger.event_id
    }
}

/// Denormalized, read-optimized view of an event served by the projection cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProjection {
    /// Event identifier
    pub event_id: EventId,
    /// Display name
    pub name: String,
    /// Optional long description
    pub description: Option<String>,
    /// Venue name
    pub venue: String,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Price per seat
    pub price: Money,
    /// Total seat capacity
    pub total_capacity: u32,
    /// Seats still available
    pub available_seats: u32,
    /// Revision of the row this projection was built from
    pub revision: u64,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl From<&EventRecord> for EventProjection {
    fn from(record: &EventRecord) -> Self {
        Self {
            event_id: record.ledger.event_id,
            name: record.details.name.clone(),
            description: record.details.description.clone(),
            venue: record.details.venue.clone(),
            event_date: record.details.event_date,
            price: record.details.price,
            total_capacity: record.ledger.total_capacity,
            available_seats: record.ledger.available_seats,
            revision: record.ledger.revision,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Which customer-facing flavor of booking this is.
///
/// Reservations and tickets hold seats identically; the kind only changes the
/// code prefix and how the booking is presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingKind {
    /// A seat reservation
    Reservation,
    /// An issued ticket
    Ticket,
}

impl BookingKind {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reservation => "reservation",
            Self::Ticket => "ticket",
        }
    }

    /// Prefix used for generated booking codes
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Reservation => "RES",
            Self::Ticket => "TKT",
        }
    }
}

impl FromStr for BookingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reservation" => Ok(Self::Reservation),
            "ticket" => Ok(Self::Ticket),
            other => Err(format!("Invalid booking kind: {other}")),
        }
    }
}

/// Booking lifecycle. `Cancelled` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Seats are held
    Active,
    /// Seats were released back to the ledger
    Cancelled,
}

impl BookingStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("Invalid booking status: {other}")),
        }
    }
}

/// Who the booking belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Customer display name
    pub name: String,
    /// Customer contact email
    pub email: String,
}

impl CustomerInfo {
    /// Creates customer info
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A customer's claim on a number of seats of one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Storage identity
    pub id: BookingId,
    /// Customer-facing code, unique
    pub code: BookingCode,
    /// Reservation or ticket
    pub kind: BookingKind,
    /// Event the seats are drawn from
    pub event_id: EventId,
    /// Owner of the booking
    pub customer: CustomerInfo,
    /// Number of seats held (> 0)
    pub seats_held: u32,
    /// `seats_held` × event price at booking time
    pub total_price: Money,
    /// Lifecycle state
    pub status: BookingStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Whether the booking still holds seats
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }
}
