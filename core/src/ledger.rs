//! The seat ledger and its arithmetic.
//!
//! Every store implementation applies these rules instead of re-deriving them,
//! so the capacity invariant is enforced in exactly one place:
//!
//! - `available_seats` never goes below zero
//! - a debit larger than `available_seats` is rejected
//! - a resize never drops `total_capacity` below the number of seats sold
//! - every successful mutation bumps `revision`

use crate::error::InventoryError;
use crate::types::EventId;
use serde::{Deserialize, Serialize};

/// Seat accounting for one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLedger {
    /// Event this ledger belongs to
    pub event_id: EventId,
    /// Total seats (> 0)
    pub total_capacity: u32,
    /// Seats not held by an active booking
    pub available_seats: u32,
    /// Incremented on every committed mutation of the event row
    pub revision: u64,
}

impl SeatLedger {
    /// A fresh ledger with every seat available.
    #[must_use]
    pub const fn new(event_id: EventId, total_capacity: u32) -> Self {
        Self {
            event_id,
            total_capacity,
            available_seats: total_capacity,
            revision: 0,
        }
    }

    /// Seats currently held by active bookings.
    #[must_use]
    pub const fn sold(&self) -> u32 {
        self.total_capacity.saturating_sub(self.available_seats)
    }

    /// Whether `0 <= available_seats <= total_capacity` holds.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.total_capacity > 0 && self.available_seats <= self.total_capacity
    }

    /// The ledger after taking `seats`.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidRequest`] if `seats == 0`
    /// - [`InventoryError::InsufficientCapacity`] if fewer than `seats` are available
    pub fn debited(&self, seats: u32) -> Result<Self, InventoryError> {
        validate_seats(seats)?;
        let available_seats = self.available_seats.checked_sub(seats).ok_or(
            InventoryError::InsufficientCapacity {
                event_id: self.event_id,
                requested: seats,
                available: self.available_seats,
            },
        )?;
        Ok(Self {
            available_seats,
            revision: self.revision + 1,
            ..*self
        })
    }

    /// The ledger after returning `seats`. Never rejected on capacity grounds.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidRequest`] if `seats == 0` or the count overflows
    pub fn credited(&self, seats: u32) -> Result<Self, InventoryError> {
        validate_seats(seats)?;
        let available_seats = self.available_seats.checked_add(seats).ok_or_else(|| {
            InventoryError::InvalidRequest(format!("crediting {seats} seats overflows the ledger"))
        })?;
        Ok(Self {
            available_seats,
            revision: self.revision + 1,
            ..*self
        })
    }

    /// The ledger after changing total capacity to `new_total`.
    ///
    /// `available_seats` moves by the same delta as the total, so sold seats
    /// are preserved.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidRequest`] if `new_total == 0`
    /// - [`InventoryError::CapacityBelowSold`] if `new_total` is below the seats already sold
    pub fn resized(&self, new_total: u32) -> Result<Self, InventoryError> {
        if new_total == 0 {
            return Err(InventoryError::InvalidRequest(
                "total capacity must be greater than zero".to_string(),
            ));
        }
        let sold = self.sold();
        if new_total < sold {
            return Err(InventoryError::CapacityBelowSold {
                event_id: self.event_id,
                requested_total: new_total,
                sold,
            });
        }
        Ok(Self {
            total_capacity: new_total,
            available_seats: new_total - sold,
            revision: self.revision + 1,
            ..*self
        })
    }
}

/// Reject non-positive seat counts before any mutation is attempted.
///
/// # Errors
///
/// Returns [`InventoryError::InvalidRequest`] if `seats == 0`.
pub fn validate_seats(seats: u32) -> Result<(), InventoryError> {
    if seats == 0 {
        return Err(InventoryError::InvalidRequest(
            "seat count must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
