//! Booking coordinator: the public face of the engine.
//!
//! Reserve and cancel compose a seat mutation (through the configured
//! [`ConcurrencyStrategy`]), a booking write, and a cache invalidation:
//!
//! ```text
//! reserve: validate → debit ─commit─▶ insert booking ─▶ invalidate
//!                                        │ fails
//!                                        ▼
//!                               compensating credit (retried)
//!
//! cancel:  load → claim Active→Cancelled ─▶ credit ─▶ invalidate
//!                                             │ fails
//!                                             ▼
//!                                      revert the claim
//! ```
//!
//! Everything after the first committed step runs on a spawned task, so a
//! caller that gives up (timeout, disconnect) cannot leave the ledger and the
//! bookings disagreeing.

use crate::metrics::InventoryMetrics;
use crate::projection_cache::ProjectionCache;
use crate::retry::{RetryPolicy, retry_with_predicate};
use seat_inventory_core::environment::{Clock, CodeGenerator};
use seat_inventory_core::error::{BookingRef, InventoryError, StoreError};
use seat_inventory_core::ledger::{SeatLedger, validate_seats};
use seat_inventory_core::store::{BookingStore, LedgerStore};
use seat_inventory_core::strategy::ConcurrencyStrategy;
use seat_inventory_core::types::{
    Booking, BookingCode, BookingId, BookingKind, BookingStatus, CustomerInfo, EventId,
    EventProjection, EventRecord, Money, NewEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// Booking codes tried before a collision is reported as a store failure.
const MAX_CODE_ATTEMPTS: usize = 3;

/// Orchestrates bookings over a ledger store, a booking store and a projection cache.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct BookingCoordinator {
    strategy: Arc<dyn ConcurrencyStrategy>,
    ledgers: Arc<dyn LedgerStore>,
    bookings: Arc<dyn BookingStore>,
    cache: Arc<ProjectionCache>,
    codes: Arc<dyn CodeGenerator>,
    clock: Arc<dyn Clock>,
    compensation: RetryPolicy,
}

impl BookingCoordinator {
    /// Create a coordinator with the default compensation retry policy.
    #[must_use]
    pub fn new(
        strategy: Arc<dyn ConcurrencyStrategy>,
        ledgers: Arc<dyn LedgerStore>,
        bookings: Arc<dyn BookingStore>,
        cache: Arc<ProjectionCache>,
        codes: Arc<dyn CodeGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            strategy,
            ledgers,
            bookings,
            cache,
            codes,
            clock,
            compensation: RetryPolicy::builder()
                .max_retries(5)
                .initial_delay(Duration::from_millis(20))
                .max_delay(Duration::from_secs(2))
                .build(),
        }
    }

    /// Replace the retry policy used for compensating credits.
    #[must_use]
    pub fn with_compensation_policy(mut self, policy: RetryPolicy) -> Self {
        self.compensation = policy;
        self
    }

    /// Strategy in use.
    #[must_use]
    pub fn strategy(&self) -> &Arc<dyn ConcurrencyStrategy> {
        &self.strategy
    }

    /// Projection cache in use.
    #[must_use]
    pub const fn cache(&self) -> &Arc<ProjectionCache> {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Bookings
    // ------------------------------------------------------------------

    /// Reserve `seats` for `customer`.
    ///
    /// # Errors
    ///
    /// `InvalidRequest`, `LedgerNotFound`, `InsufficientCapacity`,
    /// `ConcurrentUpdateConflict`, `Timeout`, or `Store` if the booking could
    /// not be persisted (the debit is then compensated).
    pub async fn reserve(
        &self,
        event_id: EventId,
        seats: u32,
        customer: CustomerInfo,
    ) -> Result<Booking, InventoryError> {
        self.reserve_as(BookingKind::Reservation, event_id, seats, customer)
            .await
    }

    /// Issue a ticket for `seats`. Same seat semantics as [`Self::reserve`].
    ///
    /// # Errors
    ///
    /// See [`Self::reserve`].
    pub async fn issue_ticket(
        &self,
        event_id: EventId,
        seats: u32,
        customer: CustomerInfo,
    ) -> Result<Booking, InventoryError> {
        self.reserve_as(BookingKind::Ticket, event_id, seats, customer)
            .await
    }

    /// Take `seats` and record a booking of the given kind.
    ///
    /// # Errors
    ///
    /// See [`Self::reserve`].
    #[tracing::instrument(skip(self, customer), fields(kind = kind.as_str(), %event_id))]
    pub async fn reserve_as(
        &self,
        kind: BookingKind,
        event_id: EventId,
        seats: u32,
        customer: CustomerInfo,
    ) -> Result<Booking, InventoryError> {
        validate_seats(seats)?;
        validate_customer(&customer)?;

        let record = self
            .ledgers
            .load(event_id)
            .await?
            .ok_or(InventoryError::LedgerNotFound(event_id))?;
        let total_price = price_for(record.details.price, seats)?;

        let ledger = self.strategy.debit(event_id, seats).await.inspect_err(|error| {
            tracing::debug!(%error, "Debit rejected");
        })?;

        // The debit is durable from here on; finish regardless of the caller.
        let this = self.clone();
        tokio::spawn(async move {
            this.settle_reservation(kind, ledger, seats, customer, total_price)
                .await
        })
        .await
        .map_err(settle_panicked)?
    }

    async fn settle_reservation(
        &self,
        kind: BookingKind,
        ledger: SeatLedger,
        seats: u32,
        customer: CustomerInfo,
        total_price: Money,
    ) -> Result<Booking, InventoryError> {
        let event_id = ledger.event_id;
        let now = self.clock.now();
        let mut attempt = 1;

        loop {
            let booking = Booking {
                id: BookingId::new(),
                code: self.codes.generate(kind),
                kind,
                event_id,
                customer: customer.clone(),
                seats_held: seats,
                total_price,
                status: BookingStatus::Active,
                created_at: now,
                updated_at: now,
            };

            match self.bookings.insert(&booking).await {
                Ok(()) => {
                    self.cache.invalidate(event_id, ledger.revision).await;
                    InventoryMetrics::record_booking_created(kind.as_str());
                    tracing::info!(
                        booking_id = %booking.id,
                        code = %booking.code,
                        seats,
                        available = ledger.available_seats,
                        "Booking created"
                    );
                    return Ok(booking);
                }
                Err(StoreError::Duplicate(key)) if attempt < MAX_CODE_ATTEMPTS => {
                    tracing::warn!(%key, attempt, "Booking code collision, regenerating");
                    attempt += 1;
                }
                Err(error) => {
                    tracing::error!(%error, seats, "Booking write failed after debit, compensating");
                    self.compensate_debit(event_id, seats).await;
                    return Err(error.into());
                }
            }
        }
    }

    async fn compensate_debit(&self, event_id: EventId, seats: u32) {
        let credited = retry_with_predicate(
            &self.compensation,
            || self.strategy.credit(event_id, seats),
            |error| {
                error.is_retryable()
                    || matches!(error, InventoryError::Store(e) if !matches!(e, StoreError::Constraint(_)))
            },
        )
        .await;

        match credited {
            Ok(ledger) => {
                InventoryMetrics::record_compensation("applied");
                // Readers may have cached the debited value in between.
                self.cache.invalidate(event_id, ledger.revision).await;
                tracing::info!(%event_id, seats, "Compensating credit applied");
            }
            Err(error) => {
                InventoryMetrics::record_compensation("failed");
                tracing::error!(
                    %event_id,
                    seats,
                    %error,
                    "Compensating credit failed; ledger needs reconciliation"
                );
            }
        }
    }

    /// Cancel a booking and return its seats.
    ///
    /// Exactly one of several concurrent cancels of the same booking succeeds;
    /// the others get `AlreadyCancelled`.
    ///
    /// # Errors
    ///
    /// `BookingNotFound`, `AlreadyCancelled`, or the strategy's error if the
    /// seats could not be credited (the booking then stays active).
    #[tracing::instrument(skip(self), fields(%booking_id))]
    pub async fn cancel(&self, booking_id: BookingId) -> Result<Booking, InventoryError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(InventoryError::BookingNotFound(BookingRef::Id(booking_id)))?;
        if !booking.is_active() {
            return Err(InventoryError::AlreadyCancelled(booking_id));
        }

        let Some(claimed) = self.bookings.mark_cancelled(booking_id).await? else {
            return Err(InventoryError::AlreadyCancelled(booking_id));
        };

        let this = self.clone();
        tokio::spawn(async move { this.settle_cancellation(claimed).await })
            .await
            .map_err(settle_panicked)?
    }

    async fn settle_cancellation(&self, booking: Booking) -> Result<Booking, InventoryError> {
        match self
            .strategy
            .credit(booking.event_id, booking.seats_held)
            .await
        {
            Ok(ledger) => {
                self.cache.invalidate(booking.event_id, ledger.revision).await;
                InventoryMetrics::record_booking_cancelled(booking.kind.as_str());
                tracing::info!(
                    code = %booking.code,
                    seats = booking.seats_held,
                    available = ledger.available_seats,
                    "Booking cancelled"
                );
                Ok(booking)
            }
            Err(error) => {
                tracing::warn!(%error, "Credit failed, reverting cancellation");
                if let Err(revert) = self.bookings.revert_cancellation(booking.id).await {
                    tracing::error!(
                        booking_id = %booking.id,
                        error = %revert,
                        "Could not revert cancellation; booking needs reconciliation"
                    );
                }
                Err(error)
            }
        }
    }

    /// Cancel a booking identified by its customer-facing code.
    ///
    /// # Errors
    ///
    /// See [`Self::cancel`].
    pub async fn cancel_by_code(&self, code: &BookingCode) -> Result<Booking, InventoryError> {
        let booking = self.booking_by_code(code).await?;
        self.cancel(booking.id).await
    }

    /// Booking by id.
    ///
    /// # Errors
    ///
    /// `BookingNotFound` or `Store`.
    pub async fn booking(&self, booking_id: BookingId) -> Result<Booking, InventoryError> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or(InventoryError::BookingNotFound(BookingRef::Id(booking_id)))
    }

    /// Booking by code.
    ///
    /// # Errors
    ///
    /// `BookingNotFound` or `Store`.
    pub async fn booking_by_code(&self, code: &BookingCode) -> Result<Booking, InventoryError> {
        self.bookings
            .find_by_code(code)
            .await?
            .ok_or_else(|| InventoryError::BookingNotFound(BookingRef::Code(code.clone())))
    }

    /// Every booking for an event, oldest first.
    ///
    /// # Errors
    ///
    /// `Store` if the booking store cannot be read.
    pub async fn bookings_for_event(&self, event_id: EventId) -> Result<Vec<Booking>, InventoryError> {
        Ok(self.bookings.list_for_event(event_id).await?)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Current projection of an event, served through the cache.
    ///
    /// # Errors
    ///
    /// `LedgerNotFound` or `Store`.
    pub async fn get_projection(&self, event_id: EventId) -> Result<EventProjection, InventoryError> {
        self.cache.get(event_id).await
    }

    /// Create an event with every seat available.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` or `Store`.
    #[tracing::instrument(skip(self, event), fields(name = %event.details.name))]
    pub async fn create_event(&self, event: NewEvent) -> Result<EventProjection, InventoryError> {
        validate_event(&event)?;
        let now = self.clock.now();
        let record = EventRecord {
            details: event.details,
            ledger: SeatLedger::new(EventId::new(), event.total_capacity),
            created_at: now,
            updated_at: now,
        };
        self.ledgers.insert_event(&record).await?;
        tracing::info!(event_id = %record.event_id(), capacity = event.total_capacity, "Event created");
        Ok(EventProjection::from(&record))
    }

    /// Replace an event's details and capacity in one write.
    ///
    /// # Errors
    ///
    /// `InvalidRequest`, `LedgerNotFound`, `CapacityBelowSold`,
    /// `ConcurrentUpdateConflict` if seats were sold between the check and
    /// the write, or `Store`.
    #[tracing::instrument(skip(self, event), fields(%event_id))]
    pub async fn update_event(
        &self,
        event_id: EventId,
        event: NewEvent,
    ) -> Result<EventProjection, InventoryError> {
        validate_event(&event)?;
        match self
            .ledgers
            .update_event(event_id, &event.details, event.total_capacity)
            .await?
        {
            Some(record) => {
                self.cache.invalidate(event_id, record.ledger.revision).await;
                tracing::info!(capacity = event.total_capacity, "Event updated");
                Ok(EventProjection::from(&record))
            }
            None => Err(self.explain_resize_rejection(event_id, event.total_capacity).await),
        }
    }

    /// Change an event's total capacity, keeping sold seats sold.
    ///
    /// # Errors
    ///
    /// `InvalidRequest`, `LedgerNotFound`, `CapacityBelowSold`,
    /// `ConcurrentUpdateConflict`, or `Store`.
    #[tracing::instrument(skip(self), fields(%event_id))]
    pub async fn resize_capacity(
        &self,
        event_id: EventId,
        new_total: u32,
    ) -> Result<SeatLedger, InventoryError> {
        if new_total == 0 {
            return Err(InventoryError::InvalidRequest(
                "total capacity must be greater than zero".to_string(),
            ));
        }
        match self.ledgers.resize_if_covered(event_id, new_total).await? {
            Some(ledger) => {
                self.cache.invalidate(event_id, ledger.revision).await;
                tracing::info!(new_total, available = ledger.available_seats, "Capacity resized");
                Ok(ledger)
            }
            None => Err(self.explain_resize_rejection(event_id, new_total).await),
        }
    }

    /// A conditional resize matched no row: work out why.
    async fn explain_resize_rejection(&self, event_id: EventId, new_total: u32) -> InventoryError {
        match self.ledgers.load(event_id).await {
            Err(error) => error.into(),
            Ok(None) => InventoryError::LedgerNotFound(event_id),
            Ok(Some(record)) => match record.ledger.resized(new_total) {
                Err(error) => error,
                // The floor held on re-read, so a concurrent sale moved it.
                Ok(_) => InventoryError::ConcurrentUpdateConflict {
                    event_id,
                    attempts: 1,
                },
            },
        }
    }

    /// Delete an event that has no active bookings.
    ///
    /// The booking count is a fast pre-check. The store re-checks sold seats
    /// in the same step as the delete, so a reservation racing this call
    /// either lands first and blocks the delete or finds the event gone.
    ///
    /// # Errors
    ///
    /// `EventHasActiveBookings`, `LedgerNotFound`, or `Store`.
    #[tracing::instrument(skip(self), fields(%event_id))]
    pub async fn delete_event(&self, event_id: EventId) -> Result<(), InventoryError> {
        let active = self.bookings.count_active(event_id).await?;
        if active > 0 {
            return Err(InventoryError::EventHasActiveBookings { event_id, active });
        }
        if !self.ledgers.delete_event(event_id).await? {
            return Err(self.delete_refused(event_id).await);
        }
        self.cache.invalidate_deleted(event_id).await;
        tracing::info!("Event deleted");
        Ok(())
    }

    async fn delete_refused(&self, event_id: EventId) -> InventoryError {
        match self.ledgers.load(event_id).await {
            Ok(None) => InventoryError::LedgerNotFound(event_id),
            Ok(Some(record)) => {
                tracing::info!(
                    sold = record.ledger.sold(),
                    "Delete refused, seats were sold concurrently"
                );
                // A debited reservation may not have written its booking yet.
                let active = match self.bookings.count_active(event_id).await {
                    Ok(active) => active.max(1),
                    Err(error) => return error.into(),
                };
                InventoryError::EventHasActiveBookings { event_id, active }
            }
            Err(error) => error.into(),
        }
    }
}

fn price_for(price: Money, seats: u32) -> Result<Money, InventoryError> {
    price.checked_mul(seats).ok_or_else(|| {
        InventoryError::InvalidRequest(format!("total price for {seats} seats overflows"))
    })
}

fn validate_customer(customer: &CustomerInfo) -> Result<(), InventoryError> {
    if customer.name.trim().is_empty() {
        return Err(InventoryError::InvalidRequest(
            "customer name must not be empty".to_string(),
        ));
    }
    if customer.email.trim().is_empty() {
        return Err(InventoryError::InvalidRequest(
            "customer email must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_event(event: &NewEvent) -> Result<(), InventoryError> {
    if event.total_capacity == 0 {
        return Err(InventoryError::InvalidRequest(
            "total capacity must be greater than zero".to_string(),
        ));
    }
    if event.details.name.trim().is_empty() {
        return Err(InventoryError::InvalidRequest("event name must not be empty".to_string()));
    }
    if event.details.venue.trim().is_empty() {
        return Err(InventoryError::InvalidRequest("venue must not be empty".to_string()));
    }
    Ok(())
}

fn settle_panicked(error: JoinError) -> InventoryError {
    tracing::error!(%error, "Settle task did not complete");
    InventoryError::Store(StoreError::Database(format!("settle task failed: {error}")))
}
