//! `PostgreSQL` implementation of [`BookingStore`].

use crate::error::{classify, from_db_seats, from_db_u64, to_db_seats, to_db_u64};
use futures::future::BoxFuture;
use seat_inventory_core::error::StoreError;
use seat_inventory_core::store::{BookingStore, StoreResult};
use seat_inventory_core::types::{
    Booking, BookingCode, BookingId, BookingKind, BookingStatus, CustomerInfo, EventId, Money,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Bookings in `PostgreSQL`.
///
/// `code` carries a unique constraint, so a collision surfaces as
/// [`StoreError::Duplicate`] and the coordinator can regenerate the code.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Create a booking store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_status(
        &self,
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        let row = sqlx::query(
            r"
            UPDATE bookings
            SET status = $3, updated_at = now()
            WHERE booking_id = $1 AND status = $2
            RETURNING booking_id, code, kind, event_id, customer_name, customer_email,
                      seats_held, total_price_cents, status, created_at, updated_at
            ",
        )
        .bind(*id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify("update booking status", e))?;
        row.as_ref().map(booking_from_row).transpose()
    }
}

fn booking_from_row(row: &PgRow) -> StoreResult<Booking> {
    let get = |e: sqlx::Error| StoreError::Serialization(format!("booking row: {e}"));
    let kind: String = row.try_get("kind").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;
    Ok(Booking {
        id: BookingId::from_uuid(row.try_get::<Uuid, _>("booking_id").map_err(get)?),
        code: BookingCode::new(row.try_get::<String, _>("code").map_err(get)?),
        kind: kind.parse::<BookingKind>().map_err(StoreError::Serialization)?,
        event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id").map_err(get)?),
        customer: CustomerInfo::new(
            row.try_get::<String, _>("customer_name").map_err(get)?,
            row.try_get::<String, _>("customer_email").map_err(get)?,
        ),
        seats_held: from_db_seats("seats_held", row.try_get("seats_held").map_err(get)?)?,
        total_price: Money::from_cents(from_db_u64(
            "total_price_cents",
            row.try_get("total_price_cents").map_err(get)?,
        )?),
        status: status.parse::<BookingStatus>().map_err(StoreError::Serialization)?,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
    })
}

impl BookingStore for PostgresBookingStore {
    fn insert(&self, booking: &Booking) -> BoxFuture<'_, StoreResult<()>> {
        let booking = booking.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO bookings (
                    booking_id, code, kind, event_id, customer_name, customer_email,
                    seats_held, total_price_cents, status, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(*booking.id.as_uuid())
            .bind(booking.code.as_str())
            .bind(booking.kind.as_str())
            .bind(*booking.event_id.as_uuid())
            .bind(&booking.customer.name)
            .bind(&booking.customer.email)
            .bind(to_db_seats(booking.seats_held)?)
            .bind(to_db_u64("total_price_cents", booking.total_price.cents())?)
            .bind(booking.status.as_str())
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("insert booking", e))?;
            Ok(())
        })
    }

    fn get(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Option<Booking>>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT booking_id, code, kind, event_id, customer_name, customer_email,
                       seats_held, total_price_cents, status, created_at, updated_at
                FROM bookings
                WHERE booking_id = $1
                ",
            )
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("get booking", e))?;
            row.as_ref().map(booking_from_row).transpose()
        })
    }

    fn find_by_code(&self, code: &BookingCode) -> BoxFuture<'_, StoreResult<Option<Booking>>> {
        let code = code.clone();
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT booking_id, code, kind, event_id, customer_name, customer_email,
                       seats_held, total_price_cents, status, created_at, updated_at
                FROM bookings
                WHERE code = $1
                ",
            )
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("find booking by code", e))?;
            row.as_ref().map(booking_from_row).transpose()
        })
    }

    fn list_for_event(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT booking_id, code, kind, event_id, customer_name, customer_email,
                       seats_held, total_price_cents, status, created_at, updated_at
                FROM bookings
                WHERE event_id = $1
                ORDER BY seq
                ",
            )
            .bind(*event_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify("list bookings", e))?;
            rows.iter().map(booking_from_row).collect()
        })
    }

    fn count_active(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<u64>> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM bookings WHERE event_id = $1 AND status = 'active'",
            )
            .bind(*event_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify("count active bookings", e))?;
            from_db_u64("active count", count)
        })
    }

    fn mark_cancelled(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Option<Booking>>> {
        Box::pin(self.set_status(id, BookingStatus::Active, BookingStatus::Cancelled))
    }

    fn revert_cancellation(&self, id: BookingId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.set_status(id, BookingStatus::Cancelled, BookingStatus::Active)
                .await?;
            Ok(())
        })
    }
}
