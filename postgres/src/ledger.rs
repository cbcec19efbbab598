//! `PostgreSQL` implementation of [`LedgerStore`].

use crate::error::{classify, from_db_seats, from_db_u64, to_db_seats, to_db_u64};
use futures::future::BoxFuture;
use seat_inventory_core::error::StoreError;
use seat_inventory_core::ledger::SeatLedger;
use seat_inventory_core::store::{LedgerLock, LedgerStore, StoreResult};
use seat_inventory_core::types::{EventDetails, EventId, EventRecord, Money};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use uuid::Uuid;

/// Event rows and seat ledgers in `PostgreSQL`.
///
/// Every mutation bumps `revision` in the same statement that changes the
/// seat counts, and the `available_seats_in_range` check constraint backs up
/// the capacity rules enforced by the statements themselves.
///
/// Bounded statements run in their own transaction with a transaction-local
/// `statement_timeout`, so the server cancels and rolls back a slow statement
/// instead of the client abandoning one that may still commit.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Create a ledger store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_ledger_within(
        &self,
        context: &'static str,
        limit: Duration,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> StoreResult<Option<SeatLedger>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify("begin transaction", e))?;
        set_local_timeout(&mut tx, "statement_timeout", limit).await?;
        let row = query
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| classify(context, e))?;
        tx.commit().await.map_err(|e| classify(context, e))?;
        row.as_ref().map(ledger_from_row).transpose()
    }

    async fn fetch_ledger(
        &self,
        context: &'static str,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> StoreResult<Option<SeatLedger>> {
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(context, e))?;
        row.as_ref().map(ledger_from_row).transpose()
    }
}

/// Scope a timeout setting to the open transaction. Postgres reads 0 as "no
/// limit", so anything under a millisecond rounds up.
async fn set_local_timeout(
    tx: &mut Transaction<'static, Postgres>,
    setting: &'static str,
    limit: Duration,
) -> StoreResult<()> {
    let millis = limit.as_millis().max(1);
    sqlx::query("SELECT set_config($1, $2, true)")
        .bind(setting)
        .bind(format!("{millis}ms"))
        .execute(&mut **tx)
        .await
        .map_err(|e| classify("set timeout", e))?;
    Ok(())
}

fn ledger_from_row(row: &PgRow) -> StoreResult<SeatLedger> {
    let get = |e: sqlx::Error| StoreError::Serialization(format!("ledger row: {e}"));
    Ok(SeatLedger {
        event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id").map_err(get)?),
        total_capacity: from_db_seats("total_capacity", row.try_get("total_capacity").map_err(get)?)?,
        available_seats: from_db_seats(
            "available_seats",
            row.try_get("available_seats").map_err(get)?,
        )?,
        revision: from_db_u64("revision", row.try_get("revision").map_err(get)?)?,
    })
}

fn record_from_row(row: &PgRow) -> StoreResult<EventRecord> {
    let get = |e: sqlx::Error| StoreError::Serialization(format!("event row: {e}"));
    Ok(EventRecord {
        details: EventDetails {
            name: row.try_get("name").map_err(get)?,
            description: row.try_get("description").map_err(get)?,
            venue: row.try_get("venue").map_err(get)?,
            event_date: row.try_get("event_date").map_err(get)?,
            price: Money::from_cents(from_db_u64(
                "price_cents",
                row.try_get("price_cents").map_err(get)?,
            )?),
        },
        ledger: ledger_from_row(row)?,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
    })
}

impl LedgerStore for PostgresLedgerStore {
    fn insert_event(&self, record: &EventRecord) -> BoxFuture<'_, StoreResult<()>> {
        let record = record.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO events (
                    event_id, name, description, venue, event_date, price_cents,
                    total_capacity, available_seats, revision, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(*record.ledger.event_id.as_uuid())
            .bind(&record.details.name)
            .bind(&record.details.description)
            .bind(&record.details.venue)
            .bind(record.details.event_date)
            .bind(to_db_u64("price_cents", record.details.price.cents())?)
            .bind(to_db_seats(record.ledger.total_capacity)?)
            .bind(to_db_seats(record.ledger.available_seats)?)
            .bind(to_db_u64("revision", record.ledger.revision)?)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("insert event", e))?;
            Ok(())
        })
    }

    fn load(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<Option<EventRecord>>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT event_id, name, description, venue, event_date, price_cents,
                       total_capacity, available_seats, revision, created_at, updated_at
                FROM events
                WHERE event_id = $1
                ",
            )
            .bind(*event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("load event", e))?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn lock(
        &self,
        event_id: EventId,
        wait: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<Box<dyn LedgerLock>>>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| classify("begin transaction", e))?;

            set_local_timeout(&mut tx, "lock_timeout", wait).await?;

            let row = sqlx::query(
                r"
                SELECT event_id, total_capacity, available_seats, revision
                FROM events
                WHERE event_id = $1
                FOR UPDATE
                ",
            )
            .bind(*event_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| classify("lock event", e))?;

            let Some(row) = row else {
                if let Err(error) = tx.rollback().await {
                    tracing::debug!(%event_id, %error, "Rollback after missing row failed");
                }
                return Ok(None);
            };

            let ledger = ledger_from_row(&row)?;
            Ok(Some(Box::new(PostgresLedgerLock { tx, ledger }) as Box<dyn LedgerLock>))
        })
    }

    fn decrement_if_available(
        &self,
        event_id: EventId,
        seats: u32,
        limit: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>> {
        Box::pin(async move {
            let query = sqlx::query(
                r"
                UPDATE events
                SET available_seats = available_seats - $2,
                    revision = revision + 1,
                    updated_at = now()
                WHERE event_id = $1 AND available_seats >= $2
                RETURNING event_id, total_capacity, available_seats, revision
                ",
            )
            .bind(*event_id.as_uuid())
            .bind(to_db_seats(seats)?);
            self.fetch_ledger_within("decrement seats", limit, query).await
        })
    }

    fn increment(
        &self,
        event_id: EventId,
        seats: u32,
        limit: Duration,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>> {
        Box::pin(async move {
            let query = sqlx::query(
                r"
                UPDATE events
                SET available_seats = available_seats + $2,
                    revision = revision + 1,
                    updated_at = now()
                WHERE event_id = $1
                RETURNING event_id, total_capacity, available_seats, revision
                ",
            )
            .bind(*event_id.as_uuid())
            .bind(to_db_seats(seats)?);
            self.fetch_ledger_within("increment seats", limit, query).await
        })
    }

    fn compare_and_set(
        &self,
        event_id: EventId,
        expected_revision: u64,
        available_seats: u32,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>> {
        Box::pin(async move {
            let query = sqlx::query(
                r"
                UPDATE events
                SET available_seats = $3,
                    revision = revision + 1,
                    updated_at = now()
                WHERE event_id = $1 AND revision = $2
                RETURNING event_id, total_capacity, available_seats, revision
                ",
            )
            .bind(*event_id.as_uuid())
            .bind(to_db_u64("revision", expected_revision)?)
            .bind(to_db_seats(available_seats)?);
            self.fetch_ledger("compare-and-set seats", query).await
        })
    }

    fn resize_if_covered(
        &self,
        event_id: EventId,
        new_total: u32,
    ) -> BoxFuture<'_, StoreResult<Option<SeatLedger>>> {
        Box::pin(async move {
            let query = sqlx::query(
                r"
                UPDATE events
                SET total_capacity = $2,
                    available_seats = available_seats + ($2 - total_capacity),
                    revision = revision + 1,
                    updated_at = now()
                WHERE event_id = $1 AND $2 >= total_capacity - available_seats
                RETURNING event_id, total_capacity, available_seats, revision
                ",
            )
            .bind(*event_id.as_uuid())
            .bind(to_db_seats(new_total)?);
            self.fetch_ledger("resize capacity", query).await
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
            let row = sqlx::query(
                r"
                UPDATE events
                SET name = $2,
                    description = $3,
                    venue = $4,
                    event_date = $5,
                    price_cents = $6,
                    total_capacity = $7,
                    available_seats = available_seats + ($7 - total_capacity),
                    revision = revision + 1,
                    updated_at = now()
                WHERE event_id = $1 AND $7 >= total_capacity - available_seats
                RETURNING event_id, name, description, venue, event_date, price_cents,
                          total_capacity, available_seats, revision, created_at, updated_at
                ",
            )
            .bind(*event_id.as_uuid())
            .bind(&details.name)
            .bind(&details.description)
            .bind(&details.venue)
            .bind(details.event_date)
            .bind(to_db_u64("price_cents", details.price.cents())?)
            .bind(to_db_seats(new_total)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("update event", e))?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn delete_event(&self, event_id: EventId) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| classify("begin transaction", e))?;

            // Holding the row until commit queues debits and booking inserts
            // behind the delete. A debit that committed first fails the seat
            // check when the row is re-read after the wait.
            let deletable = sqlx::query(
                r"
                SELECT e.event_id
                FROM events e
                WHERE e.event_id = $1
                  AND e.available_seats = e.total_capacity
                  AND NOT EXISTS (
                      SELECT 1 FROM bookings b
                      WHERE b.event_id = e.event_id AND b.status = 'active'
                  )
                FOR UPDATE
                ",
            )
            .bind(*event_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| classify("lock event for delete", e))?;

            if deletable.is_none() {
                if let Err(error) = tx.rollback().await {
                    tracing::debug!(%event_id, %error, "Rollback after refused delete failed");
                }
                return Ok(false);
            }

            sqlx::query("DELETE FROM bookings WHERE event_id = $1 AND status = 'cancelled'")
                .bind(*event_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| classify("delete cancelled bookings", e))?;
            let result = sqlx::query("DELETE FROM events WHERE event_id = $1")
                .bind(*event_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| classify("delete event", e))?;
            tx.commit()
                .await
                .map_err(|e| classify("commit delete", e))?;
            Ok(result.rows_affected() == 1)
        })
    }
}

/// A row held by `SELECT ... FOR UPDATE` inside an open transaction.
///
/// Dropping it drops the transaction, which rolls back and releases the row.
struct PostgresLedgerLock {
    tx: Transaction<'static, Postgres>,
    ledger: SeatLedger,
}

impl LedgerLock for PostgresLedgerLock {
    fn ledger(&self) -> &SeatLedger {
        &self.ledger
    }

    fn commit(self: Box<Self>, available_seats: u32) -> BoxFuture<'static, StoreResult<SeatLedger>> {
        Box::pin(async move {
            let Self { mut tx, ledger } = *self;
            let row = sqlx::query(
                r"
                UPDATE events
                SET available_seats = $2,
                    revision = revision + 1,
                    updated_at = now()
                WHERE event_id = $1
                RETURNING event_id, total_capacity, available_seats, revision
                ",
            )
            .bind(*ledger.event_id.as_uuid())
            .bind(to_db_seats(available_seats)?)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify("write held ledger", e))?;
            let committed = ledger_from_row(&row)?;

            tx.commit()
                .await
                .map_err(|e| classify("commit held ledger", e))?;
            Ok(committed)
        })
    }
}
