//! `PostgreSQL` stores for the seat inventory engine.
//!
//! This crate implements the `LedgerStore` and `BookingStore` traits from
//! `seat-inventory-core` on top of a sqlx [`PgPool`]:
//!
//! - [`PostgresLedgerStore`]: event rows and their seat ledgers. Row holds use
//!   `SELECT ... FOR UPDATE` under a transaction-local `lock_timeout`; the
//!   atomic and optimistic primitives are single conditional `UPDATE`s.
//! - [`PostgresBookingStore`]: bookings, with a unique booking code and an
//!   `active → cancelled` transition that only one caller can win.
//!
//! The schema lives in `migrations/` and is applied with [`migrate`].
//!
//! # Example
//!
//! ```ignore
//! use seat_inventory_postgres::{PostgresBookingStore, PostgresLedgerStore, migrate};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::PgPool::connect("postgres://localhost/seats").await?;
//!     migrate(&pool).await?;
//!     let ledgers = PostgresLedgerStore::new(pool.clone());
//!     let bookings = PostgresBookingStore::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod error;
mod ledger;

pub use bookings::PostgresBookingStore;
pub use ledger::PostgresLedgerStore;

use seat_inventory_core::error::StoreError;
use sqlx::PgPool;

/// Apply the bundled schema migrations.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
    tracing::info!("Seat inventory migrations applied");
    Ok(())
}
