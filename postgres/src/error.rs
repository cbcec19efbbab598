//! sqlx error classification and column conversions.

use seat_inventory_core::error::StoreError;

/// `lock_not_available`: raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// `query_canceled`: raised when `statement_timeout` expires.
const QUERY_CANCELED: &str = "57014";

/// Map a sqlx error onto the store taxonomy.
pub(crate) fn classify(context: &str, error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unique").to_string();
            return StoreError::Duplicate(constraint);
        }
        if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            metrics::counter!("seat_store.lock_timeouts").increment(1);
            return StoreError::LockTimeout;
        }
        if db_err.code().as_deref() == Some(QUERY_CANCELED) {
            metrics::counter!("seat_store.statement_timeouts").increment(1);
            return StoreError::StatementTimeout;
        }
        if db_err.is_check_violation() {
            let constraint = db_err.constraint().unwrap_or("check").to_string();
            return StoreError::Constraint(constraint);
        }
    }
    StoreError::Database(format!("{context}: {error}"))
}

/// Seat counts are `u32` in the domain and `INTEGER` in the schema.
pub(crate) fn to_db_seats(seats: u32) -> Result<i32, StoreError> {
    i32::try_from(seats)
        .map_err(|_| StoreError::Serialization(format!("seat count {seats} exceeds INTEGER range")))
}

pub(crate) fn from_db_seats(column: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("negative {column}: {value}")))
}

/// Revisions and money are `u64` in the domain and `BIGINT` in the schema.
pub(crate) fn to_db_u64(column: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{column} {value} exceeds BIGINT range")))
}

pub(crate) fn from_db_u64(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("negative {column}: {value}")))
}
