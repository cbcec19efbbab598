//! Cache backend abstraction.
//!
//! A plain key/value store reachable over the network. The projection cache
//! builds its read-through and fencing logic on top of these calls.
//!
//! `Ok(None)` means "key not present"; [`CacheError::Unavailable`] means the
//! backend could not be asked. Callers treat the two very differently.

use crate::error::CacheError;
use futures::future::BoxFuture;
use std::time::Duration;

/// Result type for cache backend operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key/value cache with per-entry expiry.
pub trait CacheBackend: Send + Sync {
    /// Fetch a value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn get(&self, key: &str) -> BoxFuture<'_, CacheResult<Option<Vec<u8>>>>;

    /// Store a value that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, CacheResult<()>>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn evict(&self, key: &str) -> BoxFuture<'_, CacheResult<()>>;

    /// Raise the counter at `key` to at least `floor` and reset its expiry to
    /// `ttl`, in one atomic step. The counter never moves down.
    ///
    /// Counters are stored as ASCII decimal so [`CacheBackend::get`] can read
    /// them back. A missing or unparsable value counts as absent. Returns the
    /// counter after the call.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn raise(&self, key: &str, floor: u64, ttl: Duration) -> BoxFuture<'_, CacheResult<u64>>;
}

/// Decode a counter written by [`CacheBackend::raise`].
#[must_use]
pub fn decode_counter(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_counter() {
        assert_eq!(decode_counter(b"42"), Some(42));
        assert_eq!(decode_counter(u64::MAX.to_string().as_bytes()), Some(u64::MAX));
        assert_eq!(decode_counter(b"-1"), None);
        assert_eq!(decode_counter(&[0xff, 0x00]), None);
    }
}
