//! In-memory [`CacheBackend`] with TTLs and outage injection.
//!
//! Expiry uses `tokio::time::Instant`, so tests running with a paused clock
//! can expire entries with `tokio::time::advance`.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use futures::future::BoxFuture;
use seat_inventory_core::cache::{CacheBackend, CacheResult, decode_counter};
use seat_inventory_core::error::CacheError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// In-memory key/value cache.
///
/// # Example
///
/// ```
/// use seat_inventory_testing::InMemoryCacheBackend;
///
/// let cache = InMemoryCacheBackend::new();
/// cache.set_available(false); // every call now fails with `Unavailable`
/// assert!(cache.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryCacheBackend {
    entries: Arc<Mutex<HashMap<String, (Vec<u8>, Instant)>>>,
    down: Arc<AtomicBool>,
    gets: Arc<AtomicUsize>,
    sets: Arc<AtomicUsize>,
    evicts: Arc<AtomicUsize>,
    raises: Arc<AtomicUsize>,
}

impl InMemoryCacheBackend {
    /// Create an empty, reachable cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.down.store(!available, Ordering::SeqCst);
    }

    /// Raw value under `key`, ignoring outages. Expired entries read as `None`.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|(_, expires)| Instant::now() < *expires)
            .map(|(value, _)| value.clone())
    }

    /// Write a raw value, ignoring outages.
    pub fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    /// Live keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (_, expires))| now < *expires)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Whether no live entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Number of `get` calls received (including failed ones).
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls received (including failed ones).
    #[must_use]
    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of `evict` calls received (including failed ones).
    #[must_use]
    pub fn evict_calls(&self) -> usize {
        self.evicts.load(Ordering::SeqCst)
    }

    /// Number of `raise` calls received (including failed ones).
    #[must_use]
    pub fn raise_calls(&self) -> usize {
        self.raises.load(Ordering::SeqCst)
    }

    fn reachable(&self) -> CacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

impl CacheBackend for InMemoryCacheBackend {
    fn get(&self, key: &str) -> BoxFuture<'_, CacheResult<Option<Vec<u8>>>> {
        let key = key.to_string();
        Box::pin(async move {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.reachable()?;
            let mut entries = self.entries.lock().unwrap();
            let expired = entries
                .get(&key)
                .is_some_and(|(_, expires)| Instant::now() >= *expires);
            if expired {
                entries.remove(&key);
                return Ok(None);
            }
            Ok(entries.get(&key).map(|(value, _)| value.clone()))
        })
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, CacheResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.reachable()?;
            self.put(&key, value, ttl);
            Ok(())
        })
    }

    fn evict(&self, key: &str) -> BoxFuture<'_, CacheResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            self.evicts.fetch_add(1, Ordering::SeqCst);
            self.reachable()?;
            self.entries.lock().unwrap().remove(&key);
            Ok(())
        })
    }

    fn raise(&self, key: &str, floor: u64, ttl: Duration) -> BoxFuture<'_, CacheResult<u64>> {
        let key = key.to_string();
        Box::pin(async move {
            self.raises.fetch_add(1, Ordering::SeqCst);
            self.reachable()?;
            let now = Instant::now();
            let mut entries = self.entries.lock().unwrap();
            let current = entries
                .get(&key)
                .filter(|(_, expires)| now < *expires)
                .and_then(|(value, _)| decode_counter(value));
            let raised = current.map_or(floor, |current| current.max(floor));
            entries.insert(key, (raised.to_string().into_bytes(), now + ttl));
            Ok(raised)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_raise_never_lowers_counter() {
        let cache = InMemoryCacheBackend::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(cache.raise("fence", 5, ttl).await.unwrap(), 5);
        assert_eq!(cache.raise("fence", 3, ttl).await.unwrap(), 5);
        assert_eq!(cache.raise("fence", 9, ttl).await.unwrap(), 9);
        assert_eq!(cache.peek("fence"), Some(b"9".to_vec()));
        assert_eq!(cache.raise_calls(), 3);
    }

    #[tokio::test]
    async fn test_raise_replaces_unreadable_value() {
        let cache = InMemoryCacheBackend::new();
        cache.put("fence", vec![0xde, 0xad], Duration::from_secs(60));

        assert_eq!(cache.raise("fence", 2, Duration::from_secs(60)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_raise_after_expiry_starts_over() {
        let cache = InMemoryCacheBackend::new();
        cache.raise("fence", 7, Duration::from_millis(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.raise("fence", 1, Duration::from_secs(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_raise_fails_during_outage() {
        let cache = InMemoryCacheBackend::new();
        cache.set_available(false);

        assert!(matches!(
            cache.raise("fence", 1, Duration::from_secs(1)).await,
            Err(CacheError::Unavailable(_))
        ));
    }
}
