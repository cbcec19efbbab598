//! Read-through cache of [`EventProjection`]s with write-side invalidation.
//!
//! # Coherence
//!
//! Every successful ledger mutation calls [`ProjectionCache::invalidate`] with
//! the revision it committed. Invalidation writes a *fence* (that revision)
//! next to the entry and then evicts the entry. A cached projection whose
//! revision is below the fence is never served.
//!
//! The fence closes the classic read-through race: a reader that loaded the
//! row before a write committed may finish repopulating *after* the writer's
//! eviction. Without a fence that stale entry would be served until its TTL
//! expired; with one, the next read discards it and reloads.
//!
//! Fences only move up. Writers that commit in one order may invalidate in the
//! other, so the fence is raised atomically by the backend rather than
//! overwritten; a late invalidation for an older revision leaves a newer fence
//! in place.
//!
//! Fences live for twice the entry TTL, so an entry repopulated after the fence
//! was written always expires before the fence does.
//!
//! # Outages
//!
//! Cache failures never fail a read. An unreachable backend (or an open
//! circuit breaker) sends reads straight to the store; invalidation failures
//! are logged and counted, and the write that triggered them still succeeds.
//!
//! # Keys
//!
//! - `{prefix}:event:{id}`: bincode-encoded [`EventProjection`]
//! - `{prefix}:event:{id}:fence`: revision as ASCII decimal

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::metrics::CacheMetrics;
use seat_inventory_core::cache::{CacheBackend, decode_counter};
use seat_inventory_core::error::{CacheError, InventoryError};
use seat_inventory_core::store::LedgerStore;
use seat_inventory_core::types::{EventId, EventProjection};
use std::sync::Arc;
use std::time::Duration;

/// Fence value that rejects every cached projection for an event.
const TOMBSTONE: u64 = u64::MAX;

/// Projection cache settings.
#[derive(Debug, Clone)]
pub struct ProjectionCacheConfig {
    /// Entry lifetime
    pub ttl: Duration,
    /// Namespace prepended to every key
    pub key_prefix: String,
    /// Breaker guarding cache reads
    pub breaker: CircuitBreakerConfig,
}

impl Default for ProjectionCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            key_prefix: "seats".to_string(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

enum Lookup {
    Hit(EventProjection),
    Miss,
    Unavailable,
}

/// Read-through projection cache over a [`CacheBackend`] and a [`LedgerStore`].
pub struct ProjectionCache {
    backend: Arc<dyn CacheBackend>,
    store: Arc<dyn LedgerStore>,
    config: ProjectionCacheConfig,
    breaker: CircuitBreaker,
}

impl ProjectionCache {
    /// Create a projection cache.
    #[must_use]
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        store: Arc<dyn LedgerStore>,
        config: ProjectionCacheConfig,
    ) -> Self {
        let breaker = CircuitBreaker::new("projection_cache", config.breaker.clone());
        Self {
            backend,
            store,
            config,
            breaker,
        }
    }

    /// Breaker guarding cache reads.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn entry_key(&self, event_id: EventId) -> String {
        format!("{}:event:{event_id}", self.config.key_prefix)
    }

    fn fence_key(&self, event_id: EventId) -> String {
        format!("{}:event:{event_id}:fence", self.config.key_prefix)
    }

    fn fence_ttl(&self) -> Duration {
        self.config.ttl.saturating_mul(2)
    }

    /// Current projection for an event.
    ///
    /// Served from cache when a fresh entry exists; otherwise loaded from the
    /// store and written back with the configured TTL.
    ///
    /// # Errors
    ///
    /// - `LedgerNotFound` if the event does not exist
    /// - `Store` if the store cannot be read
    pub async fn get(&self, event_id: EventId) -> Result<EventProjection, InventoryError> {
        let populate = match self.lookup(event_id).await {
            Lookup::Hit(projection) => {
                CacheMetrics::record_hit();
                return Ok(projection);
            }
            Lookup::Miss => {
                CacheMetrics::record_miss();
                true
            }
            Lookup::Unavailable => {
                CacheMetrics::record_fallback();
                false
            }
        };

        let record = self
            .store
            .load(event_id)
            .await?
            .ok_or(InventoryError::LedgerNotFound(event_id))?;
        let projection = EventProjection::from(&record);

        if populate {
            self.populate(&projection).await;
        }
        Ok(projection)
    }

    async fn lookup(&self, event_id: EventId) -> Lookup {
        if !self.breaker.allows_request() {
            return Lookup::Unavailable;
        }

        let entry_key = self.entry_key(event_id);
        let entry = match self.backend.get(&entry_key).await {
            Ok(entry) => entry,
            Err(error) => return self.unavailable(event_id, &error),
        };
        let Some(bytes) = entry else {
            self.breaker.record_success();
            return Lookup::Miss;
        };

        let projection = match bincode::deserialize::<EventProjection>(&bytes) {
            Ok(projection) => projection,
            Err(error) => {
                tracing::warn!(%event_id, %error, "Discarding undecodable cache entry");
                if let Err(error) = self.backend.evict(&entry_key).await {
                    tracing::debug!(%event_id, %error, "Could not evict undecodable entry");
                }
                return Lookup::Miss;
            }
        };

        let fence = match self.backend.get(&self.fence_key(event_id)).await {
            Ok(fence) => fence.and_then(|bytes| decode_counter(&bytes)),
            Err(error) => return self.unavailable(event_id, &error),
        };
        self.breaker.record_success();

        match fence {
            Some(floor) if projection.revision < floor => {
                CacheMetrics::record_stale_discard();
                tracing::debug!(
                    %event_id,
                    cached = projection.revision,
                    fence = floor,
                    "Discarding cached projection older than fence"
                );
                Lookup::Miss
            }
            _ => Lookup::Hit(projection),
        }
    }

    fn unavailable(&self, event_id: EventId, error: &CacheError) -> Lookup {
        self.breaker.record_failure();
        tracing::warn!(%event_id, %error, "Cache read failed, falling back to store");
        Lookup::Unavailable
    }

    async fn populate(&self, projection: &EventProjection) {
        let bytes = match bincode::serialize(projection) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(event_id = %projection.event_id, %error, "Could not encode projection");
                return;
            }
        };
        match self
            .backend
            .set(&self.entry_key(projection.event_id), bytes, self.config.ttl)
            .await
        {
            Ok(()) => self.breaker.record_success(),
            Err(error) => {
                self.breaker.record_failure();
                tracing::warn!(event_id = %projection.event_id, %error, "Could not populate cache");
            }
        }
    }

    /// Make every cached projection older than `committed_revision` unreadable.
    ///
    /// Never fails; problems are logged and counted. The breaker is bypassed
    /// so an invalidation is attempted even while reads are short-circuited.
    pub async fn invalidate(&self, event_id: EventId, committed_revision: u64) {
        self.write_fence(event_id, committed_revision).await;

        if let Err(error) = self.backend.evict(&self.entry_key(event_id)).await {
            CacheMetrics::record_invalidation_failure();
            tracing::warn!(%event_id, %error, "Cache eviction failed");
        }
    }

    /// Invalidate after the event was deleted: no cached projection survives.
    pub async fn invalidate_deleted(&self, event_id: EventId) {
        self.invalidate(event_id, TOMBSTONE).await;
    }

    async fn write_fence(&self, event_id: EventId, revision: u64) {
        match self
            .backend
            .raise(&self.fence_key(event_id), revision, self.fence_ttl())
            .await
        {
            Ok(fence) if fence > revision => {
                tracing::debug!(%event_id, revision, fence, "Fence already past revision");
            }
            Ok(_) => {}
            Err(error) => {
                CacheMetrics::record_invalidation_failure();
                tracing::warn!(%event_id, revision, %error, "Cache fence write failed");
            }
        }
    }
}
