//! Integration tests for `RedisCacheBackend` using testcontainers.
//!
//! Docker must be running; the tests are ignored by default:
//!
//! ```bash
//! cargo test -p seat-inventory-projections -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code uses expect for clear failure messages

use seat_inventory_core::cache::CacheBackend;
use seat_inventory_core::error::CacheError;
use seat_inventory_core::strategy::StrategyKind;
use seat_inventory_projections::RedisCacheBackend;
use seat_inventory_runtime::projection_cache::{ProjectionCache, ProjectionCacheConfig};
use seat_inventory_testing::TestHarness;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;

async fn setup_redis() -> (ContainerAsync<Redis>, RedisCacheBackend) {
    let container = Redis::default()
        .start()
        .await
        .expect("Failed to start redis container");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get redis port");

    let backend = RedisCacheBackend::connect(
        &format!("redis://127.0.0.1:{port}"),
        Duration::from_millis(500),
    )
    .await
    .expect("Failed to connect to redis");
    (container, backend)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_set_get_evict() {
    let (_container, backend) = setup_redis().await;

    assert_eq!(backend.get("seats:event:a").await.unwrap(), None);
    backend
        .set("seats:event:a", vec![1, 2, 3], Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(backend.get("seats:event:a").await.unwrap(), Some(vec![1, 2, 3]));

    backend.evict("seats:event:a").await.unwrap();
    assert_eq!(backend.get("seats:event:a").await.unwrap(), None);
    backend.evict("seats:event:missing").await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_entries_expire() {
    let (_container, backend) = setup_redis().await;

    backend
        .set("seats:event:b", vec![9], Duration::from_millis(100))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(backend.get("seats:event:b").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_raise_only_moves_up() {
    let (_container, backend) = setup_redis().await;
    let ttl = Duration::from_secs(60);

    assert_eq!(backend.raise("seats:event:f:fence", 9, ttl).await.unwrap(), 9);
    assert_eq!(backend.raise("seats:event:f:fence", 10, ttl).await.unwrap(), 10);
    assert_eq!(backend.raise("seats:event:f:fence", 2, ttl).await.unwrap(), 10);
    assert_eq!(
        backend.raise("seats:event:f:fence", u64::MAX, ttl).await.unwrap(),
        u64::MAX
    );
    assert_eq!(
        backend.raise("seats:event:f:fence", u64::MAX - 1, ttl).await.unwrap(),
        u64::MAX
    );
    assert_eq!(
        backend.get("seats:event:f:fence").await.unwrap(),
        Some(u64::MAX.to_string().into_bytes())
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_raise_overwrites_foreign_value_and_expires() {
    let (_container, backend) = setup_redis().await;

    backend
        .set("seats:event:g:fence", b"not-a-number".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        backend
            .raise("seats:event:g:fence", 3, Duration::from_millis(100))
            .await
            .unwrap(),
        3
    );

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(backend.get("seats:event:g:fence").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_stopped_server_reports_unavailable() {
    let (container, backend) = setup_redis().await;
    container.stop().await.expect("Failed to stop redis");

    let result = backend.get("seats:event:c").await;
    assert!(matches!(result, Err(CacheError::Unavailable(_))));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_projection_cache_over_redis() {
    let (_container, backend) = setup_redis().await;
    let backend = Arc::new(backend);
    let harness = TestHarness::new(StrategyKind::Atomic);
    let cache = ProjectionCache::new(
        backend.clone(),
        harness.ledgers.clone(),
        ProjectionCacheConfig::default(),
    );
    let event_id = harness.create_event(10).await;

    assert_eq!(cache.get(event_id).await.unwrap().available_seats, 10);
    harness
        .coordinator
        .reserve(event_id, 4, harness.customer())
        .await
        .unwrap();
    // The coordinator invalidated its own cache, not this one.
    assert_eq!(cache.get(event_id).await.unwrap().available_seats, 10);

    let revision = harness.ledgers.ledger(event_id).unwrap().revision;
    cache.invalidate(event_id, revision).await;
    assert_eq!(cache.get(event_id).await.unwrap().available_seats, 6);

    // An invalidation that arrives late keeps the newer fence.
    cache.invalidate(event_id, revision - 1).await;
    let fence = backend
        .get(&format!("seats:event:{event_id}:fence"))
        .await
        .unwrap();
    assert_eq!(fence, Some(revision.to_string().into_bytes()));
}
