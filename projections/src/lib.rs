//! Cache backends for seat inventory projections.
//!
//! # Overview
//!
//! The runtime's `ProjectionCache` talks to a `CacheBackend`. This crate
//! provides the production backend:
//!
//! - **[`RedisCacheBackend`]**: `GET` / `PSETEX` / `DEL` over a shared
//!   `ConnectionManager`, with a per-command timeout
//!
//! Every Redis failure (connection refused, timeout, protocol error) is
//! reported as `CacheError::Unavailable`, which the projection cache treats
//! as "read from the store instead".
//!
//! # Example
//!
//! ```ignore
//! use seat_inventory_projections::RedisCacheBackend;
//! use std::time::Duration;
//!
//! let backend = RedisCacheBackend::connect("redis://127.0.0.1:6379", Duration::from_millis(250)).await?;
//! let cache = ProjectionCache::new(Arc::new(backend), ledgers, ProjectionCacheConfig::default());
//! ```

pub mod redis_cache;

pub use redis_cache::RedisCacheBackend;
