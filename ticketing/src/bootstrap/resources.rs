//! Resource management for infrastructure setup.
//!
//! Centralizes infrastructure initialization (database pool, migrations,
//! cache backend, environment) into a single `ResourceManager`:
//!
//! 1. Connect to `PostgreSQL` and run migrations
//! 2. Connect to Redis
//! 3. Build the stores and environment shared by every coordinator
//!
//! # Example
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! let resources = ResourceManager::from_config(&config).await?;
//! ```

use crate::config::Config;
use seat_inventory_core::cache::CacheBackend;
use seat_inventory_core::environment::{Clock, CodeGenerator, RandomCodeGenerator, SystemClock};
use seat_inventory_core::error::{CacheError, StoreError};
use seat_inventory_core::store::{BookingStore, LedgerStore};
use seat_inventory_postgres::{PostgresBookingStore, PostgresLedgerStore, migrate};
use seat_inventory_projections::RedisCacheBackend;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors raised while bringing infrastructure up.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The database pool could not be created
    #[error("Failed to connect to PostgreSQL: {0}")]
    Database(#[from] sqlx::Error),

    /// Migrations failed
    #[error("Failed to migrate: {0}")]
    Migration(#[from] StoreError),

    /// The cache backend could not be reached at startup
    #[error("Failed to connect to Redis: {0}")]
    Cache(#[from] CacheError),
}

/// Infrastructure shared by every coordinator in the process.
///
/// All resources are wrapped in `Arc` so they can be shared across tasks.
#[derive(Clone)]
pub struct ResourceManager {
    /// Application configuration
    pub config: Arc<Config>,
    /// System clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Booking code generator
    pub codes: Arc<dyn CodeGenerator>,
    /// Event rows and seat ledgers
    pub ledgers: Arc<dyn LedgerStore>,
    /// Bookings
    pub bookings: Arc<dyn BookingStore>,
    /// Projection cache backend
    pub cache_backend: Arc<dyn CacheBackend>,
}

impl ResourceManager {
    /// Initialize all infrastructure resources from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if the database is unreachable, migrations
    /// fail, or Redis cannot be reached at startup. Later Redis outages are
    /// tolerated by the projection cache.
    pub async fn from_config(config: &Config) -> Result<Self, BootstrapError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.postgres.max_connections)
            .min_connections(config.postgres.min_connections)
            .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
            .idle_timeout(Duration::from_secs(config.postgres.idle_timeout))
            .connect(&config.postgres.url)
            .await?;
        info!("PostgreSQL connected");

        info!("Running migrations...");
        migrate(&pool).await?;
        info!("Migrations complete");

        info!("Connecting to Redis...");
        let cache_backend = RedisCacheBackend::connect(
            &config.redis.url,
            Duration::from_millis(config.redis.op_timeout_ms),
        )
        .await?;
        info!("Redis connected");

        Ok(Self {
            config: Arc::new(config.clone()),
            clock: Arc::new(SystemClock),
            codes: Arc::new(RandomCodeGenerator),
            ledgers: Arc::new(PostgresLedgerStore::new(pool.clone())),
            bookings: Arc::new(PostgresBookingStore::new(pool)),
            cache_backend: Arc::new(cache_backend),
        })
    }
}
