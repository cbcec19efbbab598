//! Application bootstrap: infrastructure first, then the coordinator on top.

mod resources;

pub use resources::{BootstrapError, ResourceManager};

use seat_inventory_runtime::strategies::{NoHoldDelay, build_strategy};
use seat_inventory_runtime::{BookingCoordinator, ProjectionCache};
use std::sync::Arc;

/// Build a coordinator over the shared resources, using the configured
/// strategy and projection cache settings.
#[must_use]
pub fn build_coordinator(resources: &ResourceManager) -> BookingCoordinator {
    let config = &resources.config;
    let strategy = build_strategy(
        &config.strategy_config(),
        Arc::clone(&resources.ledgers),
        Arc::new(NoHoldDelay),
    );
    let cache = Arc::new(ProjectionCache::new(
        Arc::clone(&resources.cache_backend),
        Arc::clone(&resources.ledgers),
        config.projection_cache_config(),
    ));

    tracing::info!(
        strategy = %strategy.kind(),
        cache_ttl_secs = config.cache.ttl_secs,
        "Coordinator ready"
    );

    BookingCoordinator::new(
        strategy,
        Arc::clone(&resources.ledgers),
        Arc::clone(&resources.bookings),
        cache,
        Arc::clone(&resources.codes),
        Arc::clone(&resources.clock),
    )
}
