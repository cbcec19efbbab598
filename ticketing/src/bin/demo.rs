//! Seat Inventory Demo
//!
//! Runs a contention scenario against `PostgreSQL` and Redis:
//! - Event creation
//! - A burst of concurrent reservations against a small venue
//! - Cancellations returning seats to the pool
//! - Projection reads through the cache
//! - A capacity resize that respects sold seats
//!
//! # Usage
//!
//! ```bash
//! # PostgreSQL and Redis must be reachable (DATABASE_URL, REDIS_URL)
//! SEAT_STRATEGY=locking cargo run --bin demo
//! ```

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use seat_inventory_core::error::InventoryError;
use seat_inventory_core::types::{CustomerInfo, EventDetails, Money, NewEvent};
use seat_inventory_runtime::metrics::MetricsServer;
use ticketing::{Config, ResourceManager, build_coordinator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CAPACITY: u32 = 50;
const BUYERS: usize = 40;
const SEATS_PER_BUYER: u32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticketing=debug,seat_inventory_runtime=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("\n🎫 ============================================");
    println!("   Seat Inventory - Contention Demo");
    println!("============================================\n");

    let config = Config::from_env();

    let mut metrics = MetricsServer::new(config.metrics_addr().parse()?);
    metrics.start()?;

    println!("⚙️  Initializing resources...");
    let resources = ResourceManager::from_config(&config).await?;
    let coordinator = build_coordinator(&resources);
    println!("✓ Using the {} strategy\n", coordinator.strategy().kind());

    // Step 1: Create event
    println!("1️⃣  Creating event with {CAPACITY} seats...");
    let event = coordinator
        .create_event(NewEvent {
            details: EventDetails {
                name: "Summer Music Festival".to_string(),
                description: Some("General admission".to_string()),
                venue: "Riverside Park".to_string(),
                event_date: Utc::now() + ChronoDuration::days(30),
                price: Money::from_cents(4_500),
            },
            total_capacity: CAPACITY,
        })
        .await?;
    let event_id = event.event_id;
    println!("   ✓ Event {event_id} created\n");

    // Step 2: Burst of concurrent reservations
    println!("2️⃣  {BUYERS} buyers each request {SEATS_PER_BUYER} seats at once...");
    let attempts = (0..BUYERS).map(|i| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .reserve(
                    event_id,
                    SEATS_PER_BUYER,
                    CustomerInfo::new(format!("Buyer {i}"), format!("buyer{i}@example.com")),
                )
                .await
        })
    });

    let mut confirmed = Vec::new();
    let mut sold_out = 0_usize;
    let mut failed = 0_usize;
    for outcome in join_all(attempts).await {
        match outcome? {
            Ok(booking) => confirmed.push(booking),
            Err(InventoryError::InsufficientCapacity { .. }) => sold_out += 1,
            Err(error) => {
                tracing::warn!(%error, "Reservation failed");
                failed += 1;
            }
        }
    }
    println!(
        "   ✓ {} confirmed, {sold_out} sold out, {failed} failed\n",
        confirmed.len()
    );

    // Step 3: Cancel a few bookings
    println!("3️⃣  Cancelling the first 5 bookings...");
    for booking in confirmed.iter().take(5) {
        let cancelled = coordinator.cancel(booking.id).await?;
        println!("   ✓ {} cancelled ({} seats back)", cancelled.code, cancelled.seats_held);
    }
    println!();

    // Step 4: Read the projection
    println!("4️⃣  Reading the projection...");
    let projection = coordinator.get_projection(event_id).await?;
    println!(
        "   {} at {}: {}/{} seats available (revision {})\n",
        projection.name,
        projection.venue,
        projection.available_seats,
        projection.total_capacity,
        projection.revision
    );

    // Step 5: Verify accounting against the store
    println!("5️⃣  Checking seat accounting...");
    let bookings = coordinator.bookings_for_event(event_id).await?;
    let held: u32 = bookings
        .iter()
        .filter(|b| b.is_active())
        .map(|b| b.seats_held)
        .sum();
    let sold = projection.total_capacity - projection.available_seats;
    if held == sold {
        println!("   ✓ Active bookings hold {held} seats, ledger shows {sold} sold\n");
    } else {
        tracing::error!(held, sold, "Seat accounting mismatch");
        println!("   ❌ Active bookings hold {held} seats, ledger shows {sold} sold\n");
    }

    // Step 6: Resize
    println!("6️⃣  Shrinking the venue below sold seats, then to exactly sold seats...");
    match coordinator.resize_capacity(event_id, sold.saturating_sub(1).max(1)).await {
        Err(InventoryError::CapacityBelowSold { sold, .. }) => {
            println!("   ✓ Rejected: {sold} seats are already sold");
        }
        Ok(ledger) => println!("   ✓ Resized to {}", ledger.total_capacity),
        Err(error) => println!("   ❌ Unexpected: {error}"),
    }
    if sold > 0 {
        let ledger = coordinator.resize_capacity(event_id, sold).await?;
        println!(
            "   ✓ Resized to {} ({} available)\n",
            ledger.total_capacity, ledger.available_seats
        );
    }

    if let Some(rendered) = metrics.render() {
        let series = rendered.lines().filter(|l| !l.starts_with('#')).count();
        println!("📈 {series} metric series recorded");
    }

    println!("\n✅ Demo complete\n");
    Ok(())
}
