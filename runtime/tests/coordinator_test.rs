//! Booking coordinator behaviour: lifecycle, compensation and administration.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use seat_inventory_core::error::{BookingRef, InventoryError, StoreError};
use seat_inventory_core::strategy::StrategyKind;
use seat_inventory_core::types::{
    BookingCode, BookingId, BookingKind, BookingStatus, CustomerInfo, EventId, Money,
};
use seat_inventory_testing::{TestHarness, sample_event};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_reserve_builds_priced_booking() {
    let harness = TestHarness::new(StrategyKind::Atomic);
    let event_id = harness.create_event(10).await;

    let booking = assert_ok!(
        harness
            .coordinator
            .reserve(event_id, 3, CustomerInfo::new("Ada", "ada@example.com"))
            .await
    );

    assert_eq!(booking.kind, BookingKind::Reservation);
    assert_eq!(booking.code.as_str(), "RES-00000001");
    assert_eq!(booking.seats_held, 3);
    assert_eq!(booking.total_price, Money::from_cents(7_500));
    assert_eq!(booking.status, BookingStatus::Active);
    assert_eq!(booking.customer.name, "Ada");

    let stored = harness.coordinator.booking(booking.id).await.unwrap();
    assert_eq!(stored, booking);
}

#[tokio::test]
async fn test_issue_ticket_uses_ticket_codes() {
    let harness = TestHarness::new(StrategyKind::Locking);
    let event_id = harness.create_event(10).await;

    let ticket = harness
        .coordinator
        .issue_ticket(event_id, 2, harness.customer())
        .await
        .unwrap();

    assert_eq!(ticket.kind, BookingKind::Ticket);
    assert!(ticket.code.as_str().starts_with("TKT-"));
    let found = harness.coordinator.booking_by_code(&ticket.code).await.unwrap();
    assert_eq!(found.id, ticket.id);
    harness.assert_consistent(event_id);
}

#[tokio::test]
async fn test_invalid_requests_mutate_nothing() {
    let harness = TestHarness::new(StrategyKind::Optimistic);
    let event_id = harness.create_event(10).await;

    let zero = harness.coordinator.reserve(event_id, 0, harness.customer()).await;
    assert!(matches!(zero, Err(InventoryError::InvalidRequest(_))));

    let nameless = harness
        .coordinator
        .reserve(event_id, 1, CustomerInfo::new(" ", "x@example.com"))
        .await;
    assert!(matches!(nameless, Err(InventoryError::InvalidRequest(_))));

    let missing = harness
        .coordinator
        .reserve(EventId::new(), 1, harness.customer())
        .await;
    assert!(matches!(missing, Err(InventoryError::LedgerNotFound(_))));

    assert_eq!(harness.ledgers.ledger(event_id).unwrap().revision, 0);
    assert!(harness.bookings.is_empty());
}

#[tokio::test]
async fn test_insufficient_capacity_leaves_no_trace() {
    let harness = TestHarness::new(StrategyKind::Atomic);
    let event_id = harness.create_event(2).await;
    let evictions_before = harness.cache_backend.evict_calls();

    let result = harness.coordinator.reserve(event_id, 3, harness.customer()).await;

    assert!(matches!(
        result,
        Err(InventoryError::InsufficientCapacity { requested: 3, available: 2, .. })
    ));
    assert!(harness.bookings.is_empty());
    assert_eq!(harness.cache_backend.evict_calls(), evictions_before, "no invalidation");
}

#[tokio::test]
async fn test_cancel_twice() {
    for kind in StrategyKind::ALL {
        let harness = TestHarness::new(kind);
        let event_id = harness.create_event(10).await;
        let booking = harness
            .coordinator
            .reserve(event_id, 4, harness.customer())
            .await
            .unwrap();

        let cancelled = harness.coordinator.cancel(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let again = harness.coordinator.cancel(booking.id).await;
        assert!(matches!(again, Err(InventoryError::AlreadyCancelled(id)) if id == booking.id));

        assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 10, "{kind}");
        harness.assert_consistent(event_id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_cancels_credit_once() {
    for kind in StrategyKind::ALL {
        let harness = Arc::new(
            TestHarness::builder(kind)
                .store_latency(Duration::from_millis(1))
                .build(),
        );
        let event_id = harness.create_event(10).await;
        let booking = harness
            .coordinator
            .reserve(event_id, 5, harness.customer())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let harness = Arc::clone(&harness);
            handles.push(tokio::spawn(async move {
                harness.coordinator.cancel(booking.id).await
            }));
        }
        let mut wins = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            assert!(
                matches!(result, Ok(_) | Err(InventoryError::AlreadyCancelled(_))),
                "{kind}: unexpected {result:?}"
            );
            if result.is_ok() {
                wins += 1;
            }
        }

        assert_eq!(wins, 1, "{kind}: exactly one canceller wins");
        assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 10);
        harness.assert_consistent(event_id);
    }
}

#[tokio::test]
async fn test_cancel_unknown_and_by_code() {
    let harness = TestHarness::new(StrategyKind::Atomic);
    let event_id = harness.create_event(10).await;

    let unknown = BookingId::new();
    assert!(matches!(
        harness.coordinator.cancel(unknown).await,
        Err(InventoryError::BookingNotFound(BookingRef::Id(id))) if id == unknown
    ));

    let bogus = BookingCode::new("RES-NOPE0000");
    assert!(matches!(
        harness.coordinator.cancel_by_code(&bogus).await,
        Err(InventoryError::BookingNotFound(BookingRef::Code(_)))
    ));

    let booking = harness
        .coordinator
        .reserve(event_id, 2, harness.customer())
        .await
        .unwrap();
    let cancelled = harness.coordinator.cancel_by_code(&booking.code).await.unwrap();
    assert_eq!(cancelled.id, booking.id);
    assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 10);
}

#[tokio::test]
async fn test_cancel_timeout_keeps_booking_and_seats_together() {
    let harness = TestHarness::builder(StrategyKind::Atomic)
        .statement_timeout(Duration::from_millis(10))
        .build();
    let event_id = harness.create_event(10).await;
    let booking = harness
        .coordinator
        .reserve(event_id, 3, harness.customer())
        .await
        .unwrap();

    harness.ledgers.set_latency(Duration::from_millis(40));
    let result = harness.coordinator.cancel(booking.id).await;
    harness.ledgers.set_latency(Duration::ZERO);

    assert!(matches!(result, Err(InventoryError::Timeout { .. })));
    let stored = harness.coordinator.booking(booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Active, "cancellation reverted");
    assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 7);
    harness.assert_consistent(event_id);

    assert_ok!(harness.coordinator.cancel(booking.id).await);
    assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 10);
    harness.assert_consistent(event_id);
}

#[tokio::test]
async fn test_failed_booking_write_is_compensated() {
    for kind in StrategyKind::ALL {
        let harness = TestHarness::new(kind);
        let event_id = harness.create_event(10).await;
        // Prime the cache with the pre-debit projection.
        harness.coordinator.get_projection(event_id).await.unwrap();

        harness.bookings.fail_next_inserts(1);
        let result = harness.coordinator.reserve(event_id, 3, harness.customer()).await;

        assert!(
            matches!(result, Err(InventoryError::Store(StoreError::Database(_)))),
            "{kind}: original error surfaces"
        );
        let ledger = harness.ledgers.ledger(event_id).unwrap();
        assert_eq!(ledger.available_seats, 10, "{kind}: debit compensated");
        assert_eq!(ledger.revision, 2, "{kind}: debit then compensating credit");
        assert!(harness.bookings.is_empty());

        let projection = harness.coordinator.get_projection(event_id).await.unwrap();
        assert_eq!(projection.available_seats, 10);
        assert_eq!(projection.revision, 2);
        harness.assert_consistent(event_id);
    }
}

#[tokio::test]
async fn test_code_collision_is_regenerated() {
    let harness = TestHarness::new(StrategyKind::Atomic);
    let event_id = harness.create_event(10).await;

    let first = harness
        .coordinator
        .reserve(event_id, 1, harness.customer())
        .await
        .unwrap();
    assert_eq!(first.code.as_str(), "RES-00000001");

    // A second coordinator starts its own sequence and collides on RES-00000001.
    let sibling = harness.sibling_coordinator(StrategyKind::Optimistic);
    let second = sibling.reserve(event_id, 1, harness.customer()).await.unwrap();
    assert_eq!(second.code.as_str(), "RES-00000002");

    assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 8);
    harness.assert_consistent(event_id);
}

#[tokio::test]
async fn test_failed_credit_reverts_cancellation() {
    for kind in StrategyKind::ALL {
        let harness = TestHarness::new(kind);
        let event_id = harness.create_event(10).await;
        let booking = harness
            .coordinator
            .reserve(event_id, 3, harness.customer())
            .await
            .unwrap();

        harness.ledgers.fail_next_writes(1);
        let result = harness.coordinator.cancel(booking.id).await;
        assert!(matches!(result, Err(InventoryError::Store(_))), "{kind}");

        let stored = harness.coordinator.booking(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Active, "{kind}: claim reverted");
        assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 7);
        harness.assert_consistent(event_id);

        // The booking can still be cancelled afterwards.
        harness.coordinator.cancel(booking.id).await.unwrap();
        assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 10);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_reserve_never_leaves_ledger_inconsistent() {
    for kind in StrategyKind::ALL {
        let harness = TestHarness::builder(kind)
            .store_latency(Duration::from_millis(5))
            .build();
        let event_id = harness.create_event(10).await;

        for budget_ms in [2, 7, 12, 17, 25] {
            let attempt = harness.coordinator.reserve(event_id, 1, harness.customer());
            let _ = tokio::time::timeout(Duration::from_millis(budget_ms), attempt).await;
        }
        // Let detached settle phases finish.
        tokio::time::sleep(Duration::from_millis(100)).await;

        harness.assert_consistent(event_id);
    }
}

#[tokio::test]
async fn test_bookings_for_event_in_creation_order() {
    let harness = TestHarness::new(StrategyKind::Locking);
    let event_id = harness.create_event(10).await;
    let other = harness.create_event(10).await;

    let a = harness.coordinator.reserve(event_id, 1, harness.customer()).await.unwrap();
    harness.coordinator.reserve(other, 1, harness.customer()).await.unwrap();
    let b = harness.coordinator.issue_ticket(event_id, 2, harness.customer()).await.unwrap();
    harness.coordinator.cancel(a.id).await.unwrap();

    let listed = harness.coordinator.bookings_for_event(event_id).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert_eq!(listed[0].status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_resize_respects_sold_floor() {
    let harness = TestHarness::new(StrategyKind::Atomic);
    let event_id = harness.create_event(100).await;
    harness
        .coordinator
        .reserve(event_id, 50, harness.customer())
        .await
        .unwrap();

    let below = harness.coordinator.resize_capacity(event_id, 40).await;
    assert!(matches!(
        below,
        Err(InventoryError::CapacityBelowSold { requested_total: 40, sold: 50, .. })
    ));

    let exact = harness.coordinator.resize_capacity(event_id, 50).await.unwrap();
    assert_eq!((exact.total_capacity, exact.available_seats), (50, 0));

    let grown = harness.coordinator.resize_capacity(event_id, 80).await.unwrap();
    assert_eq!((grown.total_capacity, grown.available_seats), (80, 30));

    assert!(matches!(
        harness.coordinator.resize_capacity(event_id, 0).await,
        Err(InventoryError::InvalidRequest(_))
    ));
    assert!(matches!(
        harness.coordinator.resize_capacity(EventId::new(), 10).await,
        Err(InventoryError::LedgerNotFound(_))
    ));

    let projection = harness.coordinator.get_projection(event_id).await.unwrap();
    assert_eq!(projection.total_capacity, 80);
    assert_eq!(projection.available_seats, 30);
    harness.assert_consistent(event_id);
}

#[tokio::test]
async fn test_update_event_replaces_details_and_capacity() {
    let harness = TestHarness::new(StrategyKind::Optimistic);
    let event_id = harness.create_event(10).await;
    harness.coordinator.get_projection(event_id).await.unwrap();
    harness.coordinator.reserve(event_id, 4, harness.customer()).await.unwrap();

    let mut changed = sample_event(12);
    changed.details.name = "Moved Concert".to_string();
    changed.details.price = Money::from_cents(3_000);

    let projection = harness.coordinator.update_event(event_id, changed).await.unwrap();
    assert_eq!(projection.name, "Moved Concert");
    assert_eq!(projection.total_capacity, 12);
    assert_eq!(projection.available_seats, 8);

    let cached = harness.coordinator.get_projection(event_id).await.unwrap();
    assert_eq!(cached, projection);

    // New price applies to later bookings only.
    let later = harness.coordinator.reserve(event_id, 1, harness.customer()).await.unwrap();
    assert_eq!(later.total_price, Money::from_cents(3_000));

    let too_small = harness.coordinator.update_event(event_id, sample_event(3)).await;
    assert!(matches!(too_small, Err(InventoryError::CapacityBelowSold { sold: 5, .. })));

    let mut nameless = sample_event(20);
    nameless.details.name = String::new();
    assert_err!(harness.coordinator.update_event(event_id, nameless).await);
}

#[tokio::test]
async fn test_delete_event_requires_no_active_bookings() {
    let harness = TestHarness::new(StrategyKind::Atomic);
    let event_id = harness.create_event(10).await;
    let booking = harness
        .coordinator
        .reserve(event_id, 2, harness.customer())
        .await
        .unwrap();

    assert!(matches!(
        harness.coordinator.delete_event(event_id).await,
        Err(InventoryError::EventHasActiveBookings { active: 1, .. })
    ));

    harness.coordinator.cancel(booking.id).await.unwrap();
    assert_ok!(harness.coordinator.delete_event(event_id).await);

    assert!(matches!(
        harness.coordinator.get_projection(event_id).await,
        Err(InventoryError::LedgerNotFound(_))
    ));
    assert!(matches!(
        harness.coordinator.delete_event(event_id).await,
        Err(InventoryError::LedgerNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reservation_inside_delete_window_blocks_delete() {
    for kind in StrategyKind::ALL {
        let harness = TestHarness::new(kind);
        let event_id = harness.create_event(10).await;
        // Widen the gap between the booking count and the row delete.
        harness.bookings.set_latency(Duration::from_millis(100));

        let coordinator = harness.coordinator.clone();
        let delete = tokio::spawn(async move { coordinator.delete_event(event_id).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let reserved = harness.coordinator.reserve(event_id, 4, harness.customer()).await;
        let deleted = delete.await.unwrap();
        harness.bookings.set_latency(Duration::ZERO);

        let booking = assert_ok!(reserved, "{kind}");
        assert!(
            matches!(deleted, Err(InventoryError::EventHasActiveBookings { active: 1, .. })),
            "{kind}: {deleted:?}"
        );
        assert_eq!(harness.ledgers.ledger(event_id).unwrap().available_seats, 6, "{kind}");
        assert_eq!(harness.coordinator.booking(booking.id).await.unwrap().event_id, event_id);
        harness.assert_consistent(event_id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reservation_after_delete_finds_no_event() {
    for kind in StrategyKind::ALL {
        let harness = TestHarness::new(kind);
        let event_id = harness.create_event(10).await;
        harness.ledgers.set_latency(Duration::from_millis(50));

        let coordinator = harness.coordinator.clone();
        let customer = harness.customer();
        let reserve = tokio::spawn(async move { coordinator.reserve(event_id, 4, customer).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let deleted = harness.coordinator.delete_event(event_id).await;
        let reserved = reserve.await.unwrap();
        harness.ledgers.set_latency(Duration::ZERO);

        assert_ok!(deleted, "{kind}");
        assert!(
            matches!(reserved, Err(InventoryError::LedgerNotFound(id)) if id == event_id),
            "{kind}: {reserved:?}"
        );
        assert!(harness.ledgers.ledger(event_id).is_none());
        assert!(harness.bookings.is_empty(), "{kind}: no orphaned booking");
    }
}

#[tokio::test]
async fn test_create_event_validation() {
    let harness = TestHarness::new(StrategyKind::Atomic);

    assert!(matches!(
        harness.coordinator.create_event(sample_event(0)).await,
        Err(InventoryError::InvalidRequest(_))
    ));

    let mut venueless = sample_event(5);
    venueless.details.venue = "   ".to_string();
    assert!(matches!(
        harness.coordinator.create_event(venueless).await,
        Err(InventoryError::InvalidRequest(_))
    ));

    let created = harness.coordinator.create_event(sample_event(5)).await.unwrap();
    assert_eq!(created.available_seats, 5);
    assert_eq!(created.revision, 0);
    assert_eq!(harness.ledgers.len(), 1);
}
