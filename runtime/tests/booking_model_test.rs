//! Property tests: random reserve/cancel sequences checked against a simple
//! seat-count model, for every strategy.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use proptest::prelude::*;
use seat_inventory_core::error::InventoryError;
use seat_inventory_core::strategy::StrategyKind;
use seat_inventory_core::types::BookingId;
use seat_inventory_testing::TestHarness;

#[derive(Debug, Clone)]
enum Op {
    Reserve(u32),
    /// Cancel the n-th booking made so far (modulo the count)
    Cancel(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u32..8).prop_map(Op::Reserve),
        1 => any::<usize>().prop_map(Op::Cancel),
    ]
}

fn kind() -> impl Strategy<Value = StrategyKind> {
    prop::sample::select(StrategyKind::ALL.to_vec())
}

async fn run(kind: StrategyKind, capacity: u32, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let harness = TestHarness::new(kind);
    let event_id = harness.create_event(capacity).await;

    let mut available = capacity;
    let mut made: Vec<(BookingId, u32, bool)> = Vec::new();

    for op in ops {
        match op {
            Op::Reserve(seats) => {
                let result = harness
                    .coordinator
                    .reserve(event_id, seats, harness.customer())
                    .await;
                if seats <= available {
                    let booking = result.map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(booking.seats_held, seats);
                    available -= seats;
                    made.push((booking.id, seats, true));
                } else {
                    prop_assert!(
                        matches!(result, Err(InventoryError::InsufficientCapacity { .. })),
                        "expected InsufficientCapacity, got {:?}",
                        result
                    );
                }
            }
            Op::Cancel(n) if !made.is_empty() => {
                let index = n % made.len();
                let (id, seats, active) = made[index];
                let result = harness.coordinator.cancel(id).await;
                if active {
                    prop_assert!(result.is_ok(), "cancel failed: {:?}", result);
                    available += seats;
                    made[index].2 = false;
                } else {
                    prop_assert!(
                        matches!(result, Err(InventoryError::AlreadyCancelled(_))),
                        "expected AlreadyCancelled, got {:?}",
                        result
                    );
                }
            }
            Op::Cancel(_) => {}
        }

        let projection = harness
            .coordinator
            .get_projection(event_id)
            .await
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(projection.available_seats, available);
        harness.assert_consistent(event_id);
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_sequential_bookings_match_model(
        kind in kind(),
        capacity in 1u32..40,
        ops in prop::collection::vec(op(), 1..30),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(kind, capacity, ops))?;
    }
}
