//! Concurrent booking, cancellation, webhook and debit races.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use seatflow_core::{
    BookingError, BookingStatus, BookingStore, Channel, DataStore, GatewayKind, PaymentStatus,
    TenantContext, find_conflict,
};
use seatflow_runtime::{WebhookOutcome, WebhookProcessor};
use seatflow_testing::{GatewayScript, TestWorld, YieldingStore, properties};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_window_race_has_one_winner() {
    let world = Arc::new(TestWorld::new());
    let mut handles = Vec::new();

    for _ in 0..20 {
        let world = Arc::clone(&world);
        handles.push(tokio::spawn(async move {
            let ctx = world.ctx();
            world
                .orchestrator
                .create_booking(&ctx, world.request(10, 12))
                .await
        }));
    }

    let mut confirmed = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(BookingError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(conflicts, 19);
    assert_eq!(world.gateway_a.payments().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_payment_does_not_block_other_windows() {
    let world = Arc::new(TestWorld::new());
    world
        .gateway_a
        .push(GatewayScript::SucceedAfter(Duration::from_millis(100)));

    let slow = {
        let world = Arc::clone(&world);
        tokio::spawn(async move {
            let ctx = world.ctx();
            world
                .orchestrator
                .create_booking(&ctx, world.request(10, 12))
                .await
        })
    };
    // Let the slow booking commit its pending row.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let ctx = world.ctx();
    let overlapping = world
        .orchestrator
        .create_booking(&ctx, world.request(11, 13))
        .await;
    let elsewhere = world
        .orchestrator
        .create_booking(&ctx, world.request(14, 16))
        .await;

    assert!(matches!(overlapping, Err(BookingError::Conflict { .. })));
    assert!(elsewhere.is_ok());
    assert!(slow.await.unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let world = Arc::new(TestWorld::new());
    world.store.set_balance(world.tenant.id, Channel::Email, 50);

    let mut handles = Vec::new();
    for _ in 0..80 {
        let world = Arc::clone(&world);
        handles.push(tokio::spawn(async move {
            world
                .ledger
                .reserve_and_debit(&world.ctx(), Channel::Email, 1)
                .await
        }));
    }

    let mut debited = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => debited += 1,
            Err(BookingError::InsufficientCredits { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(debited, 50);
    assert_eq!(refused, 30);
    let wallet = world
        .ledger
        .wallet(&world.ctx(), Channel::Email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, 0);
    assert_eq!(
        world
            .ledger
            .ledger(&world.ctx(), Channel::Email)
            .await
            .unwrap()
            .len(),
        50
    );
}

/// Context whose store suspends on every call, so racing tasks interleave.
fn yielding_ctx(world: &TestWorld) -> TenantContext {
    let store: Arc<dyn DataStore> = Arc::new(YieldingStore::new(world.store.clone()));
    TenantContext::new(world.tenant.clone(), store)
}

#[tokio::test]
async fn test_racing_cancels_refund_once() {
    let world = TestWorld::new();
    let booking = world
        .orchestrator
        .create_booking(&world.ctx(), world.request(10, 12))
        .await
        .unwrap()
        .booking;
    let ctx = yielding_ctx(&world);

    let (first, second) = tokio::join!(
        world.orchestrator.cancel_booking(&ctx, booking.id),
        world.orchestrator.cancel_booking(&ctx, booking.id),
    );

    assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
    let rejected = first.err().or(second.err()).unwrap();
    assert!(matches!(
        rejected,
        BookingError::InvalidStateTransition {
            from: BookingStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(world.gateway_a.refunds().len(), 1);
}

#[tokio::test]
async fn test_cancel_racing_check_in_keeps_money_and_status_consistent() {
    let world = TestWorld::new();
    let booking = world
        .orchestrator
        .create_booking(&world.ctx(), world.request(10, 12))
        .await
        .unwrap()
        .booking;
    let ctx = yielding_ctx(&world);

    let (cancelled, checked_in) = tokio::join!(
        world.orchestrator.cancel_booking(&ctx, booking.id),
        world.orchestrator.check_in(&ctx, booking.id),
    );

    assert_ne!(cancelled.is_ok(), checked_in.is_ok());
    let stored = world.store.find_booking(booking.id).await.unwrap().unwrap();
    if cancelled.is_ok() {
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(world.gateway_a.refunds().len(), 1);
    } else {
        assert_eq!(stored.status, BookingStatus::CheckedIn);
        assert!(world.gateway_a.refunds().is_empty());
    }
}

#[tokio::test]
async fn test_duplicate_late_capture_webhooks_refund_once() {
    let world = TestWorld::new();
    world
        .gateway_a
        .push(GatewayScript::Decline("insufficient funds".to_string()));
    let result = world
        .orchestrator
        .create_booking(&world.ctx(), world.request(10, 12))
        .await;
    assert!(matches!(result, Err(BookingError::Gateway { .. })));

    let processor = WebhookProcessor::new(
        Arc::new(YieldingStore::new(world.store.clone())),
        world.router.clone(),
        *world.orchestrator.state_machine(),
    );
    let event = world
        .gateway_a
        .webhook("gatewayA_order_1", PaymentStatus::Success);

    let (first, second) = tokio::join!(
        processor.process(GatewayKind::GatewayA, event.clone()),
        processor.process(GatewayKind::GatewayA, event),
    );
    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|outcome| matches!(outcome, WebhookOutcome::Duplicate));

    assert!(matches!(outcomes[0], WebhookOutcome::Refunded { .. }));
    assert_eq!(outcomes[1], WebhookOutcome::Duplicate);
    assert_eq!(world.gateway_a.refunds().len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_concurrent_requests_never_double_book(
        windows in prop::collection::vec(properties::hour_window(), 2..10)
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let world = Arc::new(TestWorld::new());
            let mut handles = Vec::new();
            for (start, end) in windows {
                // Policy caps bookings at 12 hours.
                let end = end.min(start + 12);
                let world = Arc::clone(&world);
                handles.push(tokio::spawn(async move {
                    let ctx = world.ctx();
                    world
                        .orchestrator
                        .create_booking(&ctx, world.request(start, end))
                        .await
                }));
            }
            for handle in handles {
                let result = handle.await.unwrap();
                prop_assert!(
                    matches!(result, Ok(_) | Err(BookingError::Conflict { .. })),
                    "unexpected result {:?}", result
                );
            }

            let live: Vec<_> = world
                .store
                .bookings_for_seat(world.seat.id)
                .into_iter()
                .filter(|b| b.status == BookingStatus::Confirmed)
                .collect();
            for booking in &live {
                prop_assert!(find_conflict(&live, &booking.window(), Some(booking.id)).is_none());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
