//! Credit wallet debits, top-ups and low-balance alerts.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use seatflow_core::{BookingError, Channel, LedgerEntryKind, Money};
use seatflow_testing::{TestWorld, properties};

#[tokio::test]
async fn test_insufficient_balance_is_rejected_and_untouched() {
    let world = TestWorld::new();
    let ctx = world.ctx();
    world.store.set_balance(world.tenant.id, Channel::Whatsapp, 5);

    let result = world
        .ledger
        .reserve_and_debit(&ctx, Channel::Whatsapp, 10)
        .await;

    assert_eq!(
        result.unwrap_err(),
        BookingError::InsufficientCredits {
            channel: Channel::Whatsapp,
            requested: 10,
            available: 5,
        }
    );
    let wallet = world
        .ledger
        .wallet(&ctx, Channel::Whatsapp)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, 5);
    assert_eq!(wallet.total_spent, Money::ZERO);
    assert!(
        world
            .ledger
            .ledger(&ctx, Channel::Whatsapp)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_unfunded_channel_has_nothing_to_debit() {
    let world = TestWorld::new();
    let result = world
        .ledger
        .reserve_and_debit(&world.ctx(), Channel::Email, 1)
        .await;
    assert!(matches!(
        result,
        Err(BookingError::InsufficientCredits { available: 0, .. })
    ));
}

#[tokio::test]
async fn test_zero_units_is_invalid() {
    let world = TestWorld::new();
    let result = world
        .ledger
        .reserve_and_debit(&world.ctx(), Channel::Sms, 0)
        .await;
    assert!(matches!(result, Err(BookingError::Validation { .. })));
}

#[tokio::test]
async fn test_debit_prices_units_and_writes_ledger() {
    let world = TestWorld::new();
    let ctx = world.ctx();

    let receipt = world
        .ledger
        .reserve_and_debit(&ctx, Channel::Sms, 4)
        .await
        .unwrap();

    assert_eq!(receipt.remaining, 96);
    assert_eq!(receipt.cost, Money::from_minor(100));

    let wallet = world.ledger.wallet(&ctx, Channel::Sms).await.unwrap().unwrap();
    assert_eq!(wallet.total_spent, Money::from_minor(100));

    let entries = world.ledger.ledger(&ctx, Channel::Sms).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, LedgerEntryKind::Usage);
    assert_eq!(entries[0].units, 4);
    assert_eq!(entries[0].balance_after, 96);
}

#[tokio::test]
async fn test_top_up_adds_purchase() {
    let world = TestWorld::new();
    let ctx = world.ctx();

    let balance = world
        .ledger
        .top_up(&ctx, Channel::Whatsapp, 25)
        .await
        .unwrap();
    assert_eq!(balance, 25);

    let entries = world.ledger.ledger(&ctx, Channel::Whatsapp).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, LedgerEntryKind::Purchase);

    assert!(matches!(
        world.ledger.top_up(&ctx, Channel::Whatsapp, 0).await,
        Err(BookingError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_low_balance_alert_fires_at_threshold() {
    let world = TestWorld::new();
    let ctx = world.ctx();
    world.store.set_balance(world.tenant.id, Channel::Sms, 12);

    world
        .ledger
        .reserve_and_debit(&ctx, Channel::Sms, 1)
        .await
        .unwrap();
    assert!(world.alerts.alerts().is_empty());

    world
        .ledger
        .reserve_and_debit(&ctx, Channel::Sms, 1)
        .await
        .unwrap();

    let alerts = world.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].tenant_id, world.tenant.id);
    assert_eq!(alerts[0].channel, Channel::Sms);
    assert_eq!(alerts[0].remaining, 10);
    assert_eq!(alerts[0].threshold, 10);
}

#[tokio::test]
async fn test_alerts_can_be_disabled() {
    let world = TestWorld::new();
    let mut quiet = world.add_tenant();
    quiet.alerts_enabled = false;
    world.store.add_tenant(quiet.clone());
    world.store.set_balance(quiet.id, Channel::Sms, 2);

    world
        .ledger
        .reserve_and_debit(&world.ctx_for(&quiet), Channel::Sms, 2)
        .await
        .unwrap();
    assert!(world.alerts.alerts().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_balance_never_goes_negative(
        start in 0u64..50,
        debits in prop::collection::vec(1u64..20, 1..20),
        channel in properties::channel(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let world = TestWorld::new();
            let ctx = world.ctx();
            world.store.set_balance(world.tenant.id, channel, start);

            let mut expected = start;
            for units in debits {
                let result = world.ledger.reserve_and_debit(&ctx, channel, units).await;
                if units <= expected {
                    expected -= units;
                    prop_assert_eq!(result.unwrap().remaining, expected);
                } else {
                    let is_insufficient = matches!(result, Err(BookingError::InsufficientCredits { .. }));
                    prop_assert!(is_insufficient);
                }
            }

            let balance = world.ledger.balances(&ctx).await.unwrap().get(channel);
            prop_assert_eq!(balance, expected);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
