//! Booking engine benchmarks
//!
//! - Overlap scan over a busy seat calendar
//! - Fee-based processor selection
//! - Credit debit through the in-memory store
//! - Full book-and-pay round trip with an instant processor
//!
//! Run with: `cargo bench -p seatflow-runtime`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used, clippy::unwrap_used)] // Benchmarks can use expect for setup

use chrono::{Duration, TimeZone, Utc};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use seatflow_core::{
    BookingStateMachine, Channel, FeeSchedules, GatewayKind, Money, SeatId, TenantId, TimeWindow,
    UserId, find_conflict, select_gateway,
};
use seatflow_testing::TestWorld;

fn benchmark_conflict_scan(c: &mut Criterion) {
    let machine = BookingStateMachine::default();
    let day = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let (tenant, seat) = (TenantId::new(), SeatId::new());

    let mut group = c.benchmark_group("conflict_scan");
    for size in [10_usize, 100, 1_000] {
        // Back-to-back 30 minute bookings, no overlaps among them.
        let bookings: Vec<_> = (0..size)
            .map(|i| {
                let start = day + Duration::minutes(30 * i64::try_from(i).unwrap());
                let window = TimeWindow::new(start, start + Duration::minutes(30)).unwrap();
                machine.create(tenant, seat, UserId::new(), window, Money::from_minor(100))
            })
            .collect();
        let end = day + Duration::minutes(30 * i64::try_from(size).unwrap());
        let probe = TimeWindow::new(end, end + Duration::hours(1)).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("miss_{size}"), |b| {
            b.iter(|| find_conflict(black_box(&bookings), black_box(&probe), None));
        });
    }
    group.finish();
}

fn benchmark_gateway_selection(c: &mut Criterion) {
    let fees = FeeSchedules::default();
    c.bench_function("select_gateway", |b| {
        b.iter(|| {
            select_gateway(
                black_box(Money::from_minor(60_000)),
                black_box(&fees),
                GatewayKind::GatewayA,
            )
        });
    });
}

fn benchmark_credit_debit(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let world = TestWorld::new();
    world
        .store
        .set_balance(world.tenant.id, Channel::Email, u64::MAX / 2);
    let ctx = world.ctx();

    c.bench_function("reserve_and_debit", |b| {
        b.to_async(&runtime).iter(|| async {
            world
                .ledger
                .reserve_and_debit(&ctx, Channel::Email, 1)
                .await
                .expect("debit")
        });
    });
}

fn benchmark_book_and_pay(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");

    c.bench_function("create_booking", |b| {
        b.to_async(&runtime).iter_batched(
            TestWorld::new,
            |world| async move {
                world
                    .orchestrator
                    .create_booking(&world.ctx(), world.request(10, 12))
                    .await
                    .expect("booking")
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    benchmark_conflict_scan,
    benchmark_gateway_selection,
    benchmark_credit_debit,
    benchmark_book_and_pay,
);
criterion_main!(benches);
