//! Proptest strategies for domain values.

use proptest::prelude::*;
use seatflow_core::{BasisPoints, Channel, FeeSchedule, FeeSchedules, GatewayKind, Money};

/// Booking amounts from 0.01 to 100 000.00.
pub fn amount() -> impl Strategy<Value = Money> {
    (1u64..=10_000_000).prop_map(Money::from_minor)
}

/// Rates up to 100%.
pub fn basis_points() -> impl Strategy<Value = BasisPoints> {
    (0u32..=10_000).prop_map(BasisPoints::new)
}

/// Percentage fee plus fixed fee up to 50.00.
pub fn fee_schedule() -> impl Strategy<Value = FeeSchedule> {
    (0u32..=1_000, 0u64..=5_000).prop_map(|(bps, fixed)| FeeSchedule {
        rate: BasisPoints::new(bps),
        fixed: Money::from_minor(fixed),
    })
}

/// Independent schedules for both processors.
pub fn fee_schedules() -> impl Strategy<Value = FeeSchedules> {
    (fee_schedule(), fee_schedule()).prop_map(|(gateway_a, gateway_b)| FeeSchedules {
        gateway_a,
        gateway_b,
    })
}

/// Either processor.
pub fn gateway_kind() -> impl Strategy<Value = GatewayKind> {
    prop_oneof![Just(GatewayKind::GatewayA), Just(GatewayKind::GatewayB)]
}

/// Any channel.
pub fn channel() -> impl Strategy<Value = Channel> {
    prop_oneof![Just(Channel::Sms), Just(Channel::Whatsapp), Just(Channel::Email)]
}

/// Whole-hour windows `(start, end)` within one day, at least one hour long.
pub fn hour_window() -> impl Strategy<Value = (i64, i64)> {
    (0i64..23).prop_flat_map(|start| (Just(start), (start + 1)..=24))
}
