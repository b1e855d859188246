//! Tunable business policy with production defaults.

use crate::types::{BasisPoints, Channel, GatewayKind, Money};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Rules applied to every booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Shortest bookable window (default 30 minutes)
    pub min_duration: Duration,
    /// Longest bookable window (default 12 hours)
    pub max_duration: Duration,
    /// Fee kept on cancellation (default 10%)
    pub cancellation_fee: BasisPoints,
    /// Bound on each processor call (default 10 seconds)
    pub gateway_timeout: std::time::Duration,
    /// Processor chosen when both cost the same (default `gatewayA`)
    pub tie_break: GatewayKind,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            min_duration: Duration::minutes(30),
            max_duration: Duration::hours(12),
            cancellation_fee: BasisPoints::from_percent(10),
            gateway_timeout: std::time::Duration::from_secs(10),
            tie_break: GatewayKind::GatewayA,
        }
    }
}

/// Price of one credit on each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRates {
    /// Per SMS credit
    pub sms: Money,
    /// Per WhatsApp credit
    pub whatsapp: Money,
    /// Per email credit
    pub email: Money,
}

impl CreditRates {
    /// Rate for one channel.
    #[must_use]
    pub const fn rate(&self, channel: Channel) -> Money {
        match channel {
            Channel::Sms => self.sms,
            Channel::Whatsapp => self.whatsapp,
            Channel::Email => self.email,
        }
    }
}

impl Default for CreditRates {
    fn default() -> Self {
        Self {
            sms: Money::from_minor(25),
            whatsapp: Money::from_minor(50),
            email: Money::from_minor(5),
        }
    }
}
