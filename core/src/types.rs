//! Domain types for the booking engine.
//!
//! Identifiers, money and rates, time windows, status enums, and the
//! persisted entities (tenants, seats, bookings, payment transactions,
//! credit wallets and their ledger).

use crate::error::{BookingError, BookingResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a tenant (library operator account)
    TenantId
);
uuid_id!(
    /// Unique identifier for a library owned by a tenant
    LibraryId
);
uuid_id!(
    /// Unique identifier for a bookable seat
    SeatId
);
uuid_id!(
    /// Unique identifier for an end user
    UserId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a payment transaction
    PaymentTransactionId
);

// ============================================================================
// Money and rates
// ============================================================================

/// Rate expressed in basis points (1 bp = 0.01%, 10 000 bp = 100%).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisPoints(u32);

impl BasisPoints {
    /// One hundred percent.
    pub const FULL: Self = Self(10_000);

    /// Creates a rate from a basis point count.
    #[must_use]
    pub const fn new(bps: u32) -> Self {
        Self(bps)
    }

    /// Creates a rate from a whole percentage.
    #[must_use]
    pub const fn from_percent(percent: u32) -> Self {
        Self(percent.saturating_mul(100))
    }

    /// Returns the raw basis point count.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Amount of money in minor currency units (cents, paise).
///
/// All arithmetic is integer; fractional results are floored unless a method
/// says otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates a `Money` value from major units with overflow checking
    #[must_use]
    pub const fn checked_from_major(major: u64) -> Option<Self> {
        match major.checked_mul(100) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts, clamping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies by an integer count, saturating at `u64::MAX`
    #[must_use]
    pub const fn saturating_mul(self, count: u64) -> Self {
        Self(self.0.saturating_mul(count))
    }

    /// Returns `floor(self × rate)`.
    #[must_use]
    pub fn portion(self, rate: BasisPoints) -> Self {
        let scaled = u128::from(self.0) * u128::from(rate.value()) / 10_000;
        Self(u64::try_from(scaled).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Time windows
// ============================================================================

/// Half-open reservation interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window, rejecting empty or inverted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> BookingResult<Self> {
        if end <= start {
            return Err(BookingError::validation(format!(
                "end time {end} must be after start time {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive start.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive end.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `[s1,e1)` and `[s2,e2)` overlap iff `s1 < e2 && s2 < e1`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Outbound communication channel paid for with prepaid credits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Text message
    Sms,
    /// WhatsApp message
    Whatsapp,
    /// Email
    Email,
}

impl Channel {
    /// Every channel, in a stable order.
    pub const ALL: [Self; 3] = [Self::Sms, Self::Whatsapp, Self::Email];

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
        }
    }

    /// Parse from string.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for an unknown channel.
    pub fn parse(s: &str) -> BookingResult<Self> {
        match s {
            "sms" => Ok(Self::Sms),
            "whatsapp" => Ok(Self::Whatsapp),
            "email" => Ok(Self::Email),
            _ => Err(BookingError::validation(format!("unknown channel: {s}"))),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational status of a seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    /// Bookable
    Active,
    /// Temporarily out of service
    Maintenance,
}

impl SeatStatus {
    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Maintenance => "maintenance",
        }
    }

    /// Parse from string.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] for an unknown status (only the store
    /// ever produces these strings).
    pub fn parse(s: &str) -> BookingResult<Self> {
        match s {
            "active" => Ok(Self::Active),
            "maintenance" => Ok(Self::Maintenance),
            _ => Err(BookingError::Store(format!("invalid seat status: {s}"))),
        }
    }
}

/// Lifecycle status of a booking.
///
/// ```text
/// pending ──► confirmed ──► checked_in ──► checked_out ──► completed
///    │            │              └──────────────────────────►
///    └──► cancelled ◄──┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting payment
    Pending,
    /// Paid
    Confirmed,
    /// User arrived at the seat
    CheckedIn,
    /// User left the seat
    CheckedOut,
    /// Cancelled (terminal)
    Cancelled,
    /// Finished (terminal)
    Completed,
}

impl BookingStatus {
    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked_in",
            Self::CheckedOut => "checked_out",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Parse from string.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] for an unknown status.
    pub fn parse(s: &str) -> BookingResult<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "checked_in" => Ok(Self::CheckedIn),
            "checked_out" => Ok(Self::CheckedOut),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            _ => Err(BookingError::Store(format!("invalid booking status: {s}"))),
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Whether the booking still occupies its seat window.
    #[must_use]
    pub const fn holds_seat(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one payment attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Sent to the processor, no outcome yet
    Initiated,
    /// Captured
    Success,
    /// Declined, errored or timed out
    Failed,
}

impl PaymentStatus {
    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parse from string.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for an unknown status.
    pub fn parse(s: &str) -> BookingResult<Self> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(BookingError::validation(format!("unknown payment status: {s}"))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two interchangeable payment processors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GatewayKind {
    /// First processor
    #[serde(rename = "gatewayA")]
    GatewayA,
    /// Second processor
    #[serde(rename = "gatewayB")]
    GatewayB,
}

impl GatewayKind {
    /// Both processors.
    pub const ALL: [Self; 2] = [Self::GatewayA, Self::GatewayB];

    /// The other processor (failover target).
    #[must_use]
    pub const fn alternate(&self) -> Self {
        match self {
            Self::GatewayA => Self::GatewayB,
            Self::GatewayB => Self::GatewayA,
        }
    }

    /// Convert to wire/database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GatewayA => "gatewayA",
            Self::GatewayB => "gatewayB",
        }
    }

    /// Parse from string.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for an unknown processor.
    pub fn parse(s: &str) -> BookingResult<Self> {
        match s {
            "gatewayA" => Ok(Self::GatewayA),
            "gatewayB" => Ok(Self::GatewayB),
            _ => Err(BookingError::validation(format!("unknown payment gateway: {s}"))),
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A library operator account; the unit of data isolation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant ID
    pub id: TenantId,
    /// Platform commission taken from every confirmed booking
    pub commission_rate: BasisPoints,
    /// Remaining-credit level at or below which an alert is raised
    pub low_balance_threshold: u64,
    /// Whether low-balance alerts are enabled
    pub alerts_enabled: bool,
    /// Channel used for booking confirmations
    pub notification_channel: Channel,
}

/// A bookable physical resource within a tenant's library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat ID
    pub id: SeatId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Library the seat is in
    pub library_id: LibraryId,
    /// Operational status
    pub status: SeatStatus,
    /// Price of one hour on this seat
    pub hourly_rate: Money,
}

impl Seat {
    /// Price of `window` on this seat, rounded up to the next minor unit.
    #[must_use]
    pub fn price_for(&self, window: &TimeWindow) -> Money {
        let minutes = u128::try_from(window.duration().num_minutes()).unwrap_or(0);
        let minor = (u128::from(self.hourly_rate.minor()) * minutes).div_ceil(60);
        Money::from_minor(u64::try_from(minor).unwrap_or(u64::MAX))
    }
}

/// A reservation of one seat for one time window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking ID
    pub id: BookingId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Reserved seat
    pub seat_id: SeatId,
    /// User who booked
    pub user_id: UserId,
    /// Inclusive start
    pub start_time: DateTime<Utc>,
    /// Exclusive end
    pub end_time: DateTime<Utc>,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Successful payment, once paid
    pub payment_id: Option<PaymentTransactionId>,
    /// Price charged
    pub amount: Money,
}

impl Booking {
    /// The reserved window.
    #[must_use]
    pub const fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// One attempt to charge a booking through one processor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    /// Transaction ID
    pub id: PaymentTransactionId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Booking being paid for
    pub booking_id: BookingId,
    /// Processor used
    pub gateway: GatewayKind,
    /// Processor-side order reference, once known
    pub gateway_order_id: Option<String>,
    /// Attempt outcome
    pub status: PaymentStatus,
    /// Key derived from `(booking_id, attempt)`
    pub idempotency_key: String,
    /// Amount charged
    pub amount: Money,
    /// 1-based attempt number within the booking
    pub attempt: u32,
    /// When the attempt started
    pub created_at: DateTime<Utc>,
}

/// Stable idempotency key for the `attempt`-th charge of a booking.
#[must_use]
pub fn idempotency_key(booking_id: BookingId, attempt: u32) -> String {
    format!("{booking_id}:{attempt}")
}

/// Prepaid messaging balance of one tenant on one channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditWallet {
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Channel
    pub channel: Channel,
    /// Remaining credits (never negative)
    pub balance: u64,
    /// Cumulative spend
    pub total_spent: Money,
}

/// Kind of ledger movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// Credits consumed by an outbound message
    Usage,
    /// Credits purchased
    Purchase,
}

impl LedgerEntryKind {
    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Usage => "usage",
            Self::Purchase => "purchase",
        }
    }

    /// Parse from string.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] for an unknown kind.
    pub fn parse(s: &str) -> BookingResult<Self> {
        match s {
            "usage" => Ok(Self::Usage),
            "purchase" => Ok(Self::Purchase),
            _ => Err(BookingError::Store(format!("invalid ledger entry kind: {s}"))),
        }
    }
}

/// Audit row written for every wallet movement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID
    pub id: Uuid,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Channel
    pub channel: Channel,
    /// Movement kind
    pub kind: LedgerEntryKind,
    /// Credits moved
    pub units: u64,
    /// Money value of the movement
    pub cost: Money,
    /// Wallet balance after the movement
    pub balance_after: u64,
    /// When it happened
    pub created_at: DateTime<Utc>,
}

/// Balances of a tenant across all channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalances {
    /// SMS credits
    pub sms: u64,
    /// WhatsApp credits
    pub whatsapp: u64,
    /// Email credits
    pub email: u64,
}

impl CreditBalances {
    /// Balance for one channel.
    #[must_use]
    pub const fn get(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Sms => self.sms,
            Channel::Whatsapp => self.whatsapp,
            Channel::Email => self.email,
        }
    }

    /// Set the balance for one channel.
    pub fn set(&mut self, channel: Channel, balance: u64) {
        match channel {
            Channel::Sms => self.sms = balance,
            Channel::Whatsapp => self.whatsapp = balance,
            Channel::Email => self.email = balance,
        }
    }
}
