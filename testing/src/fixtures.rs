//! A fully wired engine over the in-memory store.

use crate::gateways::ScriptedGateway;
use crate::mocks::{FixedClock, RecordingAlertSink, test_clock};
use chrono::{DateTime, Duration, Utc};
use seatflow_core::{
    AlertSink, BasisPoints, BookingPolicy, BookingStateMachine, Channel, Clock, CreditRates,
    DataStore, FeeSchedules, GatewayKind, LibraryId, Money, PaymentGateway, Seat, SeatId,
    SeatStatus, Tenant, TenantContext, TenantId, UserId,
};
use seatflow_runtime::{
    BookingNotifier, BookingOrchestrator, BookingRequest, CreditLedger, InMemoryStore,
    OutboundMessage, PaymentGatewayRouter, WebhookProcessor,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Hourly rate of seats created by [`TestWorld`]: 50.00.
pub const HOURLY_RATE: Money = Money::from_minor(5_000);

/// SMS credits every tenant created by [`TestWorld`] starts with.
pub const STARTING_SMS_CREDITS: u64 = 100;

/// One tenant, one library, one seat, both processors scripted.
///
/// Time is frozen at 2025-01-01 00:00 UTC; [`TestWorld::at`] addresses
/// hours of the following day so requests are always in the future.
pub struct TestWorld {
    /// Backing store, for seeding and inspection
    pub store: Arc<InMemoryStore>,
    /// Shared clock
    pub clock: Arc<FixedClock>,
    /// Processor A fake
    pub gateway_a: Arc<ScriptedGateway>,
    /// Processor B fake
    pub gateway_b: Arc<ScriptedGateway>,
    /// Low-balance alerts raised so far
    pub alerts: Arc<RecordingAlertSink>,
    /// Policy everything was built with
    pub policy: BookingPolicy,
    /// Payment router
    pub router: Arc<PaymentGatewayRouter>,
    /// Credit ledger
    pub ledger: Arc<CreditLedger>,
    /// Orchestrator, with a confirmation notifier
    pub orchestrator: Arc<BookingOrchestrator>,
    /// Webhook processor
    pub webhooks: Arc<WebhookProcessor>,
    /// The default tenant
    pub tenant: Tenant,
    /// The default tenant's library
    pub library_id: LibraryId,
    /// The default tenant's seat
    pub seat: Seat,
    outbox: Mutex<mpsc::Receiver<OutboundMessage>>,
}

impl TestWorld {
    /// Default policy with a 200ms processor timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(BookingPolicy {
            gateway_timeout: std::time::Duration::from_millis(200),
            ..BookingPolicy::default()
        })
    }

    /// Build everything around `policy`.
    #[must_use]
    pub fn with_policy(policy: BookingPolicy) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(test_clock());
        let gateway_a = Arc::new(ScriptedGateway::new(GatewayKind::GatewayA));
        let gateway_b = Arc::new(ScriptedGateway::new(GatewayKind::GatewayB));
        let alerts = Arc::new(RecordingAlertSink::new());

        let shared_clock: Arc<dyn Clock> = clock.clone();
        let router = Arc::new(PaymentGatewayRouter::new(
            gateway_a.clone() as Arc<dyn PaymentGateway>,
            gateway_b.clone() as Arc<dyn PaymentGateway>,
            FeeSchedules::default(),
            &policy,
            shared_clock.clone(),
        ));
        let ledger = Arc::new(CreditLedger::new(
            CreditRates::default(),
            alerts.clone() as Arc<dyn AlertSink>,
            shared_clock.clone(),
        ));
        let (notifier, outbox) = BookingNotifier::new(ledger.clone(), 64);
        let orchestrator = Arc::new(
            BookingOrchestrator::new(policy.clone(), router.clone(), shared_clock)
                .with_notifier(Arc::new(notifier)),
        );
        let webhooks = Arc::new(WebhookProcessor::new(
            store.clone() as Arc<dyn DataStore>,
            router.clone(),
            BookingStateMachine::new(policy.cancellation_fee),
        ));

        let tenant = seed_tenant(&store);
        let library_id = LibraryId::new();
        let seat = seed_seat(&store, tenant.id, library_id);

        Self {
            store,
            clock,
            gateway_a,
            gateway_b,
            alerts,
            policy,
            router,
            ledger,
            orchestrator,
            webhooks,
            tenant,
            library_id,
            seat,
            outbox: Mutex::new(outbox),
        }
    }

    /// Context for the default tenant.
    #[must_use]
    pub fn ctx(&self) -> TenantContext {
        self.ctx_for(&self.tenant)
    }

    /// Context for any seeded tenant.
    #[must_use]
    pub fn ctx_for(&self, tenant: &Tenant) -> TenantContext {
        TenantContext::new(tenant.clone(), self.store.clone() as Arc<dyn DataStore>)
    }

    /// `hour:00` UTC on the day after the frozen clock's date.
    #[must_use]
    pub fn at(&self, hour: i64) -> DateTime<Utc> {
        let midnight = self.clock.now() + Duration::days(1);
        midnight + Duration::hours(hour)
    }

    /// Request for the default seat from `start_hour` to `end_hour` tomorrow.
    #[must_use]
    pub fn request(&self, start_hour: i64, end_hour: i64) -> BookingRequest {
        self.request_for(&self.seat, start_hour, end_hour)
    }

    /// Request for `seat` from `start_hour` to `end_hour` tomorrow.
    #[must_use]
    pub fn request_for(&self, seat: &Seat, start_hour: i64, end_hour: i64) -> BookingRequest {
        BookingRequest {
            library_id: seat.library_id,
            seat_id: seat.id,
            user_id: UserId::new(),
            start_time: self.at(start_hour),
            end_time: self.at(end_hour),
            payment_preference: None,
        }
    }

    /// Seed another tenant with the default settings.
    #[must_use]
    pub fn add_tenant(&self) -> Tenant {
        seed_tenant(&self.store)
    }

    /// Seed an available seat for `tenant_id` in a new library.
    #[must_use]
    pub fn add_seat(&self, tenant_id: TenantId) -> Seat {
        seed_seat(&self.store, tenant_id, LibraryId::new())
    }

    /// Seed a seat with explicit status and price in the default library.
    #[must_use]
    pub fn add_seat_with(&self, status: SeatStatus, hourly_rate: Money) -> Seat {
        let seat = Seat {
            id: SeatId::new(),
            tenant_id: self.tenant.id,
            library_id: self.library_id,
            status,
            hourly_rate,
        };
        self.store.add_seat(seat.clone());
        seat
    }

    /// Drain every confirmation message queued so far.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
        let mut messages = Vec::new();
        while let Ok(message) = outbox.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TestWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestWorld")
            .field("tenant", &self.tenant.id)
            .field("seat", &self.seat.id)
            .finish_non_exhaustive()
    }
}

fn seed_tenant(store: &InMemoryStore) -> Tenant {
    let tenant = Tenant {
        id: TenantId::new(),
        commission_rate: BasisPoints::from_percent(10),
        low_balance_threshold: 10,
        alerts_enabled: true,
        notification_channel: Channel::Sms,
    };
    store.add_tenant(tenant.clone());
    store.set_balance(tenant.id, Channel::Sms, STARTING_SMS_CREDITS);
    tenant
}

fn seed_seat(store: &InMemoryStore, tenant_id: TenantId, library_id: LibraryId) -> Seat {
    let seat = Seat {
        id: SeatId::new(),
        tenant_id,
        library_id,
        status: SeatStatus::Active,
        hourly_rate: HOURLY_RATE,
    };
    store.add_seat(seat.clone());
    seat
}
