//! Scripted payment processor.

use futures::future::BoxFuture;
use seatflow_core::{
    ChargeReceipt, GatewayError, GatewayKind, Money, PaymentGateway, PaymentRequest, PaymentStatus,
    WebhookEvent,
};
use seatflow_runtime::gateways::WebhookSigner;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// How the next `pay` call behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayScript {
    /// Capture the charge
    Succeed,
    /// Capture after a delay
    SucceedAfter(Duration),
    /// Business decline
    Decline(String),
    /// Processor-level error
    Fail(String),
    /// Never answer (the router's timeout fires)
    Hang,
    /// Panic inside the client
    Panic,
}

/// Payment processor fake that follows a queue of [`GatewayScript`]s and
/// then succeeds.
///
/// Every `pay` and `refund` call is recorded. Webhooks are verified with a
/// real [`WebhookSigner`], so tests can sign events with [`Self::sign`].
#[derive(Debug)]
pub struct ScriptedGateway {
    kind: GatewayKind,
    script: Mutex<VecDeque<GatewayScript>>,
    payments: Mutex<Vec<PaymentRequest>>,
    refunds: Mutex<Vec<(String, Money)>>,
    refunds_fail: AtomicBool,
    refund_delay: Mutex<Option<Duration>>,
    orders: AtomicU64,
    signer: WebhookSigner,
}

impl ScriptedGateway {
    /// Create a fake for `kind` with signing secret `"{kind}-secret"`.
    #[must_use]
    pub fn new(kind: GatewayKind) -> Self {
        Self {
            kind,
            script: Mutex::new(VecDeque::new()),
            payments: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
            refunds_fail: AtomicBool::new(false),
            refund_delay: Mutex::new(None),
            orders: AtomicU64::new(0),
            signer: WebhookSigner::new(format!("{kind}-secret")),
        }
    }

    /// Queue the behavior of the next unscripted `pay` call.
    pub fn push(&self, step: GatewayScript) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
    }

    /// Make every refund call fail with a processor error.
    pub fn fail_refunds(&self, fail: bool) {
        self.refunds_fail.store(fail, Ordering::SeqCst);
    }

    /// Make every refund call wait `delay` before answering.
    pub fn delay_refunds(&self, delay: Duration) {
        *self
            .refund_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Charge requests received, oldest first.
    #[must_use]
    pub fn payments(&self) -> Vec<PaymentRequest> {
        self.payments.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Refunds received as `(order id, amount)`, oldest first.
    #[must_use]
    pub fn refunds(&self) -> Vec<(String, Money)> {
        self.refunds.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Webhook signature this processor would send.
    #[must_use]
    pub fn sign(&self, gateway_order_id: &str, status: PaymentStatus) -> String {
        self.signer.sign(gateway_order_id, status)
    }

    /// A correctly signed webhook event.
    #[must_use]
    pub fn webhook(&self, gateway_order_id: &str, status: PaymentStatus) -> WebhookEvent {
        WebhookEvent {
            gateway_order_id: gateway_order_id.to_string(),
            status,
            signature: self.sign(gateway_order_id, status),
        }
    }

    fn next_order_id(&self) -> String {
        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_order_{n}", self.kind)
    }

    fn next_step(&self) -> GatewayScript {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(GatewayScript::Succeed)
    }
}

impl PaymentGateway for ScriptedGateway {
    fn kind(&self) -> GatewayKind {
        self.kind
    }

    #[allow(clippy::panic)]
    fn pay(&self, request: PaymentRequest) -> BoxFuture<'_, Result<ChargeReceipt, GatewayError>> {
        self.payments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        let step = self.next_step();
        let order_id = self.next_order_id();

        Box::pin(async move {
            match step {
                GatewayScript::Succeed => Ok(ChargeReceipt {
                    gateway_order_id: order_id,
                }),
                GatewayScript::SucceedAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(ChargeReceipt {
                        gateway_order_id: order_id,
                    })
                }
                GatewayScript::Decline(reason) => Err(GatewayError::Declined {
                    reason,
                    gateway_order_id: Some(order_id),
                }),
                GatewayScript::Fail(message) => Err(GatewayError::Unavailable { message }),
                GatewayScript::Hang => futures::future::pending().await,
                GatewayScript::Panic => panic!("scripted processor panic"),
            }
        })
    }

    fn verify_webhook(&self, event: &WebhookEvent) -> bool {
        self.signer.verify(event)
    }

    fn refund(
        &self,
        gateway_order_id: String,
        amount: Money,
    ) -> BoxFuture<'_, Result<String, GatewayError>> {
        let delay = *self
            .refund_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.refunds_fail.load(Ordering::SeqCst) {
                return Err(GatewayError::Unavailable {
                    message: "refunds unavailable".to_string(),
                });
            }
            let reference = format!("refund_{gateway_order_id}");
            self.refunds
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((gateway_order_id, amount));
            Ok(reference)
        })
    }
}
