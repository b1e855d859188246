//! Webhook signatures: lowercase hex HMAC-SHA256 of `"{gatewayOrderId}|{status}"`.

use hmac::{Hmac, Mac};
use seatflow_core::{PaymentStatus, WebhookEvent};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies webhooks with one processor's signing secret.
#[derive(Clone)]
pub struct WebhookSigner {
    secret: Vec<u8>,
}

impl WebhookSigner {
    /// Create a signer for `secret`.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, gateway_order_id: &str, status: PaymentStatus) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(gateway_order_id.as_bytes());
        mac.update(b"|");
        mac.update(status.as_str().as_bytes());
        Some(mac)
    }

    /// Signature a processor would attach to this order and status.
    #[must_use]
    pub fn sign(&self, gateway_order_id: &str, status: PaymentStatus) -> String {
        self.mac(gateway_order_id, status)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Constant-time check of `event.signature`.
    #[must_use]
    pub fn verify(&self, event: &WebhookEvent) -> bool {
        let Ok(provided) = hex::decode(event.signature.trim()) else {
            return false;
        };
        self.mac(&event.gateway_order_id, event.status)
            .is_some_and(|mac| mac.verify_slice(&provided).is_ok())
    }
}

impl std::fmt::Debug for WebhookSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(order: &str, status: PaymentStatus, signature: String) -> WebhookEvent {
        WebhookEvent {
            gateway_order_id: order.to_string(),
            status,
            signature,
        }
    }

    #[test]
    fn test_signed_event_verifies() {
        let signer = WebhookSigner::new("whsec_a");
        let signature = signer.sign("ord_1", PaymentStatus::Success);
        assert_eq!(signature.len(), 64);
        assert!(signer.verify(&event("ord_1", PaymentStatus::Success, signature)));
    }

    #[test]
    fn test_tampered_status_fails() {
        let signer = WebhookSigner::new("whsec_a");
        let signature = signer.sign("ord_1", PaymentStatus::Failed);
        assert!(!signer.verify(&event("ord_1", PaymentStatus::Success, signature)));
    }

    #[test]
    fn test_other_secret_fails() {
        let signature = WebhookSigner::new("whsec_b").sign("ord_1", PaymentStatus::Success);
        assert!(!WebhookSigner::new("whsec_a").verify(&event("ord_1", PaymentStatus::Success, signature)));
    }

    #[test]
    fn test_garbage_signature_fails() {
        let signer = WebhookSigner::new("whsec_a");
        assert!(!signer.verify(&event("ord_1", PaymentStatus::Success, "not-hex".to_string())));
        assert!(!signer.verify(&event("ord_1", PaymentStatus::Success, String::new())));
    }
}
