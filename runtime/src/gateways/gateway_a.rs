//! `gatewayA`: charges API with header-based idempotency.

use super::{GatewayEndpoint, WebhookSigner, parse_error, status_error, transport_error};
use futures::future::BoxFuture;
use reqwest::Client;
use seatflow_core::{
    ChargeReceipt, GatewayError, GatewayKind, Money, PaymentGateway, PaymentRequest, WebhookEvent,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChargeBody {
    amount: u64,
    reference: String,
    tenant: String,
    description: &'static str,
}

#[derive(Deserialize)]
struct ChargeResponse {
    id: String,
    status: String,
    #[serde(default)]
    decline_reason: Option<String>,
}

#[derive(Serialize)]
struct RefundBody<'a> {
    charge: &'a str,
    amount: u64,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
}

/// HTTP client for `gatewayA`.
#[derive(Clone, Debug)]
pub struct GatewayAClient {
    client: Client,
    endpoint: GatewayEndpoint,
    signer: WebhookSigner,
}

impl GatewayAClient {
    /// Create a client.
    #[must_use]
    pub fn new(endpoint: GatewayEndpoint) -> Self {
        let signer = WebhookSigner::new(&endpoint.signing_secret);
        Self {
            client: Client::new(),
            endpoint,
            signer,
        }
    }

    async fn charge(&self, request: PaymentRequest) -> Result<ChargeReceipt, GatewayError> {
        let body = ChargeBody {
            amount: request.amount.minor(),
            reference: request.booking_id.to_string(),
            tenant: request.tenant_id.to_string(),
            description: "seat booking",
        };

        let response = self
            .client
            .post(format!("{}/v1/charges", self.endpoint.base_url))
            .bearer_auth(&self.endpoint.api_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let charge: ChargeResponse = response.json().await.map_err(|e| parse_error(&e))?;
        match charge.status.as_str() {
            "succeeded" => Ok(ChargeReceipt {
                gateway_order_id: charge.id,
            }),
            "declined" => Err(GatewayError::Declined {
                reason: charge
                    .decline_reason
                    .unwrap_or_else(|| "declined".to_string()),
                gateway_order_id: Some(charge.id),
            }),
            other => Err(GatewayError::InvalidResponse {
                message: format!("unexpected charge status: {other}"),
            }),
        }
    }

    async fn refund_charge(
        &self,
        charge_id: String,
        amount: Money,
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(format!("{}/v1/refunds", self.endpoint.base_url))
            .bearer_auth(&self.endpoint.api_key)
            .header("Idempotency-Key", format!("refund:{charge_id}:{}", amount.minor()))
            .json(&RefundBody {
                charge: &charge_id,
                amount: amount.minor(),
            })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let refund: RefundResponse = response.json().await.map_err(|e| parse_error(&e))?;
        Ok(refund.id)
    }
}

impl PaymentGateway for GatewayAClient {
    fn kind(&self) -> GatewayKind {
        GatewayKind::GatewayA
    }

    fn pay(&self, request: PaymentRequest) -> BoxFuture<'_, Result<ChargeReceipt, GatewayError>> {
        Box::pin(self.charge(request))
    }

    fn verify_webhook(&self, event: &WebhookEvent) -> bool {
        self.signer.verify(event)
    }

    fn refund(
        &self,
        gateway_order_id: String,
        amount: Money,
    ) -> BoxFuture<'_, Result<String, GatewayError>> {
        Box::pin(self.refund_charge(gateway_order_id, amount))
    }
}
