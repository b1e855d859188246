//! `gatewayB`: order-based API; a declined order comes back as `200` with
//! state `FAILED`.

use super::{GatewayEndpoint, WebhookSigner, parse_error, status_error, transport_error};
use futures::future::BoxFuture;
use reqwest::Client;
use seatflow_core::{
    ChargeReceipt, GatewayError, GatewayKind, Money, PaymentGateway, PaymentRequest, WebhookEvent,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct OrderBody {
    order_amount: u64,
    order_ref: String,
    merchant_ref: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    order_id: String,
    state: String,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Serialize)]
struct RefundBody {
    refund_amount: u64,
}

#[derive(Deserialize)]
struct RefundResponse {
    refund_id: String,
}

/// HTTP client for `gatewayB`.
#[derive(Clone, Debug)]
pub struct GatewayBClient {
    client: Client,
    endpoint: GatewayEndpoint,
    signer: WebhookSigner,
}

impl GatewayBClient {
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

    async fn create_order(&self, request: PaymentRequest) -> Result<ChargeReceipt, GatewayError> {
        let response = self
            .client
            .post(format!("{}/orders", self.endpoint.base_url))
            .header("X-Api-Key", &self.endpoint.api_key)
            .header("X-Idempotency-Key", &request.idempotency_key)
            .json(&OrderBody {
                order_amount: request.amount.minor(),
                order_ref: request.booking_id.to_string(),
                merchant_ref: request.tenant_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let order: OrderResponse = response.json().await.map_err(|e| parse_error(&e))?;
        match order.state.as_str() {
            "PAID" => Ok(ChargeReceipt {
                gateway_order_id: order.order_id,
            }),
            "FAILED" => Err(GatewayError::Declined {
                reason: order
                    .failure_reason
                    .unwrap_or_else(|| "order failed".to_string()),
                gateway_order_id: Some(order.order_id),
            }),
            other => Err(GatewayError::InvalidResponse {
                message: format!("unexpected order state: {other}"),
            }),
        }
    }

    async fn refund_order(&self, order_id: String, amount: Money) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(format!("{}/orders/{order_id}/refunds", self.endpoint.base_url))
            .header("X-Api-Key", &self.endpoint.api_key)
            .json(&RefundBody {
                refund_amount: amount.minor(),
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
        Ok(refund.refund_id)
    }
}

impl PaymentGateway for GatewayBClient {
    fn kind(&self) -> GatewayKind {
        GatewayKind::GatewayB
    }

    fn pay(&self, request: PaymentRequest) -> BoxFuture<'_, Result<ChargeReceipt, GatewayError>> {
        Box::pin(self.create_order(request))
    }

    fn verify_webhook(&self, event: &WebhookEvent) -> bool {
        self.signer.verify(event)
    }

    fn refund(
        &self,
        gateway_order_id: String,
        amount: Money,
    ) -> BoxFuture<'_, Result<String, GatewayError>> {
        Box::pin(self.refund_order(gateway_order_id, amount))
    }
}
