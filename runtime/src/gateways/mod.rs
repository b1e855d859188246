//! HTTP clients for the two payment processors.
//!
//! Both speak JSON over HTTPS but with different wire shapes; they share only
//! the error classification below. Selection between them happens in the
//! router, never here.

mod gateway_a;
mod gateway_b;
pub mod signature;

pub use gateway_a::GatewayAClient;
pub use gateway_b::GatewayBClient;
pub use signature::WebhookSigner;

use reqwest::StatusCode;
use seatflow_core::GatewayError;

/// Connection settings of one processor.
#[derive(Clone)]
pub struct GatewayEndpoint {
    /// API base URL, without trailing slash
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Webhook signing secret
    pub signing_secret: String,
}

impl std::fmt::Debug for GatewayEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayEndpoint")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Network-level failure.
fn transport_error(error: &reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unavailable {
            message: error.to_string(),
        }
    }
}

/// Non-success HTTP status. Only payment-required and unprocessable responses
/// are business declines; everything else is the processor's fault.
fn status_error(status: StatusCode, body: String) -> GatewayError {
    match status {
        StatusCode::PAYMENT_REQUIRED | StatusCode::UNPROCESSABLE_ENTITY => GatewayError::Declined {
            reason: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
            gateway_order_id: None,
        },
        _ => GatewayError::Unavailable {
            message: format!("HTTP {}: {body}", status.as_u16()),
        },
    }
}

fn parse_error(error: &reqwest::Error) -> GatewayError {
    GatewayError::InvalidResponse {
        message: error.to_string(),
    }
}
