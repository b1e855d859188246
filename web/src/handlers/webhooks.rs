//! Payment processor callbacks.
//!
//! `POST /webhooks/:gateway` with `{ gatewayOrderId, status, signature }`.
//! The signature is verified against that processor's secret before anything
//! is read or written; a bad signature is answered with `401` and dropped.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use seatflow_core::{BookingId, BookingStatus, GatewayKind, PaymentStatus, WebhookEvent};
use seatflow_runtime::WebhookOutcome;
use serde::{Deserialize, Serialize};

/// Response of `POST /webhooks/:gateway`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    /// `applied`, `duplicate`, `stale`, `refunded` or `unknown_order`
    pub result: String,
    /// Booking touched by the event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    /// Booking status after the event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_status: Option<BookingStatus>,
    /// Stored attempt status a stale event disagreed with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_status: Option<PaymentStatus>,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        let ack = |result: &str| Self {
            result: result.to_string(),
            booking_id: None,
            booking_status: None,
            stored_status: None,
        };
        match outcome {
            WebhookOutcome::Applied {
                booking_id,
                booking_status,
            } => Self {
                booking_id: Some(booking_id),
                booking_status: Some(booking_status),
                ..ack("applied")
            },
            WebhookOutcome::Duplicate => ack("duplicate"),
            WebhookOutcome::Stale { stored } => Self {
                stored_status: Some(stored),
                ..ack("stale")
            },
            WebhookOutcome::Refunded { booking_id, .. } => Self {
                booking_id: Some(booking_id),
                booking_status: Some(BookingStatus::Cancelled),
                ..ack("refunded")
            },
            WebhookOutcome::UnknownOrder => ack("unknown_order"),
        }
    }
}

/// Verify and apply one processor callback.
///
/// Verified events are always acknowledged with `200`, including duplicates
/// and stale events, so processors stop redelivering them.
///
/// # Errors
///
/// `401 INVALID_SIGNATURE`, `400` for an unknown processor name.
pub async fn receive(
    State(state): State<AppState>,
    gateway: Result<Path<String>, PathRejection>,
    event: Result<Json<WebhookEvent>, JsonRejection>,
) -> Result<Json<WebhookAck>, AppError> {
    let Path(gateway) = gateway?;
    let gateway = GatewayKind::parse(&gateway)?;
    let Json(event) = event?;

    let outcome = state.webhooks.process(gateway, event).await?;
    Ok(Json(outcome.into()))
}
