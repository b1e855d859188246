//! Messaging credit endpoints.
//!
//! - `POST /internal/credits/debit`: called by the messaging service before
//!   each outbound message; the tenant comes from the body
//! - `POST /credits/top-up`, `GET /credits`: tenant-facing wallet management

use crate::error::AppError;
use crate::extractors::TenantScope;
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use seatflow_core::{BookingError, Channel, CreditBalances, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /internal/credits/debit`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitBody {
    /// Tenant whose wallet is charged
    pub tenant_id: Uuid,
    /// `sms`, `whatsapp` or `email`
    pub channel: Channel,
    /// Credits to consume
    pub units: u64,
}

/// Response of `POST /internal/credits/debit`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitAck {
    /// `false` when the balance could not cover the debit
    pub ok: bool,
    /// Balance left on the channel; the untouched balance when `ok` is false
    pub remaining: u64,
}

/// Body of `POST /credits/top-up`.
#[derive(Debug, Deserialize)]
pub struct TopUpBody {
    /// Channel to fund
    pub channel: Channel,
    /// Credits purchased
    pub units: u64,
}

/// Response of `POST /credits/top-up`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopUpAck {
    /// Channel funded
    pub channel: Channel,
    /// New balance
    pub balance: u64,
}

/// Atomically check and deduct credits.
///
/// A balance too low for the debit answers `402` with
/// `{ "ok": false, "remaining": <balance> }` and leaves the wallet untouched.
///
/// # Errors
///
/// `400` for zero units, `404` unknown tenant.
pub async fn debit(
    State(state): State<AppState>,
    body: Result<Json<DebitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<DebitAck>), AppError> {
    let Json(body) = body?;
    let ctx = state
        .resolve_tenant(TenantId::from_uuid(body.tenant_id))
        .await?;

    match state
        .ledger
        .reserve_and_debit(&ctx, body.channel, body.units)
        .await
    {
        Ok(receipt) => Ok((
            StatusCode::OK,
            Json(DebitAck {
                ok: true,
                remaining: receipt.remaining,
            }),
        )),
        Err(BookingError::InsufficientCredits { available, .. }) => Ok((
            StatusCode::PAYMENT_REQUIRED,
            Json(DebitAck {
                ok: false,
                remaining: available,
            }),
        )),
        Err(error) => Err(error.into()),
    }
}

/// Add purchased credits.
///
/// # Errors
///
/// `400` for zero units.
pub async fn top_up(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
    body: Result<Json<TopUpBody>, JsonRejection>,
) -> Result<Json<TopUpAck>, AppError> {
    let Json(body) = body?;
    let balance = state.ledger.top_up(&ctx, body.channel, body.units).await?;
    Ok(Json(TopUpAck {
        channel: body.channel,
        balance,
    }))
}

/// Balances on every channel.
///
/// # Errors
///
/// `500` on store failure.
pub async fn balances(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
) -> Result<Json<CreditBalances>, AppError> {
    Ok(Json(state.ledger.balances(&ctx).await?))
}
