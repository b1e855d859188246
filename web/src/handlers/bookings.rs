//! Booking endpoints.
//!
//! - `POST /bookings`: book a seat and pay for it in one call
//! - `GET /bookings/:id`: booking plus payment history
//! - `DELETE /bookings/:id`: cancel, refunding per the cancellation fee
//! - `POST /bookings/:id/check-in`, `/check-out`, `/complete`: lifecycle
//!
//! The client always gets a terminal answer from `POST /bookings`: `201`
//! with a confirmed booking, or an error after which the booking (if one was
//! created) is already cancelled.

use crate::error::AppError;
use crate::extractors::{CorrelationId, CurrentUser, TenantScope};
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use seatflow_core::{
    Booking, BookingId, BookingStatus, GatewayKind, LibraryId, Money, PaymentStatus,
    PaymentTransaction, SeatId,
};
use seatflow_runtime::BookingRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /bookings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    /// Library the seat is in
    pub library_id: Uuid,
    /// Seat to book
    pub seat_id: Uuid,
    /// Window start (ISO-8601)
    pub start_time: DateTime<Utc>,
    /// Window end, exclusive (ISO-8601)
    pub end_time: DateTime<Utc>,
    /// `gatewayA` or `gatewayB`; cheapest processor when absent
    pub payment_preference: Option<String>,
}

/// Response of `POST /bookings`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBooking {
    /// New booking
    pub booking_id: BookingId,
    /// Always `confirmed`
    pub status: BookingStatus,
    /// Processor that captured the payment
    pub payment_gateway: GatewayKind,
    /// Amount charged, in minor units
    pub amount: Money,
}

/// Response of `DELETE /bookings/:id`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledBooking {
    /// Booking
    pub booking_id: BookingId,
    /// Always `cancelled`
    pub status: BookingStatus,
    /// Amount returned to the payer, in minor units
    pub refund_amount: Money,
}

/// A booking as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingBody {
    /// Booking ID
    pub booking_id: BookingId,
    /// Seat
    pub seat_id: SeatId,
    /// Window start
    pub start_time: DateTime<Utc>,
    /// Window end (exclusive)
    pub end_time: DateTime<Utc>,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Amount, in minor units
    pub amount: Money,
}

impl From<Booking> for BookingBody {
    fn from(booking: Booking) -> Self {
        Self {
            booking_id: booking.id,
            seat_id: booking.seat_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            status: booking.status,
            amount: booking.amount,
        }
    }
}

/// One payment attempt as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
    /// Processor
    pub gateway: GatewayKind,
    /// Processor order reference, once known
    pub gateway_order_id: Option<String>,
    /// Attempt status
    pub status: PaymentStatus,
    /// Attempt number (1 or 2)
    pub attempt: u32,
    /// Amount, in minor units
    pub amount: Money,
    /// When the attempt started
    pub created_at: DateTime<Utc>,
}

impl From<PaymentTransaction> for PaymentBody {
    fn from(transaction: PaymentTransaction) -> Self {
        Self {
            gateway: transaction.gateway,
            gateway_order_id: transaction.gateway_order_id,
            status: transaction.status,
            attempt: transaction.attempt,
            amount: transaction.amount,
            created_at: transaction.created_at,
        }
    }
}

/// Response of `GET /bookings/:id`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetailsBody {
    /// Booking
    #[serde(flatten)]
    pub booking: BookingBody,
    /// Payment attempts, oldest first
    pub payments: Vec<PaymentBody>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Book a seat and pay for it.
///
/// ```bash
/// curl -X POST http://localhost:8080/bookings \
///   -H "X-Tenant-Id: <tenant>" -H "X-User-Id: <user>" \
///   -H "Content-Type: application/json" \
///   -d '{"libraryId":"...","seatId":"...","startTime":"2025-06-01T10:00:00Z","endTime":"2025-06-01T12:00:00Z"}'
/// ```
///
/// # Errors
///
/// `400` invalid request, `409` overlapping window, `402` payment failed.
pub async fn create_booking(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
    CurrentUser(user_id): CurrentUser,
    correlation_id: CorrelationId,
    body: Result<Json<CreateBookingBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedBooking>), AppError> {
    let Json(body) = body?;
    let payment_preference = body
        .payment_preference
        .as_deref()
        .map(GatewayKind::parse)
        .transpose()?;

    let confirmation = state
        .orchestrator
        .create_booking(
            &ctx,
            BookingRequest {
                library_id: LibraryId::from_uuid(body.library_id),
                seat_id: SeatId::from_uuid(body.seat_id),
                user_id,
                start_time: body.start_time,
                end_time: body.end_time,
                payment_preference,
            },
        )
        .await?;

    tracing::info!(
        correlation_id = %correlation_id.0,
        booking_id = %confirmation.booking.id,
        gateway = %confirmation.payment.gateway,
        "Booking confirmed"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedBooking {
            booking_id: confirmation.booking.id,
            status: confirmation.booking.status,
            payment_gateway: confirmation.payment.gateway,
            amount: confirmation.booking.amount,
        }),
    ))
}

/// Booking and its payment history.
///
/// # Errors
///
/// `404` unknown booking, `403` another tenant's booking.
pub async fn get_booking(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookingDetailsBody>, AppError> {
    let Path(id) = id?;
    let details = state
        .orchestrator
        .booking_details(&ctx, BookingId::from_uuid(id))
        .await?;
    Ok(Json(BookingDetailsBody {
        booking: details.booking.into(),
        payments: details.payments.into_iter().map(Into::into).collect(),
    }))
}

/// Cancel a booking.
///
/// # Errors
///
/// `409` if the booking can no longer be cancelled, `402` if the refund
/// could not be issued (the booking stays confirmed).
pub async fn cancel_booking(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CancelledBooking>, AppError> {
    let Path(id) = id?;
    let cancellation = state
        .orchestrator
        .cancel_booking(&ctx, BookingId::from_uuid(id))
        .await?;
    Ok(Json(CancelledBooking {
        booking_id: cancellation.booking.id,
        status: cancellation.booking.status,
        refund_amount: cancellation.refund_amount,
    }))
}

/// Mark the user as arrived.
///
/// # Errors
///
/// `409` unless the booking is confirmed.
pub async fn check_in(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookingBody>, AppError> {
    let Path(id) = id?;
    let booking = state
        .orchestrator
        .check_in(&ctx, BookingId::from_uuid(id))
        .await?;
    Ok(Json(booking.into()))
}

/// Mark the user as gone.
///
/// # Errors
///
/// `409` unless the booking is checked in.
pub async fn check_out(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookingBody>, AppError> {
    let Path(id) = id?;
    let booking = state
        .orchestrator
        .check_out(&ctx, BookingId::from_uuid(id))
        .await?;
    Ok(Json(booking.into()))
}

/// Close out a booking.
///
/// # Errors
///
/// `409` if the booking is not in a completable status.
pub async fn complete(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookingBody>, AppError> {
    let Path(id) = id?;
    let booking = state
        .orchestrator
        .complete(&ctx, BookingId::from_uuid(id))
        .await?;
    Ok(Json(booking.into()))
}
