//! Seat availability.

use crate::error::AppError;
use crate::extractors::TenantScope;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
};
use chrono::{DateTime, Utc};
use seatflow_core::SeatId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query of `GET /seats/:id/availability`.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Window start (ISO-8601)
    pub start: DateTime<Utc>,
    /// Window end, exclusive (ISO-8601)
    pub end: DateTime<Utc>,
}

/// Response of `GET /seats/:id/availability`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Seat
    pub seat_id: SeatId,
    /// Window start
    pub start: DateTime<Utc>,
    /// Window end
    pub end: DateTime<Utc>,
    /// Whether no live booking overlaps the window
    pub available: bool,
}

/// Whether a seat is free for `[start, end)`.
///
/// Computed from live bookings on every call.
///
/// # Errors
///
/// `400` bad window or unbookable seat, `403` another tenant's seat.
pub async fn availability(
    State(state): State<AppState>,
    TenantScope(ctx): TenantScope,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<Availability>, AppError> {
    let Path(id) = id?;
    let Query(query) = query?;
    let seat_id = SeatId::from_uuid(id);

    let available = state
        .orchestrator
        .check_available(&ctx, seat_id, query.start, query.end)
        .await?;

    Ok(Json(Availability {
        seat_id,
        start: query.start,
        end: query.end,
        available,
    }))
}
