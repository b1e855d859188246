//! Router configuration.

use crate::handlers::{bookings, credits, health::health_check, seats, webhooks};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// | Route | Handler |
/// |---|---|
/// | `GET /health` | liveness |
/// | `POST /bookings` | book and pay |
/// | `GET /bookings/:id`, `DELETE /bookings/:id` | details, cancel |
/// | `POST /bookings/:id/{check-in,check-out,complete}` | lifecycle |
/// | `GET /seats/:id/availability?start=&end=` | availability |
/// | `POST /webhooks/:gateway` | processor callbacks |
/// | `GET /credits`, `POST /credits/top-up` | wallet |
/// | `POST /internal/credits/debit` | messaging service |
pub fn build_router(state: AppState) -> Router {
    let booking_routes = Router::new()
        .route("/bookings", post(bookings::create_booking))
        .route(
            "/bookings/:id",
            get(bookings::get_booking).delete(bookings::cancel_booking),
        )
        .route("/bookings/:id/check-in", post(bookings::check_in))
        .route("/bookings/:id/check-out", post(bookings::check_out))
        .route("/bookings/:id/complete", post(bookings::complete))
        .route("/seats/:id/availability", get(seats::availability));

    let credit_routes = Router::new()
        .route("/credits", get(credits::balances))
        .route("/credits/top-up", post(credits::top_up))
        .route("/internal/credits/debit", post(credits::debit));

    Router::new()
        .route("/health", get(health_check))
        .merge(booking_routes)
        .merge(credit_routes)
        .route("/webhooks/:gateway", post(webhooks::receive))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
