//! Error types for web handlers.
//!
//! [`AppError`] bridges engine errors and HTTP responses. The body is always
//! `{ "error": CODE, "message": "..." }` where `CODE` is the stable machine
//! code of the underlying [`BookingError`].

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use seatflow_core::BookingError;
use seatflow_runtime::WebhookError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the internal cause.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 with code `VALIDATION_ERROR`.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "VALIDATION_ERROR")
    }

    /// 401 for an unverifiable processor callback.
    #[must_use]
    pub fn invalid_signature() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "Webhook signature did not verify".to_string(),
            "INVALID_SIGNATURE",
        )
    }

    /// 500 with code `INTERNAL_ERROR`.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_ERROR",
        )
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

/// HTTP status for each engine error.
#[must_use]
pub const fn status_for(error: &BookingError) -> StatusCode {
    match error {
        BookingError::Validation { .. } => StatusCode::BAD_REQUEST,
        BookingError::Conflict { .. } | BookingError::InvalidStateTransition { .. } => {
            StatusCode::CONFLICT
        }
        BookingError::Gateway { .. } | BookingError::InsufficientCredits { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        BookingError::TenantIsolationViolation { .. } => StatusCode::FORBIDDEN,
        BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
        BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let status = status_for(&err);
        let code = err.code();
        // Never echo infrastructure detail to the caller.
        if matches!(err, BookingError::Store(_)) {
            return Self::internal("An internal error occurred").with_source(anyhow::Error::new(err));
        }
        // Ownership details stay in the security log.
        if matches!(err, BookingError::TenantIsolationViolation { .. }) {
            return Self::new(
                status,
                "Resource does not belong to the calling tenant".to_string(),
                code,
            );
        }
        Self::new(status, err.to_string(), code)
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidSignature => Self::invalid_signature(),
            WebhookError::Booking(inner) => inner.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    error: &'static str,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(status = %self.status, code = self.code, "Internal server error");
            }
        } else {
            tracing::debug!(status = %self.status, code = self.code, message = %self.message, "Request rejected");
        }
        metrics::counter!("seatflow.http.errors", "code" => self.code).increment(1);

        let body = ErrorResponse {
            error: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}
