//! Custom Axum extractors.
//!
//! - [`TenantScope`]: the calling tenant, resolved from `X-Tenant-Id`
//! - [`CurrentUser`]: the calling user from `X-User-Id`
//! - [`CorrelationId`]: the request's correlation id
//!
//! Authentication happens upstream; these headers are trusted as given.

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use crate::state::AppState;
use crate::{TENANT_HEADER, USER_HEADER};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use seatflow_core::{TenantContext, TenantId, UserId};
use uuid::Uuid;

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Uuid, AppError> {
    let value = headers
        .get(name)
        .ok_or_else(|| AppError::validation(format!("missing {name} header")))?;
    value
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| AppError::validation(format!("{name} must be a UUID")))
}

/// Resolved tenant context for the request.
///
/// An unknown tenant is rejected with `404 NOT_FOUND`.
#[derive(Debug, Clone)]
pub struct TenantScope(pub TenantContext);

#[async_trait]
impl FromRequestParts<AppState> for TenantScope {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tenant_id = TenantId::from_uuid(uuid_header(&parts.headers, TENANT_HEADER)?);
        let ctx = state.resolve_tenant(tenant_id).await?;
        tracing::Span::current().record("tenant_id", tracing::field::display(tenant_id));
        Ok(Self(ctx))
    }
}

/// Calling user.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(UserId::from_uuid(uuid_header(&parts.headers, USER_HEADER)?)))
    }
}

/// Correlation ID for request tracing.
///
/// Taken from the request extensions populated by
/// [`correlation_id_layer`](crate::middleware::correlation_id_layer), then from
/// the `X-Correlation-ID` header; a fresh UUID v4 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<CorrelationId>() {
            return Ok(*id);
        }
        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}
