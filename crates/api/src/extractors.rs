//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use social_common::{AppError, UserId};
use tokio_util::sync::CancellationToken;

use crate::middleware::ResolvedUser;

/// The acting user; rejects the request with 401 when absent.
#[derive(Debug, Clone, Copy)]
pub struct RequestUser(pub UserId);

impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the request user middleware
        parts
            .extensions
            .get::<ResolvedUser>()
            .map(|ResolvedUser(id)| Self(*id))
            .ok_or(AppError::Unauthorized)
    }
}

/// The request's cancellation token.
///
/// Falls back to a fresh, never-cancelled token when the cancellation
/// middleware is not installed.
#[derive(Debug, Clone)]
pub struct Cancel(pub CancellationToken);

impl<S> FromRequestParts<S> for Cancel
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<CancellationToken>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}
