//! Caller identity extraction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// The authenticated caller.
///
/// Authentication itself lives upstream; by the time a request reaches
/// this service the gateway has already verified the session and set the
/// `X-User-Id` header. A missing or malformed header is a bad request,
/// not an authentication failure we could recover from here.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub UserId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .ok_or_else(|| ApiError::BadRequest("missing X-User-Id header".to_string()))?;

        let user_id = header
            .to_str()
            .ok()
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| ApiError::BadRequest("invalid X-User-Id header".to_string()))?;

        Ok(Caller(user_id))
    }
}
