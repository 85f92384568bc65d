//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the verified numeric
//! user id in the `x-user-id` header.

use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use primm_types::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller extracted from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing user identity".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("invalid user identity".to_string()))?;

        let id = raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::Unauthorized("invalid user identity".to_string()))?;

        Ok(AuthUser(UserId::new(id)))
    }
}
