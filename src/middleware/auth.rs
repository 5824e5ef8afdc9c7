//! Caller identity.
//!
//! Authentication happens upstream; the auth layer forwards the verified user
//! id in `X-User-Id`. Handlers receive it as a typed [`CurrentUser`].

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing user identity".to_string()))?;

        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(CurrentUser { id }),
            _ => Err(AppError::Unauthorized("invalid user identity".to_string())),
        }
    }
}
