use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Validated access token, yielding the user ID.
pub struct AuthUser(pub Uuid);

/// Like `AuthUser`, but `None` when no Authorization header is sent.
/// A header that is present but invalid is still rejected.
pub struct MaybeAuthUser(pub Option<Uuid>);

fn bearer_user(parts: &Parts, keys: &JwtKeys) -> Result<Option<Uuid>, AppError> {
    let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let auth = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    // Expect "Bearer <token>"
    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid auth scheme".into()))?;

    match keys.verify_access(token) {
        Ok(claims) => Ok(Some(claims.sub)),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            Err(AppError::Unauthorized("Invalid or expired token".into()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        bearer_user(parts, &keys)?
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeAuthUser(bearer_user(parts, &keys)?))
    }
}
