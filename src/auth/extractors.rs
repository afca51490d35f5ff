use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};

use super::{repo_types::User, services::AuthService};
use crate::error::AppError;

/// Header carrying the session token, both ways.
pub const AUTH_HEADER: &str = "x-auth";

/// Resolved caller of a gated route, with the token it presented.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Reads `Authorization: Bearer <token>`, falling back to `x-auth` when
/// there is no usable bearer token.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| {
            auth.strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }
    headers
        .get(AUTH_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Authentication)?;
        let user = AuthService::from_ref(state).authenticate(&token).await?;
        Ok(AuthUser { user, token })
    }
}
