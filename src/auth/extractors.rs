use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session";

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub username: String,
}

/// Requires a valid session; rejects with 401 otherwise.
pub struct AuthUser(pub Identity);

/// Session if present and valid, `None` otherwise. Never rejects.
pub struct MaybeUser(pub Option<Identity>);

/// Bearer token wins over the session cookie.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")));
    bearer.or_else(|| session_cookie_value(headers))
}

pub fn session_cookie_value(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

/// `Set-Cookie` value establishing the session.
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value expiring the session.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

fn identity_from_headers(headers: &HeaderMap, keys: &JwtKeys) -> Result<Identity, AppError> {
    let token = token_from_headers(headers).ok_or(AppError::Unauthenticated)?;
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid or expired session token");
        AppError::Unauthenticated
    })?;
    Ok(Identity {
        id: claims.sub,
        username: claims.username,
    })
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
        identity_from_headers(&parts.headers, &keys).map(AuthUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeUser(identity_from_headers(&parts.headers, &keys).ok()))
    }
}
