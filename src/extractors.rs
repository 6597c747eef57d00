//! Authentication Extractors
//!
//! Token transport (bearer header and cookies), the typed per-request
//! [`AuthContext`], and request metadata for logging.

use crate::error::AuthError;
use crate::models::AuthContext;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;

/// Cookie carrying the access token
pub const ACCESS_COOKIE: &str = "access_token";

/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Tokens as they arrived on the request
#[derive(Debug, Clone, Default)]
pub struct TransportedTokens {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl TransportedTokens {
    /// The access token prefers the bearer header over its cookie; the
    /// refresh token only travels as a cookie.
    pub fn from_parts(headers: &HeaderMap, jar: &CookieJar) -> Self {
        Self {
            access: bearer_token(headers).or_else(|| cookie_value(jar, ACCESS_COOKIE)),
            refresh: cookie_value(jar, REFRESH_COOKIE),
        }
    }
}

/// Available on routes behind [`require_auth`](crate::middleware::require_auth)
#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::Unauthorized)
    }
}

/// Client information (IP, user agent)
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| {
                parts
                    .headers
                    .get("X-Real-IP")
                    .and_then(|h| h.to_str().ok())
                    .map(String::from)
            });

        let user_agent = parts
            .headers
            .get("User-Agent")
            .and_then(|h| h.to_str().ok())
            .map(String::from);

        Ok(ClientInfo { ip, user_agent })
    }
}
