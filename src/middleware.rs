//! Authentication Middleware
//!
//! Runs the full token and session check before protected handlers.

use crate::error::AuthError;
use crate::extractors::TransportedTokens;
use crate::handlers::AuthState;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

/// Require an authenticated session
///
/// Validates both tokens and their session entries, then stores the
/// resulting [`AuthContext`](crate::models::AuthContext) in request
/// extensions for handlers.
pub async fn require_auth(
    State(auth): State<AuthState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let tokens = TransportedTokens::from_parts(req.headers(), &jar);

    let ctx = auth
        .authorize(tokens.access.as_deref(), tokens.refresh.as_deref())
        .await?;

    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
