//! Authentication HTTP Handlers
//!
//! REST API endpoints for authentication and user operations.

use crate::error::AuthError;
use crate::extractors::{ClientInfo, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::middleware;
use crate::models::*;
use crate::service::AuthService;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use uuid::Uuid;

/// Shared auth service state
pub type AuthState = Arc<AuthService>;

// ============================================
// Route Builder
// ============================================

/// Create authentication and user routes
pub fn create_routes(auth_service: Arc<AuthService>) -> Router {
    let auth_layer =
        axum_middleware::from_fn_with_state(auth_service.clone(), middleware::require_auth);

    // Public routes (no authentication required)
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/users", get(list_users));

    // Protected routes (require both tokens and live sessions)
    let protected = Router::new()
        .route("/auth/me", post(me))
        .route("/auth/logout", post(logout))
        .route("/auth/logout/all", post(logout_all))
        .route_layer(auth_layer.clone());

    // Reading a profile is public, changing one is not
    let user = get(get_user).merge(
        put(update_user)
            .delete(delete_user)
            .route_layer(auth_layer),
    );

    Router::new()
        .merge(public)
        .merge(protected)
        .route("/users/:id", user)
        .with_state(auth_service)
}

// ============================================
// Cookies
// ============================================

fn token_cookie(
    name: &'static str,
    value: String,
    max_age: i64,
    auth: &AuthService,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(auth.config().cookie_http_only)
        .secure(auth.config().cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

fn with_token_cookies(jar: CookieJar, auth: &AuthService, user: &AuthUser) -> CookieJar {
    let config = auth.config();
    jar.add(token_cookie(
        ACCESS_COOKIE,
        user.access_token.clone(),
        config.access_token_max_age,
        auth,
    ))
    .add(token_cookie(
        REFRESH_COOKIE,
        user.refresh_token.clone(),
        config.refresh_token_max_age,
        auth,
    ))
}

fn without_token_cookies(jar: CookieJar, auth: &AuthService) -> CookieJar {
    jar.add(token_cookie(ACCESS_COOKIE, String::new(), 0, auth))
        .add(token_cookie(REFRESH_COOKIE, String::new(), 0, auth))
}

/// Malformed ids cannot name a user
fn parse_user_id(id: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(id).map_err(|_| AuthError::NotFound)
}

// ============================================
// Registration / Login
// ============================================

/// POST /auth/register
///
/// Register a new user account and sign it in
pub async fn register(
    State(auth): State<AuthState>,
    ClientInfo { ip, user_agent }: ClientInfo,
    jar: CookieJar,
    Json(req): Json<Credentials>,
) -> Result<impl IntoResponse, AuthError> {
    let user = auth.register(req).await?;

    tracing::info!(
        user_id = %user.user.id,
        ip = ?ip,
        user_agent = ?user_agent,
        "Registration completed"
    );

    let jar = with_token_cookies(jar, &auth, &user);
    Ok((StatusCode::CREATED, jar, Json(user)))
}

/// POST /auth/login
///
/// Authenticate user and return access/refresh tokens
pub async fn login(
    State(auth): State<AuthState>,
    ClientInfo { ip, user_agent }: ClientInfo,
    jar: CookieJar,
    Json(req): Json<Credentials>,
) -> Result<impl IntoResponse, AuthError> {
    let user = auth.login(req).await?;

    tracing::info!(
        user_id = %user.user.id,
        ip = ?ip,
        user_agent = ?user_agent,
        "Login completed"
    );

    let jar = with_token_cookies(jar, &auth, &user);
    Ok((jar, Json(user)))
}

// ============================================
// Token Refresh
// ============================================

/// POST /auth/refresh
///
/// Rotate the pair using the refresh token cookie
pub async fn refresh(
    State(auth): State<AuthState>,
    ClientInfo { ip, .. }: ClientInfo,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let refresh_token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    let user = auth.refresh(refresh_token.as_deref()).await?;
    tracing::debug!(user_id = %user.user.id, ip = ?ip, "Refresh completed");

    let jar = with_token_cookies(jar, &auth, &user);
    Ok((jar, Json(user)))
}

// ============================================
// Session
// ============================================

/// POST /auth/me
///
/// Get the signed-in user
pub async fn me(
    State(auth): State<AuthState>,
    ctx: AuthContext,
) -> Result<Json<UserResponse>, AuthError> {
    let user = auth.get_user(ctx.user_id).await?;
    Ok(Json(user))
}

/// POST /auth/logout
///
/// Revoke the current session
pub async fn logout(
    State(auth): State<AuthState>,
    ctx: AuthContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    auth.logout(&ctx).await?;
    Ok((StatusCode::NO_CONTENT, without_token_cookies(jar, &auth)))
}

/// POST /auth/logout/all
///
/// Revoke every session of the signed-in user
pub async fn logout_all(
    State(auth): State<AuthState>,
    ctx: AuthContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    auth.logout_all(ctx.user_id).await?;
    Ok((StatusCode::NO_CONTENT, without_token_cookies(jar, &auth)))
}

// ============================================
// Users
// ============================================

/// GET /users
pub async fn list_users(State(auth): State<AuthState>) -> Result<Json<UsersList>, AuthError> {
    Ok(Json(auth.list_users().await?))
}

/// GET /users/:id
pub async fn get_user(
    State(auth): State<AuthState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AuthError> {
    let id = parse_user_id(&id)?;
    Ok(Json(auth.get_user(id).await?))
}

/// PUT /users/:id
///
/// Update the signed-in user's own profile
pub async fn update_user(
    State(auth): State<AuthState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let id = parse_user_id(&id)?;
    Ok(Json(auth.update_user(&ctx, id, req).await?))
}

/// DELETE /users/:id
///
/// Delete the signed-in user's account, revoking all of its sessions
pub async fn delete_user(
    State(auth): State<AuthState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let id = parse_user_id(&id)?;
    auth.delete_user(&ctx, id).await?;
    Ok((StatusCode::NO_CONTENT, without_token_cookies(jar, &auth)))
}
