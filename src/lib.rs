//! Folio Authentication
//!
//! Session and token authentication for the Folio articles backend:
//! - User registration and login
//! - Dual access/refresh JWTs signed under separate secrets
//! - Session entries in Redis as the revocation source of truth
//! - Refresh token rotation
//! - Logout of one session or every session of a user
//! - Argon2id password hashing
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_SECRET` - Access token signing secret (required, min 32 chars)
//! - `JWT_REFRESH_SECRET` - Refresh token signing secret (required, min 32 chars, distinct)
//! - `ACCESS_TOKEN_MAX_AGE` - Access token lifetime in seconds (default: 900)
//! - `REFRESH_TOKEN_MAX_AGE` - Refresh token lifetime in seconds (default: 604800)
//! - `SESSION_STORE_TIMEOUT_MS` - Bound on every single-key session store call (default: 500)
//! - `SESSION_STORE_SCAN_TIMEOUT_MS` - Bound on a whole logout-all scan (default: 10000)
//! - `DATABASE_URL` - PostgreSQL connection string (required by the server)
//! - `REDIS_URL` - Redis connection string (default: "redis://127.0.0.1:6379")
//!
//! # Usage
//!
//! ```rust,ignore
//! use folio_auth::{app, AuthConfig, AuthService, PgUserRepository, RedisSessionStore};
//!
//! let config = AuthConfig::from_env()?;
//! let users = Arc::new(PgUserRepository::new(pool));
//! let sessions = Arc::new(RedisSessionStore::connect(&redis_url).await?);
//!
//! let auth = Arc::new(AuthService::new(config, users, sessions)?);
//! axum::serve(listener, app(auth)).await?;
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod service;
pub mod session;
pub mod token;

// Re-export commonly used types
pub use config::{AuthConfig, ServerConfig};
pub use error::AuthError;
pub use extractors::{ClientInfo, TransportedTokens};
pub use handlers::AuthState;
pub use models::*;
pub use repository::{InMemoryUserRepository, PgUserRepository, UserRepository};
pub use service::AuthService;
pub use session::{InMemorySessionStore, RedisSessionStore, SessionStore, StoreError};

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create authentication and user routes, relative to the API root
pub fn create_routes(auth_service: Arc<AuthService>) -> Router {
    handlers::create_routes(auth_service)
}

/// Full application router: `/health` plus every route under `/api`
pub fn app(auth_service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", create_routes(auth_service))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
