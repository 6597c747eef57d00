//! Authentication Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::error::AuthError;
use std::env;
use std::time::Duration;

/// Longest accepted token lifetime in seconds (one year)
pub const MAX_TOKEN_AGE: i64 = 365 * 24 * 60 * 60;

/// Authentication configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for signing access tokens (from JWT_SECRET env var)
    pub jwt_secret: String,

    /// Secret for signing refresh tokens (from JWT_REFRESH_SECRET env var)
    pub jwt_refresh_secret: String,

    /// Access token lifetime and cookie max-age in seconds (from ACCESS_TOKEN_MAX_AGE env var)
    pub access_token_max_age: i64,

    /// Refresh token lifetime and cookie max-age in seconds (from REFRESH_TOKEN_MAX_AGE env var)
    pub refresh_token_max_age: i64,

    /// Mark token cookies `Secure` (from COOKIE_SECURE env var)
    pub cookie_secure: bool,

    /// Mark token cookies `HttpOnly` (from COOKIE_HTTP_ONLY env var)
    pub cookie_http_only: bool,

    /// Upper bound on a single session store round-trip in milliseconds
    /// (from SESSION_STORE_TIMEOUT_MS env var)
    pub store_timeout_ms: u64,

    /// Upper bound on a whole pattern deletion (logout-all) in milliseconds
    /// (from SESSION_STORE_SCAN_TIMEOUT_MS env var)
    pub bulk_delete_timeout_ms: u64,

    /// Minimum password length (from MIN_PASSWORD_LENGTH env var)
    pub min_password_length: usize,

    /// Maximum password length (from MAX_PASSWORD_LENGTH env var)
    pub max_password_length: usize,

    /// Cached user profile TTL in seconds (from USER_CACHE_TTL env var)
    pub user_cache_ttl: u64,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AuthError> {
        Ok(Self {
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| AuthError::Config("JWT_SECRET must be set".to_string()))?,

            jwt_refresh_secret: env::var("JWT_REFRESH_SECRET")
                .map_err(|_| AuthError::Config("JWT_REFRESH_SECRET must be set".to_string()))?,

            access_token_max_age: env::var("ACCESS_TOKEN_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900), // 15 minutes

            refresh_token_max_age: env::var("REFRESH_TOKEN_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(604800), // 7 days

            cookie_secure: env::var("COOKIE_SECURE")
                .ok()
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),

            cookie_http_only: env::var("COOKIE_HTTP_ONLY")
                .ok()
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),

            store_timeout_ms: env::var("SESSION_STORE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),

            bulk_delete_timeout_ms: env::var("SESSION_STORE_SCAN_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),

            min_password_length: env::var("MIN_PASSWORD_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6),

            max_password_length: env::var("MAX_PASSWORD_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(250),

            user_cache_ttl: env::var("USER_CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),

            argon2_memory_cost: env::var("ARGON2_MEMORY_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(19456), // 19 MiB

            argon2_time_cost: env::var("ARGON2_TIME_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),

            argon2_parallelism: env::var("ARGON2_PARALLELISM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.len() < 32 {
            return Err(AuthError::Config(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.jwt_refresh_secret.len() < 32 {
            return Err(AuthError::Config(
                "JWT_REFRESH_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.jwt_secret == self.jwt_refresh_secret {
            return Err(AuthError::Config(
                "JWT_SECRET and JWT_REFRESH_SECRET must differ".to_string(),
            ));
        }

        if self.access_token_max_age <= 0 {
            return Err(AuthError::Config(
                "ACCESS_TOKEN_MAX_AGE must be positive".to_string(),
            ));
        }

        if self.refresh_token_max_age <= self.access_token_max_age {
            return Err(AuthError::Config(
                "REFRESH_TOKEN_MAX_AGE must be greater than ACCESS_TOKEN_MAX_AGE".to_string(),
            ));
        }

        if self.refresh_token_max_age > MAX_TOKEN_AGE {
            return Err(AuthError::Config(format!(
                "REFRESH_TOKEN_MAX_AGE must not exceed {} seconds",
                MAX_TOKEN_AGE
            )));
        }

        if self.store_timeout_ms == 0 {
            return Err(AuthError::Config(
                "SESSION_STORE_TIMEOUT_MS must be positive".to_string(),
            ));
        }

        if self.bulk_delete_timeout_ms < self.store_timeout_ms {
            return Err(AuthError::Config(
                "SESSION_STORE_SCAN_TIMEOUT_MS must be at least SESSION_STORE_TIMEOUT_MS"
                    .to_string(),
            ));
        }

        if self.min_password_length == 0 || self.max_password_length < self.min_password_length {
            return Err(AuthError::Config(
                "password length bounds are inconsistent".to_string(),
            ));
        }

        Ok(())
    }

    /// Session store round-trip bound
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Bound on a whole pattern deletion
    pub fn bulk_delete_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_delete_timeout_ms)
    }
}

/// Process-level settings for the server binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL connection string (from DATABASE_URL env var)
    pub database_url: String,

    /// Pool size (from DATABASE_MAX_CONNECTIONS env var)
    pub database_max_connections: u32,

    /// Redis connection string (from REDIS_URL env var)
    pub redis_url: String,

    /// Listen address (from BIND_ADDR env var)
    pub bind_addr: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AuthError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AuthError::Config("DATABASE_URL must be set".to_string()))?,

            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}
