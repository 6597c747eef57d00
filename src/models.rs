//! Authentication Models
//!
//! Data structures for authentication requests, responses, and database entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

// ============================================
// Database Entities
// ============================================

/// User entity from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Drop the password hash, keeping only what may leave the service
    pub fn sanitize(self) -> UserResponse {
        UserResponse::from(self)
    }
}

// ============================================
// Request DTOs
// ============================================

/// Login and registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: String,

    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Profile update request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: String,

    /// New password; the stored hash is kept when absent or blank
    #[serde(default)]
    pub password: Option<String>,
}

// ============================================
// Response DTOs
// ============================================

/// User response (public user data without the password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// All users
#[derive(Debug, Clone, Serialize)]
pub struct UsersList {
    pub total_count: usize,
    pub users: Vec<UserResponse>,
}

/// Authentication response with tokens
///
/// The token ids are kept for in-process callers and never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user: UserResponse,
    pub token_type: String,
    pub expires_in: i64,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip)]
    pub access_id: Uuid,
    #[serde(skip)]
    pub refresh_id: Uuid,
}

impl AuthUser {
    pub fn new(user: UserResponse, pair: TokenPair, expires_in: i64) -> Self {
        Self {
            user,
            token_type: "Bearer".to_string(),
            expires_in,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_id: pair.access_id,
            refresh_id: pair.refresh_id,
        }
    }
}

// ============================================
// Tokens
// ============================================

/// Which half of a token pair a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JWT claims shared by access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token ID (session entry key component)
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Expiration timestamp (unix seconds)
    pub exp: i64,
}

/// An access/refresh pair minted together for one user
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub user_id: Uuid,
    pub access_id: Uuid,
    pub refresh_id: Uuid,
    /// Access expiry (unix seconds)
    pub access_expires: i64,
    /// Refresh expiry (unix seconds)
    pub refresh_expires: i64,
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity bound to a request once both tokens and both session entries check out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub access_id: Uuid,
    pub refresh_id: Uuid,
}
