//! Authentication Service
//!
//! Composes credentials, token issuance/validation and the session store into
//! the operations exposed to handlers: register, login, authorize, refresh,
//! logout, logout-all, plus the owner-checked user operations.

use crate::config::AuthConfig;
use crate::credentials::{normalize_email, CredentialHasher};
use crate::error::AuthError;
use crate::models::*;
use crate::repository::UserRepository;
use crate::session::{session_key, user_cache_key, user_sessions_pattern, SessionStore, TimedStore};
use crate::token::{TokenIssuer, TokenValidator};

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionStore>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    hasher: CredentialHasher,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new authentication service.
    ///
    /// Every session store call is bounded by the configured timeout;
    /// pattern deletion gets the longer bulk timeout.
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, AuthError> {
        let hasher = CredentialHasher::new(&config)?;
        let sessions: Arc<dyn SessionStore> = Arc::new(TimedStore::new(
            sessions,
            config.store_timeout(),
            config.bulk_delete_timeout(),
        ));

        Ok(Self {
            users,
            sessions,
            issuer: TokenIssuer::new(&config),
            validator: TokenValidator::new(&config),
            hasher,
            config,
        })
    }

    /// Get reference to config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ============================================
    // Registration / Login
    // ============================================

    /// Register a new user and sign them in
    pub async fn register(&self, credentials: Credentials) -> Result<AuthUser, AuthError> {
        let credentials = self.hasher.check_new(credentials)?;
        let password_hash = self.hasher.hash_password(&credentials.password)?;

        let user = self.users.create(&credentials.email, &password_hash).await?;
        tracing::info!(user_id = %user.id, "User registered");

        let user = user.sanitize();
        self.cache_user(&user).await;
        self.sign_in(user).await
    }

    /// Check credentials and mint a fresh token pair
    pub async fn login(&self, credentials: Credentials) -> Result<AuthUser, AuthError> {
        let credentials = self.hasher.check_login(credentials)?;

        let user = self
            .users
            .find_by_email(&credentials.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .hasher
            .verify_password(&credentials.password, &user.password_hash)?
        {
            tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.sign_in(user.sanitize()).await
    }

    async fn sign_in(&self, user: UserResponse) -> Result<AuthUser, AuthError> {
        let pair = self.issuer.issue(self.sessions.as_ref(), user.id).await?;
        Ok(AuthUser::new(user, pair, self.config.access_token_max_age))
    }

    // ============================================
    // Request Authorization
    // ============================================

    /// Authorize a request from its transported tokens.
    ///
    /// Both tokens are required. Any failure, including an unreachable
    /// session store, is returned as `Unauthorized`.
    pub async fn authorize(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        self.check_tokens(access_token, refresh_token)
            .await
            .map_err(|e| {
                tracing::debug!("Authorization denied: {}", e);
                e.into_denial()
            })
    }

    async fn check_tokens(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        let access_token = access_token.ok_or(AuthError::Unauthorized)?;
        let refresh_token = refresh_token.ok_or(AuthError::Unauthorized)?;

        let access = self.validator.validate(access_token, TokenKind::Access)?;
        let refresh = self.validator.validate(refresh_token, TokenKind::Refresh)?;

        if access.user_id != refresh.user_id {
            tracing::warn!(
                access_user = %access.user_id,
                refresh_user = %refresh.user_id,
                "Token pair belongs to different users"
            );
            return Err(AuthError::Forbidden);
        }

        self.check_session(access.user_id, access.id).await?;
        self.check_session(access.user_id, refresh.id).await?;

        Ok(AuthContext {
            user_id: access.user_id,
            access_id: access.id,
            refresh_id: refresh.id,
        })
    }

    /// The entry must exist and name `user_id` as its owner
    async fn check_session(&self, user_id: Uuid, token_id: Uuid) -> Result<(), AuthError> {
        let owner = self
            .sessions
            .get(&session_key(user_id, token_id))
            .await?
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, token_id = %token_id, "Session entry missing");
                AuthError::Unauthorized
            })?;

        if owner != user_id.to_string() {
            tracing::warn!(user_id = %user_id, token_id = %token_id, "Session entry owned by another user");
            return Err(AuthError::Forbidden);
        }

        Ok(())
    }

    // ============================================
    // Token Refresh
    // ============================================

    /// Consume a refresh token and mint a new pair.
    ///
    /// The old refresh entry is deleted; the old access entry is left to
    /// expire on its own.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<AuthUser, AuthError> {
        let (claims, user) = self
            .check_refresh(refresh_token)
            .await
            .map_err(|e| {
                tracing::debug!("Refresh denied: {}", e);
                e.into_denial()
            })?;

        let pair = self.issuer.issue(self.sessions.as_ref(), user.id).await?;

        let consumed = self
            .sessions
            .delete(&[session_key(claims.user_id, claims.id)])
            .await;

        match consumed {
            Ok(1) => {}
            Ok(_) => {
                // Another refresh consumed the same token first
                tracing::warn!(user_id = %user.id, refresh_id = %claims.id, "Refresh token already consumed");
                self.revoke_pair(&pair).await;
                return Err(AuthError::Unauthorized);
            }
            Err(e) => {
                self.revoke_pair(&pair).await;
                return Err(e.into());
            }
        }

        tracing::info!(user_id = %user.id, "Token pair rotated");
        Ok(AuthUser::new(
            user.sanitize(),
            pair,
            self.config.access_token_max_age,
        ))
    }

    async fn check_refresh(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<(TokenClaims, User), AuthError> {
        let refresh_token = refresh_token.ok_or(AuthError::Unauthorized)?;
        let claims = self.validator.validate(refresh_token, TokenKind::Refresh)?;

        self.check_session(claims.user_id, claims.id).await?;

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        Ok((claims, user))
    }

    async fn revoke_pair(&self, pair: &TokenPair) {
        let keys = [
            session_key(pair.user_id, pair.access_id),
            session_key(pair.user_id, pair.refresh_id),
        ];
        if let Err(e) = self.sessions.delete(&keys).await {
            tracing::warn!(user_id = %pair.user_id, "Failed to revoke unused pair: {}", e);
        }
    }

    // ============================================
    // Logout
    // ============================================

    /// Delete the two session entries bound to the request
    pub async fn logout(&self, ctx: &AuthContext) -> Result<(), AuthError> {
        let deleted = self
            .sessions
            .delete(&[
                session_key(ctx.user_id, ctx.access_id),
                session_key(ctx.user_id, ctx.refresh_id),
            ])
            .await?;

        tracing::info!(user_id = %ctx.user_id, deleted, "User logged out");
        Ok(())
    }

    /// Revoke every session of a user; returns once all entries are gone
    pub async fn logout_all(&self, user_id: Uuid) -> Result<usize, AuthError> {
        let deleted = self
            .sessions
            .delete_by_prefix(&user_sessions_pattern(user_id))
            .await?;

        tracing::info!(user_id = %user_id, deleted, "All sessions revoked");
        Ok(deleted)
    }

    // ============================================
    // Users
    // ============================================

    /// List all users
    pub async fn list_users(&self) -> Result<UsersList, AuthError> {
        let users: Vec<UserResponse> = self
            .users
            .find_all()
            .await?
            .into_iter()
            .map(User::sanitize)
            .collect();

        Ok(UsersList {
            total_count: users.len(),
            users,
        })
    }

    /// Get a user, reading through the profile cache
    pub async fn get_user(&self, id: Uuid) -> Result<UserResponse, AuthError> {
        if let Some(user) = self.cached_user(id).await {
            return Ok(user);
        }

        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::NotFound)?
            .sanitize();

        self.cache_user(&user).await;
        Ok(user)
    }

    /// Update the caller's own profile
    pub async fn update_user(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<UserResponse, AuthError> {
        ensure_owner(ctx, id)?;

        let req = UpdateUserRequest {
            email: normalize_email(&req.email),
            password: req
                .password
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        };
        req.validate()?;

        let password_hash = match &req.password {
            Some(password) => {
                self.hasher.validate_password(password)?;
                Some(self.hasher.hash_password(password)?)
            }
            None => None,
        };

        let user = self
            .users
            .update(id, &req.email, password_hash.as_deref())
            .await?
            .ok_or(AuthError::NotFound)?
            .sanitize();

        tracing::info!(user_id = %id, "User updated");
        self.cache_user(&user).await;
        Ok(user)
    }

    /// Delete the caller's own account and every session it holds
    pub async fn delete_user(&self, ctx: &AuthContext, id: Uuid) -> Result<(), AuthError> {
        ensure_owner(ctx, id)?;
        self.users.find_by_id(id).await?.ok_or(AuthError::NotFound)?;

        // Sessions go first so a store failure leaves the account intact
        self.logout_all(id).await?;

        if !self.users.delete(id).await? {
            return Err(AuthError::NotFound);
        }

        if let Err(e) = self.sessions.delete(&[user_cache_key(id)]).await {
            tracing::warn!(user_id = %id, "Failed to evict cached user: {}", e);
        }

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    // ============================================
    // Profile Cache
    // ============================================

    async fn cached_user(&self, id: Uuid) -> Option<UserResponse> {
        match self.sessions.get(&user_cache_key(id)).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(user_id = %id, "Discarding unreadable cached user: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user_id = %id, "User cache unavailable: {}", e);
                None
            }
        }
    }

    async fn cache_user(&self, user: &UserResponse) {
        let json = match serde_json::to_string(user) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(user_id = %user.id, "Failed to serialize user for cache: {}", e);
                return;
            }
        };

        let ttl = Duration::from_secs(self.config.user_cache_ttl);
        if let Err(e) = self.sessions.set(&user_cache_key(user.id), &json, ttl).await {
            tracing::warn!(user_id = %user.id, "Failed to cache user: {}", e);
        }
    }
}

fn ensure_owner(ctx: &AuthContext, id: Uuid) -> Result<(), AuthError> {
    if ctx.user_id != id {
        tracing::warn!(user_id = %ctx.user_id, target = %id, "Rejected change to another user");
        return Err(AuthError::Forbidden);
    }
    Ok(())
}
