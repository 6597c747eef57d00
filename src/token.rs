//! Token issuance and validation
//!
//! Access and refresh tokens are HS256 JWTs carrying `{id, user_id, exp}`,
//! each signed with its own secret. Issuing a pair also writes one session
//! entry per token id; a pair is only handed out once both entries are
//! committed.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{TokenClaims, TokenKind, TokenPair};
use crate::session::{session_key, SessionStore};

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;
use uuid::Uuid;

/// Mints token pairs and records their session entries
pub struct TokenIssuer {
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    access_max_age: i64,
    refresh_max_age: i64,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            refresh_key: EncodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            access_max_age: config.access_token_max_age,
            refresh_max_age: config.refresh_token_max_age,
        }
    }

    /// Sign claims with the secret belonging to `kind`
    pub fn sign(&self, claims: &TokenClaims, kind: TokenKind) -> Result<String, AuthError> {
        let key = match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        };

        encode(&Header::new(Algorithm::HS256), claims, key).map_err(|e| {
            tracing::error!(kind = %kind, "Token signing failed: {:?}", e);
            AuthError::Internal
        })
    }

    /// Mint a fresh pair for `user_id` and record both session entries
    pub async fn issue(
        &self,
        store: &dyn SessionStore,
        user_id: Uuid,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now().timestamp();

        let access = TokenClaims {
            id: Uuid::new_v4(),
            user_id,
            exp: expires_at(now, self.access_max_age)?,
        };
        let refresh = TokenClaims {
            id: Uuid::new_v4(),
            user_id,
            exp: expires_at(now, self.refresh_max_age)?,
        };

        let access_token = self.sign(&access, TokenKind::Access)?;
        let refresh_token = self.sign(&refresh, TokenKind::Refresh)?;

        record_session(store, &access).await?;
        if let Err(err) = record_session(store, &refresh).await {
            // Never leave half a pair behind
            if let Err(cleanup) = store.delete(&[session_key(user_id, access.id)]).await {
                tracing::warn!(user_id = %user_id, "Failed to roll back access session entry: {}", cleanup);
            }
            return Err(err);
        }

        tracing::debug!(
            user_id = %user_id,
            access_id = %access.id,
            refresh_id = %refresh.id,
            "Token pair issued"
        );

        Ok(TokenPair {
            user_id,
            access_id: access.id,
            refresh_id: refresh.id,
            access_expires: access.exp,
            refresh_expires: refresh.exp,
            access_token,
            refresh_token,
        })
    }
}

fn expires_at(now: i64, max_age: i64) -> Result<i64, AuthError> {
    now.checked_add(max_age).ok_or_else(|| {
        tracing::error!(max_age, "Token lifetime overflows the expiry timestamp");
        AuthError::Internal
    })
}

/// Write the entry for one token, expiring exactly when the token does
async fn record_session(store: &dyn SessionStore, claims: &TokenClaims) -> Result<(), AuthError> {
    let remaining_ms = claims
        .exp
        .checked_mul(1000)
        .and_then(|exp_ms| exp_ms.checked_sub(Utc::now().timestamp_millis()))
        .unwrap_or(0);
    if remaining_ms <= 0 {
        tracing::error!(token_id = %claims.id, "Refusing to record an already expired token");
        return Err(AuthError::Internal);
    }

    store
        .set(
            &session_key(claims.user_id, claims.id),
            &claims.user_id.to_string(),
            Duration::from_millis(remaining_ms as u64),
        )
        .await?;

    Ok(())
}

/// Verifies signature, algorithm and expiry of presented tokens
pub struct TokenValidator {
    access_key: DecodingKey,
    refresh_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            access_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            refresh_key: DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            validation,
        }
    }

    /// Validate a token of the given kind and return its claims.
    ///
    /// Every failure is `Unauthorized`; the reason only goes to the log. A
    /// valid token still needs a live session entry to authenticate.
    pub fn validate(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, AuthError> {
        if token.is_empty() {
            tracing::debug!(kind = %kind, "Empty token");
            return Err(AuthError::Unauthorized);
        }

        let key = match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        };

        let claims = decode::<TokenClaims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(kind = %kind, "Invalid {} token: {:?}", kind, e);
                AuthError::Unauthorized
            })?;

        // jsonwebtoken still accepts a token during its exp second
        if claims.exp <= Utc::now().timestamp() {
            tracing::debug!(kind = %kind, token_id = %claims.id, "Expired {} token", kind);
            return Err(AuthError::Unauthorized);
        }

        Ok(claims)
    }
}
