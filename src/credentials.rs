//! Credential handling
//!
//! Email normalization and validation, password bounds, and Argon2id hashing.
//! Plaintext passwords and hashes are never logged.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::Credentials;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use validator::Validate;

/// Trim and lowercase an email before storage or comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Credentials {
    /// Normalize the email and trim the password
    pub fn normalized(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            password: self.password.trim().to_string(),
        }
    }
}

/// Argon2id hasher with a fixed cost for the lifetime of the process
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    min_password_length: usize,
    max_password_length: usize,
}

impl CredentialHasher {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| AuthError::Config(format!("invalid argon2 parameters: {}", e)))?;

        Ok(Self {
            params,
            min_password_length: config.min_password_length,
            max_password_length: config.max_password_length,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password using Argon2id
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)?
            .to_string();

        Ok(hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::Internal)?;

        Ok(self
            .argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Check a new password against the configured length bounds
    pub fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::InvalidInput("Password is required".to_string()));
        }

        let len = password.chars().count();
        if len < self.min_password_length || len > self.max_password_length {
            return Err(AuthError::InvalidInput(format!(
                "Password must be {}-{} characters",
                self.min_password_length, self.max_password_length
            )));
        }

        Ok(())
    }

    /// Normalize and validate credentials submitted for registration
    pub fn check_new(&self, credentials: Credentials) -> Result<Credentials, AuthError> {
        let credentials = credentials.normalized();
        credentials.validate()?;
        self.validate_password(&credentials.password)?;
        Ok(credentials)
    }

    /// Normalize and validate credentials submitted for login
    ///
    /// The minimum length only applies to new passwords. A password over the
    /// maximum can never match, so it is refused before any hashing work.
    pub fn check_login(&self, credentials: Credentials) -> Result<Credentials, AuthError> {
        let credentials = credentials.normalized();
        credentials.validate()?;
        if credentials.password.is_empty() {
            return Err(AuthError::InvalidInput("Password is required".to_string()));
        }
        if credentials.password.chars().count() > self.max_password_length {
            tracing::debug!("Login rejected: password over maximum length");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(credentials)
    }
}
