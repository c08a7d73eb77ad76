//! Argon2 password hashing.
//!
//! Hashing and verification are CPU-bound, so both run on the blocking pool.
//! The cost comes from [`argon2::Params`] chosen at startup.

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use tracing::{debug, error};

use super::auth::AuthError;

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Cheapest valid parameters. For tests only.
    pub fn fast_insecure() -> Self {
        // 8 KiB, one pass, one lane: the floor argon2 accepts.
        let params = Params::new(8, 1, 1, None).unwrap_or_default();
        Self::new(params)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let argon2 = self.argon2();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| {
                    error!(error = %e, "Argon2 password hashing failed");
                    AuthError::PasswordHash(e.to_string())
                })
        })
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
    }

    /// `Ok(false)` on a mismatch; `Err` only when the stored hash is unusable.
    pub async fn verify(&self, stored_hash: &str, password: &str) -> Result<bool, AuthError> {
        let argon2 = self.argon2();
        let stored_hash = stored_hash.to_owned();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored_hash).map_err(|e| {
                error!(error = %e, "Failed to parse stored password hash");
                AuthError::PasswordHash(e.to_string())
            })?;
            match argon2.verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => {
                    debug!("Password mismatch");
                    Ok(false)
                }
                Err(e) => Err(AuthError::PasswordHash(e.to_string())),
            }
        })
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}
