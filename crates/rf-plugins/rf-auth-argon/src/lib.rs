//! # rf-auth-argon
//!
//! Argon2id implementation of `AuthProvider`.
//! Handles password hashing, hash verification and session token generation.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use base64::Engine;
use rf_core::error::{AppError, Result};
use rf_core::traits::AuthProvider;
use tracing::error;

/// Bytes of OS randomness behind every session token (256 bits).
const SESSION_TOKEN_BYTES: usize = 32;
const SALT_BYTES: usize = 16;

#[derive(Clone)]
pub struct Argon2AuthProvider {
    params: Params,
}

impl Argon2AuthProvider {
    /// Uses the argon2 crate's recommended parameters.
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Explicit cost parameters, e.g. from settings or for fast tests.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AppError::ValidationError(format!("argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2AuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes).map_err(|e| {
        error!(error = %e, "OS randomness unavailable");
        AppError::storage("generate random bytes")
    })?;
    Ok(bytes)
}

#[async_trait]
impl AuthProvider for Argon2AuthProvider {
    /// Hashes on the blocking pool; Argon2 is CPU- and memory-bound by design.
    async fn hash_password(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::encode_b64(&random_bytes::<SALT_BYTES>()?).map_err(|e| {
            error!(error = %e, "salt encoding failed");
            AppError::storage("hash password")
        })?;
        let hasher = self.hasher();
        let plaintext = plaintext.to_owned();

        tokio::task::spawn_blocking(move || {
            hasher
                .hash_password(plaintext.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| {
            error!(error = %e, "hashing task failed");
            AppError::storage("hash password")
        })?
        .map_err(|e| {
            error!(error = %e, "argon2 hashing failed");
            AppError::storage("hash password")
        })
    }

    /// Verifies a plaintext against a stored PHC string.
    /// Cost parameters are read from the hash itself, not from `self`.
    async fn verify_password(&self, plaintext: &str, hash: &str) -> bool {
        let plaintext = plaintext.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || {
            let parsed_hash = match PasswordHash::new(&hash) {
                Ok(p) => p,
                Err(_) => return false,
            };
            Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed_hash)
                .is_ok()
        })
        .await
        .unwrap_or(false)
    }

    fn generate_session_token(&self) -> Result<String> {
        let bytes = random_bytes::<SESSION_TOKEN_BYTES>()?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }
}
