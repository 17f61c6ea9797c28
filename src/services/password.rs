//! Credential hashing built on Argon2id.

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use crate::config::SecurityConfig;

/// Hash a password using Argon2id with cost parameters from config.
pub fn hash(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Verify a plaintext against a stored hash. A mismatch and a malformed
/// stored hash both come back as false, never as a panic.
#[must_use]
pub fn verify(stored_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash in a blocking task: Argon2 is CPU-intensive and would stall the
/// async runtime if run directly.
pub async fn hash_blocking(password: &str, config: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let config = config.clone();

    task::spawn_blocking(move || hash(&password, &config))
        .await
        .context("Password hashing task panicked")?
}

/// Verify in a blocking task, same reasoning as [`hash_blocking`].
pub async fn verify_blocking(stored_hash: String, password: String) -> Result<bool> {
    task::spawn_blocking(move || verify(&stored_hash, &password))
        .await
        .context("Password verification task panicked")
}
