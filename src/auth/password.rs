use anyhow::{anyhow, Context};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::task;
use tracing::error;

/// Hashes a user password into an argon2id PHC string on the blocking pool.
pub async fn hash_password(plain: String) -> anyhow::Result<String> {
    task::spawn_blocking(move || hash_blocking(&plain))
        .await
        .context("password hashing task failed")?
}

/// Checks `plain` against a stored PHC string. A mismatch is `Ok(false)`;
/// an error means the stored value is not a PHC string at all.
pub async fn verify_password(plain: String, stored: String) -> anyhow::Result<bool> {
    task::spawn_blocking(move || verify_blocking(&plain, &stored))
        .await
        .context("password verification task failed")?
}

fn hash_blocking(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            anyhow!("hash password: {e}")
        })
}

fn verify_blocking(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let phc = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password is not a PHC string");
        anyhow!("parse stored password hash: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &phc)
        .is_ok())
}
