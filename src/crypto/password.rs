use argon2::Argon2;
use rand::Rng;

use crate::error::AppError;

pub const SALT_LEN: usize = 32;
pub const HASH_LEN: usize = 32;

/// Fresh random salt for a new account.
pub fn generate_salt() -> [u8; SALT_LEN] {
    rand::thread_rng().gen()
}

/// Argon2id over the password with the per-user salt.
pub fn hash_password(password: &str, salt: &[u8]) -> Result<[u8; HASH_LEN], AppError> {
    let mut hash = [0u8; HASH_LEN];

    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut hash)
        .map_err(|e| AppError::Crypto(format!("Password hashing failed: {}", e)))?;

    Ok(hash)
}

/// Stored hashes come back from the database as plain byte vectors; a hash of
/// the wrong length never verifies.
pub fn verify_password(password: &str, stored_hash: &[u8], salt: &[u8]) -> Result<bool, AppError> {
    if stored_hash.len() != HASH_LEN {
        return Ok(false);
    }
    let computed = hash_password(password, salt)?;
    Ok(computed.as_slice() == stored_hash)
}
