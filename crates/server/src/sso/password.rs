//! Random secrets and password hashing for SSO-provisioned accounts.
//!
//! Uses Argon2id for password hashing.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate `len` characters drawn uniformly from `[A-Za-z0-9]`.
pub fn random_code(len: usize) -> String {
    // Largest multiple of 62 below 256; bytes above it would bias the result.
    const LIMIT: u8 = 248;

    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];
    while out.len() < len {
        getrandom::fill(&mut buf).expect("Failed to generate random bytes");
        for &b in buf.iter().filter(|&&b| b < LIMIT) {
            if out.len() == len {
                break;
            }
            out.push(ALPHANUMERIC[(b % 62) as usize] as char);
        }
    }
    out
}

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Hashed random password for an account that only ever logs in through a provider.
pub fn unusable_password_hash() -> Result<String, argon2::password_hash::Error> {
    hash_password(&random_code(16))
}
