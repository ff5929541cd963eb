use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{CoreError, CoreResult};

/// Argon2id with the crate's default parameters.
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn hash(password: &str) -> CoreResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CoreError::InternalError(format!("password hashing failed: {}", e)))
    }

    /// `Ok(false)` on a mismatch; `Err` only when `hash` is not a PHC string.
    pub fn verify(password: &str, hash: &str) -> CoreResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| CoreError::InternalError(format!("stored password hash unreadable: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CoreError::InternalError(format!("password verification failed: {}", e))),
        }
    }
}
