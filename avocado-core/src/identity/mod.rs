//! Credential primitives: password hashing, one-time codes, recovery codes
//! and opaque tokens. Nothing here touches storage.

pub mod backup_codes;
pub mod password;
pub mod token;
pub mod totp;

pub use password::PasswordHasher;
