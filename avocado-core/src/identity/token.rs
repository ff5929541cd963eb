use rand::RngCore;
use sha2::{Digest, Sha256};

/// 32 random bytes, hex encoded. Used for password reset links.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Tokens are looked up by this hash, never stored in the clear.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
