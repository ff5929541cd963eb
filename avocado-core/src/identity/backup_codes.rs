use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

pub const BACKUP_CODE_COUNT: usize = 8;
const CODE_LENGTH: usize = 8;

/// Fresh plaintext codes. They are shown to the user once; only
/// [`hash_backup_code`] output is stored.
pub fn generate_backup_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..BACKUP_CODE_COUNT)
        .map(|_| {
            (0..CODE_LENGTH)
                .map(|_| rng.sample(Alphanumeric) as char)
                .collect::<String>()
                .to_ascii_uppercase()
        })
        .collect()
}

/// Users may type codes in lower case or with a separator.
pub fn normalize_backup_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// SHA-256 hex of the normalized code. Deterministic, so the store can
/// remove a used code with one `array_remove`.
pub fn hash_backup_code(code: &str) -> String {
    hex::encode(Sha256::digest(normalize_backup_code(code).as_bytes()))
}
