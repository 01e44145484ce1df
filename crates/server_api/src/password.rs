use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const SEPARATOR: char = '$';

/// Salted SHA-256 digest stored as `salt$base64(digest)`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = digest(&salt, password);
    format!("{salt}{SEPARATOR}{digest}")
}

pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    let Some((salt, expected)) = stored_hash.split_once(SEPARATOR) else {
        return false;
    };
    digest(salt, candidate) == expected
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}
