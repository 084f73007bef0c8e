//! Password hashing
//!
//! Salted SHA-256 credentials stored as `salt:digest` hex pairs.
//! Verification compares digests in constant time.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Hash a plaintext password with a fresh random salt.
pub(crate) fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    format!("{}:{}", hex::encode(salt), hex::encode(digest))
}

/// Check a plaintext password against a stored `salt:digest` hash.
pub(crate) fn check_password(stored_hash: &str, password: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored_hash.split_once(':') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(stored_digest) = hex::decode(digest_hex) else {
        return false;
    };

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    constant_time_eq(&digest, &stored_digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_check_round_trip() {
        let hash = hash_password("hunter2");
        assert!(check_password(&hash, "hunter2"));
        assert!(!check_password(&hash, "hunter3"));
    }

    #[test]
    fn test_hash_is_salted() {
        // Same password, different salts, different hashes
        let a = hash_password("hunter2");
        let b = hash_password("hunter2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_never_contains_plaintext() {
        let hash = hash_password("hunter2");
        assert!(!hash.contains("hunter2"));
        assert_ne!(hash, "hunter2");
    }

    #[test]
    fn test_check_rejects_malformed_hash() {
        assert!(!check_password("not-a-valid-hash", "hunter2"));
        assert!(!check_password("xx:yy", "hunter2"));
        assert!(!check_password("", "hunter2"));
    }
}
