use anyhow::{Result, anyhow};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use rand_core::{OsRng, RngCore};

use crate::constant_time_eq;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// Argon2id cost: 64 MiB, 3 passes, 2 lanes.
const MEMORY_KIB: u32 = 64 * 1024;
const ITERATIONS: u32 = 3;
const PARALLELISM: u32 = 2;

/// Salt and derived key, both base64 (standard alphabet, unpadded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPassword {
    pub salt: String,
    pub hash: String,
}

/// Hash a plaintext with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<StoredPassword> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(plain, &salt)?;

    Ok(StoredPassword {
        salt: B64.encode(salt),
        hash: B64.encode(key),
    })
}

/// Check a plaintext against a stored salt and hash.
/// Anything that fails to decode or derive counts as a mismatch.
pub fn verify_password(plain: &str, salt: &str, hash: &str) -> bool {
    let Ok(salt) = B64.decode(salt) else {
        return false;
    };
    let Ok(expected) = B64.decode(hash) else {
        return false;
    };

    match derive_key(plain, &salt) {
        Ok(key) => constant_time_eq(&key, &expected),
        Err(_) => false,
    }
}

/// Well-formed salt and hash that no password matches.
const DUMMY_SALT: &str = "AAAAAAAAAAAAAAAAAAAAAA";
const DUMMY_HASH: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Run a full verification that always fails. Used when there is no stored
/// password to check against, so the miss takes as long as a real check.
pub fn verify_against_dummy(plain: &str) -> bool {
    verify_password(plain, DUMMY_SALT, DUMMY_HASH)
}

fn derive_key(plain: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, PARALLELISM, Some(KEY_LEN))
        .map_err(|e| anyhow!("Invalid argon2 parameters: {}", e))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(plain.as_bytes(), salt, &mut key)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let stored = hash_password("my cabbages").unwrap();

        assert!(verify_password("my cabbages", &stored.salt, &stored.hash));
        assert!(!verify_password("definitely not valid", &stored.salt, &stored.hash));
    }

    #[test]
    fn storage_encoding_is_unpadded_base64() {
        let stored = hash_password("correct horse").unwrap();

        assert_eq!(B64.decode(&stored.salt).unwrap().len(), SALT_LEN);
        assert_eq!(B64.decode(&stored.hash).unwrap().len(), KEY_LEN);
        assert!(!stored.salt.ends_with('='));
        assert!(!stored.hash.ends_with('='));
    }

    #[test]
    fn fresh_salt_every_call() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
        assert!(verify_password("same password", &a.salt, &a.hash));
        assert!(verify_password("same password", &b.salt, &b.hash));
    }

    #[test]
    fn derivation_is_deterministic_for_fixed_salt() {
        let salt = [7u8; SALT_LEN];
        assert_eq!(derive_key("pw", &salt).unwrap(), derive_key("pw", &salt).unwrap());
        assert_ne!(derive_key("pw", &salt).unwrap(), derive_key("pw2", &salt).unwrap());
    }

    #[test]
    fn garbage_storage_is_a_mismatch() {
        let stored = hash_password("hunter22").unwrap();

        assert!(!verify_password("hunter22", "not base64!!", &stored.hash));
        assert!(!verify_password("hunter22", &stored.salt, "not base64!!"));
        // decodes fine but is too short for argon2
        assert!(!verify_password("hunter22", "AAAA", &stored.hash));
        // truncated hash
        assert!(!verify_password("hunter22", &stored.salt, &stored.hash[..20]));
        assert!(!verify_password("hunter22", "", ""));
    }

    #[test]
    fn dummy_pair_has_real_sizes() {
        assert_eq!(B64.decode(DUMMY_SALT).unwrap().len(), SALT_LEN);
        assert_eq!(B64.decode(DUMMY_HASH).unwrap().len(), KEY_LEN);
        assert!(!verify_against_dummy("AAAAAAAA"));
    }

    #[test]
    fn unicode_password() {
        let stored = hash_password("한글패스워드123").unwrap();
        assert!(verify_password("한글패스워드123", &stored.salt, &stored.hash));
    }
}
