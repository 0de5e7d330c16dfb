use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::constant_time_eq;

/// 32 bytes = 256 bits of entropy.
pub const TOKEN_BYTES: usize = 32;

/// A freshly minted session token. `token` goes to the client and is never
/// persisted; `digest` is what the store keeps.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub digest: String,
}

pub fn issue_token() -> IssuedToken {
    let mut raw = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut raw);

    IssuedToken {
        token: B64.encode(raw),
        digest: B64.encode(Sha256::digest(raw)),
    }
}

/// SHA-256 digest of an encoded token, in storage encoding.
/// `None` if the token is not valid base64.
pub fn digest_token(token: &str) -> Option<String> {
    let raw = B64.decode(token).ok()?;
    Some(B64.encode(Sha256::digest(&raw)))
}

/// Check a presented token against a stored digest in constant time.
pub fn verify_token(presented: &str, stored_digest: &str) -> bool {
    let Ok(raw) = B64.decode(presented) else {
        return false;
    };
    let Ok(expected) = B64.decode(stored_digest) else {
        return false;
    };

    let actual = Sha256::digest(&raw);
    constant_time_eq(actual.as_slice(), &expected)
}
