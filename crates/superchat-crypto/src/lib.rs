//! Superchat credential primitives.
//!
//! - `password`: Argon2id salt+hash pairs for user and room passwords.
//! - `token`: opaque session tokens, stored server-side only as SHA-256 digests.
//!
//! Both verification paths go through `constant_time_eq`.

pub mod password;
pub mod token;

/// Byte comparison whose running time does not depend on where the inputs
/// first differ. Lengths are not secret here (all compared values are fixed size).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"hellp"));
        assert!(!constant_time_eq(b"hello", b"jello"));
        assert!(!constant_time_eq(b"short", b"longer"));
        assert!(constant_time_eq(b"", b""));
    }
}
