//! Generic hashing and constant-time comparison

use subtle::ConstantTimeEq;

/// Output size of the generic hash.
pub const GENERIC_HASH_SIZE: usize = 32;

/// Hash arbitrary bytes to a 32-byte digest.
///
/// Used for block hashing, identifier derivation, and the user-secret
/// check byte. The choice of BLAKE3 is part of the wire format: block
/// hashes computed here must match what peer implementations compute.
pub fn generic_hash(data: &[u8]) -> [u8; GENERIC_HASH_SIZE] {
    *blake3::hash(data).as_bytes()
}

/// Constant-time equality over byte strings.
///
/// Returns false on length mismatch without leaking where the mismatch is.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = generic_hash(b"trustchain");
        let b = generic_hash(b"trustchain");
        assert_eq!(a, b);
        assert_ne!(a, generic_hash(b"trustchain!"));
    }

    #[test]
    fn test_ct_eq() {
        assert!(ct_eq(b"secret", b"secret"));
        assert!(!ct_eq(b"secret", b"secreT"));
        assert!(!ct_eq(b"secret", b"secre"));
        assert!(ct_eq(b"", b""));
    }
}
