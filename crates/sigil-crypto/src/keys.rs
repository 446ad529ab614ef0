//! Key pairs for signing and encryption
//!
//! Signature keys are Ed25519. The private half is carried as 64 bytes,
//! seed followed by public key, which is the layout peer SDKs exchange in
//! verification keys. Encryption keys are X25519 with 32-byte halves.
//! Both pairs are reconstructible from their private halves alone.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an Ed25519 signature.
pub const SIGNATURE_SIZE: usize = 64;
/// Size of an Ed25519 public key.
pub const PUBLIC_SIGNATURE_KEY_SIZE: usize = 32;
/// Size of a private signature key: 32-byte seed followed by the public key.
pub const PRIVATE_SIGNATURE_KEY_SIZE: usize = 64;
/// Size of an X25519 public key.
pub const PUBLIC_ENCRYPTION_KEY_SIZE: usize = 32;
/// Size of an X25519 private key.
pub const PRIVATE_ENCRYPTION_KEY_SIZE: usize = 32;

/// Private signature key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateSignatureKey([u8; PRIVATE_SIGNATURE_KEY_SIZE]);

impl PrivateSignatureKey {
    /// Wrap raw private key bytes (seed followed by public key).
    pub fn from_bytes(bytes: [u8; PRIVATE_SIGNATURE_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; PRIVATE_SIGNATURE_KEY_SIZE] {
        &self.0
    }

    fn signing_key(&self) -> SigningKey {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&self.0[..32]);
        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        key
    }
}

impl std::fmt::Debug for PrivateSignatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateSignatureKey(..)")
    }
}

/// Ed25519 key pair used for block and delegation signatures.
#[derive(Clone)]
pub struct SignatureKeyPair {
    /// Public verification key.
    pub public: [u8; PUBLIC_SIGNATURE_KEY_SIZE],
    /// Private signing key.
    pub private: PrivateSignatureKey,
}

impl SignatureKeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(&signing)
    }

    /// Rebuild the pair from its 64-byte private half.
    ///
    /// The public half is re-derived from the seed, so a corrupted public
    /// suffix in the input cannot produce a mismatched pair.
    pub fn from_private(private: &[u8; PRIVATE_SIGNATURE_KEY_SIZE]) -> Self {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&private[..32]);
        let signing = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self::from_signing_key(&signing)
    }

    fn from_signing_key(signing: &SigningKey) -> Self {
        let public = signing.verifying_key().to_bytes();
        let mut private = [0u8; PRIVATE_SIGNATURE_KEY_SIZE];
        private[..32].copy_from_slice(&signing.to_bytes());
        private[32..].copy_from_slice(&public);
        Self {
            public,
            private: PrivateSignatureKey::from_bytes(private),
        }
    }

    /// Sign a message, producing a 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.private.signing_key().sign(message).to_bytes()
    }
}

impl std::fmt::Debug for SignatureKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureKeyPair")
            .field("public", &hex_prefix(&self.public))
            .finish_non_exhaustive()
    }
}

/// Verify a 64-byte signature over a message.
///
/// Returns false for malformed public keys rather than erroring: a bad key
/// in a block is a verification failure, not a caller bug.
pub fn verify_signature(
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
    public_key: &[u8; PUBLIC_SIGNATURE_KEY_SIZE],
) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(signature);
    key.verify_strict(message, &signature).is_ok()
}

/// Private encryption key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateEncryptionKey([u8; PRIVATE_ENCRYPTION_KEY_SIZE]);

impl PrivateEncryptionKey {
    /// Wrap raw private key bytes.
    pub fn from_bytes(bytes: [u8; PRIVATE_ENCRYPTION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; PRIVATE_ENCRYPTION_KEY_SIZE] {
        &self.0
    }

    pub(crate) fn static_secret(&self) -> StaticSecret {
        StaticSecret::from(self.0)
    }
}

impl std::fmt::Debug for PrivateEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateEncryptionKey(..)")
    }
}

/// X25519 key pair used for sealed boxes.
#[derive(Clone)]
pub struct EncryptionKeyPair {
    /// Public encryption key.
    pub public: [u8; PUBLIC_ENCRYPTION_KEY_SIZE],
    /// Private decryption key.
    pub private: PrivateEncryptionKey,
}

impl EncryptionKeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret).to_bytes();
        Self {
            public,
            private: PrivateEncryptionKey::from_bytes(secret.to_bytes()),
        }
    }

    /// Rebuild the pair from its 32-byte private half.
    pub fn from_private(private: &[u8; PRIVATE_ENCRYPTION_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(*private);
        let public = X25519Public::from(&secret).to_bytes();
        Self {
            public,
            private: PrivateEncryptionKey::from_bytes(*private),
        }
    }
}

impl std::fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeyPair")
            .field("public", &hex_prefix(&self.public))
            .finish_non_exhaustive()
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(10);
    for byte in bytes.iter().take(4) {
        out.push_str(&format!("{byte:02x}"));
    }
    out.push_str("..");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let pair = SignatureKeyPair::generate();
        let signature = pair.sign(b"attest");
        assert!(verify_signature(b"attest", &signature, &pair.public));
        assert!(!verify_signature(b"attest!", &signature, &pair.public));
    }

    #[test]
    fn test_flipped_signature_bit_rejected() {
        let pair = SignatureKeyPair::generate();
        let mut signature = pair.sign(b"attest");
        signature[0] ^= 0x01;
        assert!(!verify_signature(b"attest", &signature, &pair.public));
    }

    #[test]
    fn test_signature_pair_from_private_round_trip() {
        let pair = SignatureKeyPair::generate();
        let rebuilt = SignatureKeyPair::from_private(pair.private.as_bytes());
        assert_eq!(rebuilt.public, pair.public);

        let signature = rebuilt.sign(b"same key");
        assert!(verify_signature(b"same key", &signature, &pair.public));
    }

    #[test]
    fn test_private_signature_key_layout() {
        // Private half is seed followed by public key.
        let pair = SignatureKeyPair::generate();
        assert_eq!(&pair.private.as_bytes()[32..], &pair.public);
    }

    #[test]
    fn test_encryption_pair_from_private_round_trip() {
        let pair = EncryptionKeyPair::generate();
        let rebuilt = EncryptionKeyPair::from_private(pair.private.as_bytes());
        assert_eq!(rebuilt.public, pair.public);
    }

    #[test]
    fn test_malformed_public_key_verifies_false() {
        let pair = SignatureKeyPair::generate();
        let signature = pair.sign(b"msg");
        // Not a valid curve point.
        let bad_key = [0xff; PUBLIC_SIGNATURE_KEY_SIZE];
        assert!(!verify_signature(b"msg", &signature, &bad_key));
    }
}
