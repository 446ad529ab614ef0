//! Sigil crypto provider
//!
//! Every cryptographic operation the core depends on lives here: Ed25519
//! signatures, X25519 sealed boxes, symmetric AEAD in the two wire formats,
//! and the 32-byte generic hash. All byte sizes are fixed and participate
//! in the payload layouts of the block codec, so the constants in this
//! crate are load-bearing for wire compatibility.
//!
//! Private key material is held in zeroize-on-drop newtypes and never
//! implements `Debug` with its contents.

pub mod hash;
pub mod keys;
pub mod sealed;
pub mod symmetric;

pub use hash::{ct_eq, generic_hash, GENERIC_HASH_SIZE};
pub use keys::{
    EncryptionKeyPair, PrivateEncryptionKey, PrivateSignatureKey, SignatureKeyPair,
    verify_signature, PRIVATE_ENCRYPTION_KEY_SIZE, PRIVATE_SIGNATURE_KEY_SIZE,
    PUBLIC_ENCRYPTION_KEY_SIZE, PUBLIC_SIGNATURE_KEY_SIZE, SIGNATURE_SIZE,
};
pub use sealed::{seal_decrypt, seal_encrypt, SEAL_OVERHEAD};
pub use symmetric::{
    symmetric_decrypt_v1, symmetric_decrypt_v2, symmetric_encrypt_v1, symmetric_encrypt_v2,
    SYMMETRIC_KEY_SIZE,
};

use sigil_core::SigilError;

/// Errors produced by the crypto provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Ciphertext shorter than the format's fixed overhead
    #[error("ciphertext too short")]
    TruncatedCiphertext,

    /// Authenticated decryption failed
    #[error("decryption failed")]
    DecryptionFailed,
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;

impl From<CryptoError> for SigilError {
    fn from(err: CryptoError) -> Self {
        SigilError::decryption_failed(err.to_string())
    }
}
