//! Symmetric authenticated encryption in the two wire formats
//!
//! Both formats are XChaCha20-Poly1305 with a random 24-byte nonce under a
//! 32-byte key; they differ only in where the nonce sits:
//!
//! - v1: `nonce(24) ‖ ciphertext ‖ tag(16)` — used by the key safe at rest.
//! - v2: `ciphertext ‖ tag(16) ‖ nonce(24)` — the newer on-wire layout.
//!
//! Decryptors for both stay available for compatibility with data written
//! by older clients.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;

use crate::{CryptoError, Result};

/// Symmetric key size.
pub const SYMMETRIC_KEY_SIZE: usize = 32;

const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

fn encrypt(key: &[u8; SYMMETRIC_KEY_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    #[allow(clippy::expect_used)]
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .expect("XChaCha20-Poly1305 encryption is infallible")
}

fn decrypt(
    key: &[u8; SYMMETRIC_KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Encrypt in the v1 layout: `nonce ‖ ciphertext ‖ tag`.
pub fn symmetric_encrypt_v1(key: &[u8; SYMMETRIC_KEY_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let nonce = random_nonce();
    let ciphertext = encrypt(key, &nonce, plaintext);
    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt the v1 layout.
pub fn symmetric_decrypt_v1(key: &[u8; SYMMETRIC_KEY_SIZE], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::TruncatedCiphertext);
    }
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&data[..NONCE_SIZE]);
    decrypt(key, &nonce, &data[NONCE_SIZE..])
}

/// Encrypt in the v2 layout: `ciphertext ‖ tag ‖ nonce`.
pub fn symmetric_encrypt_v2(key: &[u8; SYMMETRIC_KEY_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let nonce = random_nonce();
    let ciphertext = encrypt(key, &nonce, plaintext);
    let mut out = Vec::with_capacity(ciphertext.len() + NONCE_SIZE);
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&nonce);
    out
}

/// Decrypt the v2 layout.
pub fn symmetric_decrypt_v2(key: &[u8; SYMMETRIC_KEY_SIZE], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::TruncatedCiphertext);
    }
    let split = data.len() - NONCE_SIZE;
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&data[split..]);
    decrypt(key, &nonce, &data[..split])
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; SYMMETRIC_KEY_SIZE] = [0x42; SYMMETRIC_KEY_SIZE];

    #[test]
    fn test_v1_round_trip() {
        let data = symmetric_encrypt_v1(&KEY, b"safe contents");
        assert_eq!(data.len(), b"safe contents".len() + NONCE_SIZE + TAG_SIZE);
        assert_eq!(symmetric_decrypt_v1(&KEY, &data).unwrap(), b"safe contents");
    }

    #[test]
    fn test_v2_round_trip() {
        let data = symmetric_encrypt_v2(&KEY, b"wire payload");
        assert_eq!(symmetric_decrypt_v2(&KEY, &data).unwrap(), b"wire payload");
    }

    #[test]
    fn test_formats_are_not_interchangeable() {
        // A nonce-first blob decrypted as nonce-last must fail the tag check.
        let data = symmetric_encrypt_v1(&KEY, b"some longer plaintext here");
        assert!(symmetric_decrypt_v2(&KEY, &data).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let data = symmetric_encrypt_v1(&KEY, b"x");
        let other = [0x43; SYMMETRIC_KEY_SIZE];
        assert_eq!(
            symmetric_decrypt_v1(&other, &data),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_corrupted_byte_fails() {
        let mut data = symmetric_encrypt_v1(&KEY, b"payload");
        data[NONCE_SIZE] ^= 0x80;
        assert_eq!(
            symmetric_decrypt_v1(&KEY, &data),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_truncated_rejected() {
        assert_eq!(
            symmetric_decrypt_v1(&KEY, &[0u8; NONCE_SIZE + TAG_SIZE - 1]),
            Err(CryptoError::TruncatedCiphertext)
        );
    }
}
