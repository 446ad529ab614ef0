//! Sealed boxes: anonymous public-key encryption
//!
//! A sealed box encrypts to a recipient's X25519 public key without any
//! sender identity. Layout: `ephemeral_public(32) ‖ ciphertext ‖ tag(16)`,
//! so the overhead over the plaintext is exactly [`SEAL_OVERHEAD`] bytes.
//! Every sealed field length in the block payload layouts assumes this.
//!
//! The message key is derived with HKDF-SHA256 from the Diffie-Hellman
//! shared secret, salted with `ephemeral_public ‖ recipient_public`. The
//! key is single-use, so the AEAD nonce is fixed at zero.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroize;

use crate::keys::{EncryptionKeyPair, PUBLIC_ENCRYPTION_KEY_SIZE};
use crate::{CryptoError, Result};

/// Bytes added to a plaintext by [`seal_encrypt`]:
/// 32-byte ephemeral public key plus 16-byte authentication tag.
pub const SEAL_OVERHEAD: usize = 48;

const HKDF_INFO: &[u8] = b"sigil/sealed-box/v1";

fn derive_message_key(
    shared_secret: &[u8; 32],
    ephemeral_public: &[u8; PUBLIC_ENCRYPTION_KEY_SIZE],
    recipient_public: &[u8; PUBLIC_ENCRYPTION_KEY_SIZE],
) -> [u8; 32] {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral_public);
    salt[32..].copy_from_slice(recipient_public);

    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut key = [0u8; 32];
    // expand only fails for absurd output lengths; 32 bytes is always valid
    #[allow(clippy::expect_used)]
    hkdf.expand(HKDF_INFO, &mut key)
        .expect("32-byte HKDF output is valid");
    key
}

/// Seal a plaintext to a recipient public key.
pub fn seal_encrypt(
    plaintext: &[u8],
    recipient_public: &[u8; PUBLIC_ENCRYPTION_KEY_SIZE],
) -> Vec<u8> {
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519Public::from(&ephemeral).to_bytes();

    let shared = ephemeral.diffie_hellman(&X25519Public::from(*recipient_public));
    let mut key = derive_message_key(shared.as_bytes(), &ephemeral_public, recipient_public);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    // Key is unique to this message; a fixed nonce cannot repeat under it.
    #[allow(clippy::expect_used)]
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&[0u8; 12]), plaintext)
        .expect("ChaCha20-Poly1305 encryption is infallible");
    key.zeroize();

    let mut sealed = Vec::with_capacity(plaintext.len() + SEAL_OVERHEAD);
    sealed.extend_from_slice(&ephemeral_public);
    sealed.extend_from_slice(&ciphertext);
    sealed
}

/// Open a sealed box with the recipient's key pair.
pub fn seal_decrypt(sealed: &[u8], key_pair: &EncryptionKeyPair) -> Result<Vec<u8>> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(CryptoError::TruncatedCiphertext);
    }
    let mut ephemeral_public = [0u8; PUBLIC_ENCRYPTION_KEY_SIZE];
    ephemeral_public.copy_from_slice(&sealed[..PUBLIC_ENCRYPTION_KEY_SIZE]);

    let shared = key_pair
        .private
        .static_secret()
        .diffie_hellman(&X25519Public::from(ephemeral_public));
    let mut key = derive_message_key(shared.as_bytes(), &ephemeral_public, &key_pair.public);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&[0u8; 12]),
            &sealed[PUBLIC_ENCRYPTION_KEY_SIZE..],
        )
        .map_err(|_| CryptoError::DecryptionFailed);
    key.zeroize();
    plaintext
}
