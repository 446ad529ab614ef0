//! Identity tokens
//!
//! A secret identity arrives from the application's identity server as a
//! base64 JSON token carrying the trustchain id, the user id, the user
//! secret, and a delegation token authorizing device creation. The user
//! secret's last byte is a check byte derived from the rest of the secret
//! and the user id; a token failing the check is rejected outright.
//!
//! A verification key is the printable form of a ghost device: the
//! base64-url of a JSON object holding both private keys.

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use sigil_core::{Result, SigilError, TrustchainId, UserId};
use sigil_crypto::{generic_hash, EncryptionKeyPair, SignatureKeyPair};

/// Delegation embedded in a secret identity: an ephemeral key pair and the
/// authority's signature over `ephemeral_public ‖ user_id`.
#[derive(Clone)]
pub struct DelegationToken {
    /// Ephemeral public signature key.
    pub ephemeral_public_signature_key: [u8; 32],
    /// Ephemeral private signature key.
    pub ephemeral_private_signature_key: [u8; 64],
    /// Authority signature authorizing the ephemeral key.
    pub delegation_signature: [u8; 64],
}

impl std::fmt::Debug for DelegationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationToken")
            .field("ephemeral_public_signature_key", &"..")
            .finish_non_exhaustive()
    }
}

/// A parsed secret identity.
#[derive(Debug, Clone)]
pub struct SecretIdentity {
    /// The trustchain the identity belongs to.
    pub trustchain_id: TrustchainId,
    /// The user id (the token's `value` field).
    pub user_id: UserId,
    /// The user secret sealing the key safe.
    pub user_secret: [u8; 32],
    /// Delegation authorizing this identity to create devices.
    pub delegation_token: DelegationToken,
}

#[derive(Serialize, Deserialize)]
struct DelegationTokenWire {
    ephemeral_public_signature_key: String,
    ephemeral_private_signature_key: String,
    delegation_signature: String,
}

#[derive(Serialize, Deserialize)]
struct SecretIdentityWire {
    trustchain_id: String,
    value: String,
    user_secret: String,
    delegation_token: DelegationTokenWire,
}

fn decode_field<const N: usize>(value: &str, field: &str) -> Result<[u8; N]> {
    let bytes = BASE64
        .decode(value)
        .map_err(|_| SigilError::invalid_argument(format!("identity field {field} is not base64")))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        SigilError::invalid_argument(format!("identity field {field} has the wrong length"))
    })
}

/// The check byte of a user secret: first byte of the hash of the secret's
/// first 31 bytes concatenated with the user id.
fn user_secret_check_byte(secret_body: &[u8], user_id: &UserId) -> u8 {
    let mut input = Vec::with_capacity(secret_body.len() + 32);
    input.extend_from_slice(secret_body);
    input.extend_from_slice(user_id.as_bytes());
    let digest = generic_hash(&input);
    input.zeroize();
    digest[0]
}

/// Generate a user secret whose check byte matches the user id.
pub fn generate_user_secret(user_id: &UserId) -> [u8; 32] {
    use rand::RngCore;
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret[..31]);
    secret[31] = user_secret_check_byte(&secret[..31], user_id);
    secret
}

impl SecretIdentity {
    /// Parse and validate a base64 identity token.
    pub fn from_token(token: &str) -> Result<Self> {
        let json = BASE64
            .decode(token.trim())
            .map_err(|_| SigilError::invalid_argument("identity token is not base64"))?;
        let wire: SecretIdentityWire = serde_json::from_slice(&json)?;

        let identity = Self {
            trustchain_id: TrustchainId::new(decode_field(&wire.trustchain_id, "trustchain_id")?),
            user_id: UserId::new(decode_field(&wire.value, "value")?),
            user_secret: decode_field(&wire.user_secret, "user_secret")?,
            delegation_token: DelegationToken {
                ephemeral_public_signature_key: decode_field(
                    &wire.delegation_token.ephemeral_public_signature_key,
                    "ephemeral_public_signature_key",
                )?,
                ephemeral_private_signature_key: decode_field(
                    &wire.delegation_token.ephemeral_private_signature_key,
                    "ephemeral_private_signature_key",
                )?,
                delegation_signature: decode_field(
                    &wire.delegation_token.delegation_signature,
                    "delegation_signature",
                )?,
            },
        };

        let expected = user_secret_check_byte(&identity.user_secret[..31], &identity.user_id);
        if identity.user_secret[31] != expected {
            return Err(SigilError::invalid_argument("invalid identity"));
        }
        Ok(identity)
    }

    /// Encode back to the base64 token form.
    pub fn to_token(&self) -> Result<String> {
        let wire = SecretIdentityWire {
            trustchain_id: BASE64.encode(self.trustchain_id.as_bytes()),
            value: BASE64.encode(self.user_id.as_bytes()),
            user_secret: BASE64.encode(self.user_secret),
            delegation_token: DelegationTokenWire {
                ephemeral_public_signature_key: BASE64
                    .encode(self.delegation_token.ephemeral_public_signature_key),
                ephemeral_private_signature_key: BASE64
                    .encode(self.delegation_token.ephemeral_private_signature_key),
                delegation_signature: BASE64.encode(self.delegation_token.delegation_signature),
            },
        };
        Ok(BASE64.encode(serde_json::to_vec(&wire)?))
    }

    /// The ephemeral signature key pair embedded in the delegation token.
    pub fn ephemeral_signature_pair(&self) -> SignatureKeyPair {
        SignatureKeyPair::from_private(&self.delegation_token.ephemeral_private_signature_key)
    }
}

/// A secret provisional identity: the app-side key pairs attached to an
/// off-chain handle such as an email address.
#[derive(Debug, Clone)]
pub struct SecretProvisionalIdentity {
    /// The trustchain the identity belongs to.
    pub trustchain_id: TrustchainId,
    /// Kind of the off-chain handle (currently `"email"`).
    pub target: String,
    /// The handle itself.
    pub value: String,
    /// App-side signature key pair.
    pub app_signature_pair: SignatureKeyPair,
    /// App-side encryption key pair.
    pub app_encryption_pair: EncryptionKeyPair,
}

#[derive(Serialize, Deserialize)]
struct VerificationKeyWire {
    #[serde(rename = "privateEncryptionKey")]
    private_encryption_key: String,
    #[serde(rename = "privateSignatureKey")]
    private_signature_key: String,
}

/// Encode a ghost device's private keys as a printable verification key.
pub fn ghost_device_to_verification_key(
    signature_pair: &SignatureKeyPair,
    encryption_pair: &EncryptionKeyPair,
) -> Result<String> {
    let wire = VerificationKeyWire {
        private_encryption_key: BASE64.encode(encryption_pair.private.as_bytes()),
        private_signature_key: BASE64.encode(signature_pair.private.as_bytes()),
    };
    Ok(BASE64_URL.encode(serde_json::to_vec(&wire)?))
}

/// Reconstruct a ghost device from a verification key.
pub fn verification_key_to_ghost_device(
    token: &str,
) -> Result<(SignatureKeyPair, EncryptionKeyPair)> {
    let json = BASE64_URL
        .decode(token.trim())
        .map_err(|_| SigilError::invalid_verification("verification key is not base64"))?;
    let wire: VerificationKeyWire = serde_json::from_slice(&json)
        .map_err(|_| SigilError::invalid_verification("verification key is malformed"))?;

    let signature_private: [u8; 64] = BASE64
        .decode(&wire.private_signature_key)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| SigilError::invalid_verification("bad private signature key"))?;
    let encryption_private: [u8; 32] = BASE64
        .decode(&wire.private_encryption_key)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| SigilError::invalid_verification("bad private encryption key"))?;

    Ok((
        SignatureKeyPair::from_private(&signature_private),
        EncryptionKeyPair::from_private(&encryption_private),
    ))
}

/// Generate a fresh ghost device and return its verification key.
pub fn generate_verification_key() -> Result<String> {
    ghost_device_to_verification_key(
        &SignatureKeyPair::generate(),
        &EncryptionKeyPair::generate(),
    )
}
