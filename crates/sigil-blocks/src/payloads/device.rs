//! Device creation and revocation payloads

use sigil_core::serialize::{deserialize_all, CodecError, Reader, Result, Writer};
use sigil_core::{DeviceId, UserId};

use super::{SealedKey, SEALED_KEY_SIZE};
use crate::nature::Nature;

/// Sentinel for the `revoked` field of a freshly created device.
///
/// The field is written for wire compatibility and treated as opaque on
/// read; revocation state derives solely from revocation blocks.
pub const DEVICE_NOT_REVOKED: u64 = u64::MAX;

/// The user key a v3 device creation carries: the current user public key
/// and the private half sealed to the new device's encryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedUserKeyPair {
    /// Current user public encryption key.
    pub public_encryption_key: [u8; 32],
    /// User private encryption key sealed to the new device.
    pub encrypted_private_encryption_key: SealedKey,
}

/// Device creation payload, all wire versions.
///
/// v1 ends after `public_encryption_key`; v2 adds `last_reset`; v3 adds
/// the sealed user key pair, the ghost marker, and the revoked sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCreation {
    /// Ephemeral key that signs this block.
    pub ephemeral_public_signature_key: [u8; 32],
    /// User this device belongs to.
    pub user_id: UserId,
    /// Signature over `ephemeral_public_signature_key ‖ user_id` by the
    /// delegating authority (trustchain root or an existing device).
    pub delegation_signature: [u8; 64],
    /// The device's long-lived public signature key.
    pub public_signature_key: [u8; 32],
    /// The device's public encryption key.
    pub public_encryption_key: [u8; 32],
    /// Reserved reset marker; must be all-zero on the wire.
    pub last_reset: [u8; 32],
    /// Sealed user key pair (v3 only).
    pub user_key_pair: Option<SealedUserKeyPair>,
    /// Whether this is the bootstrap ghost device.
    pub is_ghost_device: bool,
    /// Opaque revocation sentinel (v3 only, not interpreted).
    pub revoked: u64,
}

impl DeviceCreation {
    /// The bytes a delegation signature covers.
    pub fn delegation_signature_data(
        ephemeral_public_signature_key: &[u8; 32],
        user_id: &UserId,
    ) -> [u8; 64] {
        let mut data = [0u8; 64];
        data[..32].copy_from_slice(ephemeral_public_signature_key);
        data[32..].copy_from_slice(user_id.as_bytes());
        data
    }

    /// The delegation data of this payload.
    pub fn delegation_data(&self) -> [u8; 64] {
        Self::delegation_signature_data(&self.ephemeral_public_signature_key, &self.user_id)
    }

    /// Decode under the given device-creation nature.
    pub fn deserialize(nature: Nature, data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            let ephemeral_public_signature_key = r.read_array()?;
            let user_id = UserId::new(r.read_array()?);
            let delegation_signature = r.read_array()?;
            let public_signature_key = r.read_array()?;
            let public_encryption_key = r.read_array()?;

            let last_reset = match nature {
                Nature::DeviceCreationV1 => [0u8; 32],
                _ => r.read_array()?,
            };

            let (user_key_pair, is_ghost_device, revoked) = match nature {
                Nature::DeviceCreationV3 => {
                    let public = r.read_array()?;
                    let sealed = r.read_array::<SEALED_KEY_SIZE>()?;
                    let ghost = read_bool(r)?;
                    let revoked = r.read_varint()?;
                    (
                        Some(SealedUserKeyPair {
                            public_encryption_key: public,
                            encrypted_private_encryption_key: sealed,
                        }),
                        ghost,
                        revoked,
                    )
                }
                _ => (None, false, DEVICE_NOT_REVOKED),
            };

            Ok(Self {
                ephemeral_public_signature_key,
                user_id,
                delegation_signature,
                public_signature_key,
                public_encryption_key,
                last_reset,
                user_key_pair,
                is_ghost_device,
                revoked,
            })
        })
    }

    /// Encode under the given device-creation nature.
    pub fn serialize(&self, nature: Nature) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(256);
        w.push_bytes(&self.ephemeral_public_signature_key);
        w.push_bytes(self.user_id.as_bytes());
        w.push_bytes(&self.delegation_signature);
        w.push_bytes(&self.public_signature_key);
        w.push_bytes(&self.public_encryption_key);

        if nature != Nature::DeviceCreationV1 {
            w.push_bytes(&self.last_reset);
        }
        if nature == Nature::DeviceCreationV3 {
            let user_key_pair = self
                .user_key_pair
                .as_ref()
                .ok_or(CodecError::InvalidField("v3 device creation needs user key"))?;
            w.push_bytes(&user_key_pair.public_encryption_key);
            w.push_bytes(&user_key_pair.encrypted_private_encryption_key);
            w.push_bytes(&[u8::from(self.is_ghost_device)]);
            w.push_varint(self.revoked);
        }
        Ok(w.into_bytes())
    }
}

/// One remaining device's share of a rotated user key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKeyRecipient {
    /// Device the key is sealed to.
    pub recipient: DeviceId,
    /// New user private encryption key sealed to that device.
    pub encrypted_private_encryption_key: SealedKey,
}

/// The user-key rotation a v2 revocation carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationUserKeys {
    /// The rotated-in user public encryption key.
    pub public_encryption_key: [u8; 32],
    /// The user public key being superseded.
    pub previous_public_encryption_key: [u8; 32],
    /// Old private key sealed to the new public key (history recovery).
    pub encrypted_previous_encryption_key: SealedKey,
    /// New private key sealed to each remaining device.
    pub private_keys: Vec<PrivateKeyRecipient>,
}

/// Device revocation payload, both wire versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRevocation {
    /// Device being revoked.
    pub device_id: DeviceId,
    /// Key rotation (v2 only).
    pub user_keys: Option<RevocationUserKeys>,
}

impl DeviceRevocation {
    /// Decode under the given revocation nature.
    pub fn deserialize(nature: Nature, data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            let device_id = DeviceId::new(r.read_array()?);
            let user_keys = match nature {
                Nature::DeviceRevocationV1 => None,
                _ => {
                    let public_encryption_key = r.read_array()?;
                    let previous_public_encryption_key = r.read_array()?;
                    let encrypted_previous_encryption_key = r.read_array::<SEALED_KEY_SIZE>()?;
                    let private_keys = r.read_list(|r| {
                        Ok(PrivateKeyRecipient {
                            recipient: DeviceId::new(r.read_array()?),
                            encrypted_private_encryption_key: r.read_array::<SEALED_KEY_SIZE>()?,
                        })
                    })?;
                    Some(RevocationUserKeys {
                        public_encryption_key,
                        previous_public_encryption_key,
                        encrypted_previous_encryption_key,
                        private_keys,
                    })
                }
            };
            Ok(Self {
                device_id,
                user_keys,
            })
        })
    }

    /// Encode under the given revocation nature.
    pub fn serialize(&self, nature: Nature) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(256);
        w.push_bytes(self.device_id.as_bytes());
        if nature != Nature::DeviceRevocationV1 {
            let user_keys = self
                .user_keys
                .as_ref()
                .ok_or(CodecError::InvalidField("v2 revocation needs user keys"))?;
            w.push_bytes(&user_keys.public_encryption_key);
            w.push_bytes(&user_keys.previous_public_encryption_key);
            w.push_bytes(&user_keys.encrypted_previous_encryption_key);
            w.push_list(&user_keys.private_keys, |w, key| {
                w.push_bytes(key.recipient.as_bytes());
                w.push_bytes(&key.encrypted_private_encryption_key);
            });
        }
        Ok(w.into_bytes())
    }
}

fn read_bool(r: &mut Reader<'_>) -> Result<bool> {
    match r.read_array::<1>()?[0] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(CodecError::InvalidField("boolean byte out of domain")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_creation(with_user_key: bool) -> DeviceCreation {
        DeviceCreation {
            ephemeral_public_signature_key: [1; 32],
            user_id: UserId::new([2; 32]),
            delegation_signature: [3; 64],
            public_signature_key: [4; 32],
            public_encryption_key: [5; 32],
            last_reset: [0; 32],
            user_key_pair: with_user_key.then(|| SealedUserKeyPair {
                public_encryption_key: [6; 32],
                encrypted_private_encryption_key: [7; SEALED_KEY_SIZE],
            }),
            is_ghost_device: true,
            revoked: DEVICE_NOT_REVOKED,
        }
    }

    #[test]
    fn test_creation_v3_round_trip() {
        let record = sample_creation(true);
        let bytes = record.serialize(Nature::DeviceCreationV3).unwrap();
        let decoded = DeviceCreation::deserialize(Nature::DeviceCreationV3, &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_creation_v1_round_trip() {
        let mut record = sample_creation(false);
        record.is_ghost_device = false;
        let bytes = record.serialize(Nature::DeviceCreationV1).unwrap();
        assert_eq!(bytes.len(), 32 + 32 + 64 + 32 + 32);
        let decoded = DeviceCreation::deserialize(Nature::DeviceCreationV1, &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_creation_v3_requires_user_key() {
        let record = sample_creation(false);
        assert!(matches!(
            record.serialize(Nature::DeviceCreationV3),
            Err(CodecError::InvalidField(_))
        ));
    }

    #[test]
    fn test_creation_trailing_garbage_rejected() {
        let record = sample_creation(true);
        let mut bytes = record.serialize(Nature::DeviceCreationV3).unwrap();
        bytes.push(0);
        assert_eq!(
            DeviceCreation::deserialize(Nature::DeviceCreationV3, &bytes),
            Err(CodecError::TrailingGarbage)
        );
    }

    #[test]
    fn test_creation_truncated_rejected() {
        let record = sample_creation(true);
        let bytes = record.serialize(Nature::DeviceCreationV3).unwrap();
        assert_eq!(
            DeviceCreation::deserialize(Nature::DeviceCreationV3, &bytes[..bytes.len() - 2]),
            Err(CodecError::Truncated)
        );
    }

    #[test]
    fn test_ghost_byte_out_of_domain() {
        let record = sample_creation(true);
        let mut bytes = record.serialize(Nature::DeviceCreationV3).unwrap();
        // The ghost flag sits right before the trailing revoked varint.
        let revoked_len = {
            let mut w = Writer::new();
            w.push_varint(DEVICE_NOT_REVOKED);
            w.len()
        };
        let ghost_at = bytes.len() - revoked_len - 1;
        bytes[ghost_at] = 2;
        assert_eq!(
            DeviceCreation::deserialize(Nature::DeviceCreationV3, &bytes),
            Err(CodecError::InvalidField("boolean byte out of domain"))
        );
    }

    #[test]
    fn test_delegation_data_layout() {
        let record = sample_creation(true);
        let data = record.delegation_data();
        assert_eq!(&data[..32], &record.ephemeral_public_signature_key);
        assert_eq!(&data[32..], record.user_id.as_bytes());
    }

    fn sample_revocation() -> DeviceRevocation {
        DeviceRevocation {
            device_id: DeviceId::new([9; 32]),
            user_keys: Some(RevocationUserKeys {
                public_encryption_key: [10; 32],
                previous_public_encryption_key: [11; 32],
                encrypted_previous_encryption_key: [12; SEALED_KEY_SIZE],
                private_keys: vec![
                    PrivateKeyRecipient {
                        recipient: DeviceId::new([13; 32]),
                        encrypted_private_encryption_key: [14; SEALED_KEY_SIZE],
                    },
                    PrivateKeyRecipient {
                        recipient: DeviceId::new([15; 32]),
                        encrypted_private_encryption_key: [16; SEALED_KEY_SIZE],
                    },
                ],
            }),
        }
    }

    #[test]
    fn test_revocation_v2_round_trip() {
        let record = sample_revocation();
        let bytes = record.serialize(Nature::DeviceRevocationV2).unwrap();
        let decoded = DeviceRevocation::deserialize(Nature::DeviceRevocationV2, &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_revocation_v1_is_bare_device_id() {
        let record = DeviceRevocation {
            device_id: DeviceId::new([9; 32]),
            user_keys: None,
        };
        let bytes = record.serialize(Nature::DeviceRevocationV1).unwrap();
        assert_eq!(bytes.len(), 32);
        let decoded = DeviceRevocation::deserialize(Nature::DeviceRevocationV1, &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_revocation_empty_recipient_list_round_trip() {
        let mut record = sample_revocation();
        if let Some(keys) = record.user_keys.as_mut() {
            keys.private_keys.clear();
        }
        let bytes = record.serialize(Nature::DeviceRevocationV2).unwrap();
        let decoded = DeviceRevocation::deserialize(Nature::DeviceRevocationV2, &bytes).unwrap();
        assert_eq!(decoded, record);
    }
}
