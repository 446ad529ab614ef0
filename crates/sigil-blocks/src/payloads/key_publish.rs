//! Key-publish payloads
//!
//! A key publish shares one resource's symmetric key with a recipient.
//! Device, user, and group publishes share one layout; the recipient field
//! is a device id, a user public encryption key, or a group public
//! encryption key depending on the nature. Provisional-user publishes
//! carry both provisional signature keys and a twice-sealed resource key.

use sigil_core::serialize::{deserialize_all, Result, Writer};
use sigil_core::ResourceId;

use super::{SealedKey, TwiceSealedKey, SEALED_KEY_SIZE, TWICE_SEALED_KEY_SIZE};

/// Key publish to a device, user, or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPublish {
    /// Recipient address: device id, user public key, or group public key.
    pub recipient: [u8; 32],
    /// Resource the key decrypts.
    pub resource_id: ResourceId,
    /// Resource key sealed to the recipient.
    pub encrypted_resource_key: SealedKey,
}

impl KeyPublish {
    /// Decode from payload bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            Ok(Self {
                recipient: r.read_array()?,
                resource_id: ResourceId::new(r.read_array()?),
                encrypted_resource_key: r.read_array::<SEALED_KEY_SIZE>()?,
            })
        })
    }

    /// Encode to payload bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(32 + 32 + SEALED_KEY_SIZE);
        w.push_bytes(&self.recipient);
        w.push_bytes(self.resource_id.as_bytes());
        w.push_bytes(&self.encrypted_resource_key);
        w.into_bytes()
    }
}

/// Key publish to a provisional user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPublishToProvisionalUser {
    /// App-side provisional public signature key.
    pub app_public_signature_key: [u8; 32],
    /// Tanker-side provisional public signature key.
    pub tanker_public_signature_key: [u8; 32],
    /// Resource the key decrypts.
    pub resource_id: ResourceId,
    /// Resource key sealed to the app key, then to the tanker key.
    pub twice_encrypted_resource_key: TwiceSealedKey,
}

impl KeyPublishToProvisionalUser {
    /// Decode from payload bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            Ok(Self {
                app_public_signature_key: r.read_array()?,
                tanker_public_signature_key: r.read_array()?,
                resource_id: ResourceId::new(r.read_array()?),
                twice_encrypted_resource_key: r.read_array::<TWICE_SEALED_KEY_SIZE>()?,
            })
        })
    }

    /// Encode to payload bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(32 + 32 + 32 + TWICE_SEALED_KEY_SIZE);
        w.push_bytes(&self.app_public_signature_key);
        w.push_bytes(&self.tanker_public_signature_key);
        w.push_bytes(self.resource_id.as_bytes());
        w.push_bytes(&self.twice_encrypted_resource_key);
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::serialize::CodecError;

    #[test]
    fn test_key_publish_round_trip() {
        let record = KeyPublish {
            recipient: [1; 32],
            resource_id: ResourceId::new([2; 32]),
            encrypted_resource_key: [3; SEALED_KEY_SIZE],
        };
        let bytes = record.serialize();
        assert_eq!(bytes.len(), 32 + 32 + SEALED_KEY_SIZE);
        assert_eq!(KeyPublish::deserialize(&bytes).unwrap(), record);
    }

    #[test]
    fn test_provisional_key_publish_round_trip() {
        let record = KeyPublishToProvisionalUser {
            app_public_signature_key: [1; 32],
            tanker_public_signature_key: [2; 32],
            resource_id: ResourceId::new([3; 32]),
            twice_encrypted_resource_key: [4; TWICE_SEALED_KEY_SIZE],
        };
        let bytes = record.serialize();
        assert_eq!(
            KeyPublishToProvisionalUser::deserialize(&bytes).unwrap(),
            record
        );
    }

    #[test]
    fn test_key_publish_trailing_garbage_rejected() {
        let record = KeyPublish {
            recipient: [1; 32],
            resource_id: ResourceId::new([2; 32]),
            encrypted_resource_key: [3; SEALED_KEY_SIZE],
        };
        let mut bytes = record.serialize();
        bytes.extend_from_slice(&[0, 0]);
        assert_eq!(
            KeyPublish::deserialize(&bytes),
            Err(CodecError::TrailingGarbage)
        );
    }

    #[test]
    fn test_key_publish_truncated_rejected() {
        assert_eq!(
            KeyPublish::deserialize(&[0u8; 32]),
            Err(CodecError::Truncated)
        );
    }
}
