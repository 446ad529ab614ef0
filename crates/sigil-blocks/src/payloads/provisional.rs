//! Provisional-identity claim payload

use sigil_core::serialize::{deserialize_all, Result, Writer};
use sigil_core::{DeviceId, UserId};

use super::SEALED_PROVISIONAL_KEYS_SIZE;

/// Claim of a provisional identity by a registered user.
///
/// The author proves possession of both provisional private signature keys
/// by signing `author_device_id ‖ app_key ‖ tanker_key` with each, and
/// hands the provisional private encryption keys to the user by sealing
/// them to the user's current public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalIdentityClaim {
    /// Claiming user.
    pub user_id: UserId,
    /// App-side provisional public signature key.
    pub app_provisional_identity_signature_public_key: [u8; 32],
    /// Tanker-side provisional public signature key.
    pub tanker_provisional_identity_signature_public_key: [u8; 32],
    /// Proof signature by the app provisional private key.
    pub author_signature_by_app_key: [u8; 64],
    /// Proof signature by the tanker provisional private key.
    pub author_signature_by_tanker_key: [u8; 64],
    /// User public key generation the private keys are sealed to.
    pub recipient_user_public_key: [u8; 32],
    /// Both provisional private encryption keys, concatenated and sealed.
    pub encrypted_provisional_identity_private_keys: [u8; SEALED_PROVISIONAL_KEYS_SIZE],
}

impl ProvisionalIdentityClaim {
    /// The bytes both proof signatures cover.
    pub fn signature_data(&self, author_device: &DeviceId) -> [u8; 96] {
        let mut data = [0u8; 96];
        data[..32].copy_from_slice(author_device.as_bytes());
        data[32..64].copy_from_slice(&self.app_provisional_identity_signature_public_key);
        data[64..].copy_from_slice(&self.tanker_provisional_identity_signature_public_key);
        data
    }

    /// Decode from payload bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            Ok(Self {
                user_id: UserId::new(r.read_array()?),
                app_provisional_identity_signature_public_key: r.read_array()?,
                tanker_provisional_identity_signature_public_key: r.read_array()?,
                author_signature_by_app_key: r.read_array()?,
                author_signature_by_tanker_key: r.read_array()?,
                recipient_user_public_key: r.read_array()?,
                encrypted_provisional_identity_private_keys: r
                    .read_array::<SEALED_PROVISIONAL_KEYS_SIZE>()?,
            })
        })
    }

    /// Encode to payload bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(32 * 3 + 64 * 2 + 32 + SEALED_PROVISIONAL_KEYS_SIZE);
        w.push_bytes(self.user_id.as_bytes());
        w.push_bytes(&self.app_provisional_identity_signature_public_key);
        w.push_bytes(&self.tanker_provisional_identity_signature_public_key);
        w.push_bytes(&self.author_signature_by_app_key);
        w.push_bytes(&self.author_signature_by_tanker_key);
        w.push_bytes(&self.recipient_user_public_key);
        w.push_bytes(&self.encrypted_provisional_identity_private_keys);
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::serialize::CodecError;

    fn sample() -> ProvisionalIdentityClaim {
        ProvisionalIdentityClaim {
            user_id: UserId::new([1; 32]),
            app_provisional_identity_signature_public_key: [2; 32],
            tanker_provisional_identity_signature_public_key: [3; 32],
            author_signature_by_app_key: [4; 64],
            author_signature_by_tanker_key: [5; 64],
            recipient_user_public_key: [6; 32],
            encrypted_provisional_identity_private_keys: [7; SEALED_PROVISIONAL_KEYS_SIZE],
        }
    }

    #[test]
    fn test_round_trip() {
        let record = sample();
        let bytes = record.serialize();
        assert_eq!(ProvisionalIdentityClaim::deserialize(&bytes).unwrap(), record);
    }

    #[test]
    fn test_signature_data_layout() {
        let record = sample();
        let device = DeviceId::new([9; 32]);
        let data = record.signature_data(&device);
        assert_eq!(&data[..32], device.as_bytes());
        assert_eq!(
            &data[32..64],
            &record.app_provisional_identity_signature_public_key
        );
        assert_eq!(
            &data[64..],
            &record.tanker_provisional_identity_signature_public_key
        );
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = sample().serialize();
        assert_eq!(
            ProvisionalIdentityClaim::deserialize(&bytes[..bytes.len() - 1]),
            Err(CodecError::Truncated)
        );
    }
}
