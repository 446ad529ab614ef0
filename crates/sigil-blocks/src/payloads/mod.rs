//! Canonical payload layouts, one per block nature
//!
//! Fields are fixed-size byte arrays concatenated in declaration order;
//! `list<T>` fields carry a varint element count. Decoding is strict: any
//! out-of-domain value is an error, and the framing layer guarantees the
//! payload slice is consumed exactly.

mod device;
mod group;
mod key_publish;
mod provisional;

pub use device::{
    DeviceCreation, DeviceRevocation, PrivateKeyRecipient, RevocationUserKeys, SealedUserKeyPair,
    DEVICE_NOT_REVOKED,
};
pub use group::{GroupMember, GroupProvisionalMember, UserGroupAddition, UserGroupCreation};
pub use key_publish::{KeyPublish, KeyPublishToProvisionalUser};
pub use provisional::ProvisionalIdentityClaim;

use sigil_core::serialize::{deserialize_all, CodecError, Reader, Result};
use sigil_crypto::{SEAL_OVERHEAD, SIGNATURE_SIZE};

/// A 32-byte key sealed once: 80 bytes.
pub const SEALED_KEY_SIZE: usize = 32 + SEAL_OVERHEAD;
/// A 32-byte key sealed twice (app then tanker): 128 bytes.
pub const TWICE_SEALED_KEY_SIZE: usize = SEALED_KEY_SIZE + SEAL_OVERHEAD;
/// A 64-byte private signature key sealed once: 112 bytes.
pub const SEALED_SIGNATURE_KEY_SIZE: usize = 64 + SEAL_OVERHEAD;
/// Two 32-byte private keys sealed together: 112 bytes.
pub const SEALED_PROVISIONAL_KEYS_SIZE: usize = 2 * 32 + SEAL_OVERHEAD;

/// A once-sealed 32-byte key.
pub type SealedKey = [u8; SEALED_KEY_SIZE];
/// A twice-sealed 32-byte key.
pub type TwiceSealedKey = [u8; TWICE_SEALED_KEY_SIZE];

use crate::nature::{Nature, NatureKind};

/// Root payload: the trustchain's public signature key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustchainCreation {
    /// Public signature key of the trustchain root.
    pub public_signature_key: [u8; 32],
}

impl TrustchainCreation {
    /// Decode from payload bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            Ok(Self {
                public_signature_key: r.read_array()?,
            })
        })
    }

    /// Encode to payload bytes.
    pub fn serialize(&self) -> Vec<u8> {
        self.public_signature_key.to_vec()
    }
}

/// A decoded block payload, tagged by nature kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Trustchain root.
    TrustchainCreation(TrustchainCreation),
    /// Device creation (any wire version).
    DeviceCreation(DeviceCreation),
    /// Device revocation (any wire version).
    DeviceRevocation(DeviceRevocation),
    /// Key publish to a device.
    KeyPublishToDevice(KeyPublish),
    /// Key publish to a user.
    KeyPublishToUser(KeyPublish),
    /// Key publish to a group.
    KeyPublishToUserGroup(KeyPublish),
    /// Key publish to a provisional user.
    KeyPublishToProvisionalUser(KeyPublishToProvisionalUser),
    /// Group creation (any wire version).
    UserGroupCreation(UserGroupCreation),
    /// Group addition (any wire version).
    UserGroupAddition(UserGroupAddition),
    /// Provisional identity claim.
    ProvisionalIdentityClaim(ProvisionalIdentityClaim),
    /// Recognized nature whose rules a later revision supplies; bytes kept
    /// opaque so the verifier can refuse it without interpretation.
    Opaque(Vec<u8>),
}

impl Payload {
    /// Decode payload bytes under the given nature.
    pub fn deserialize(nature: Nature, data: &[u8]) -> Result<Self> {
        Ok(match nature.kind() {
            NatureKind::TrustchainCreation => {
                Self::TrustchainCreation(TrustchainCreation::deserialize(data)?)
            }
            NatureKind::DeviceCreation => {
                Self::DeviceCreation(DeviceCreation::deserialize(nature, data)?)
            }
            NatureKind::DeviceRevocation => {
                Self::DeviceRevocation(DeviceRevocation::deserialize(nature, data)?)
            }
            NatureKind::KeyPublishToDevice => {
                Self::KeyPublishToDevice(KeyPublish::deserialize(data)?)
            }
            NatureKind::KeyPublishToUser => Self::KeyPublishToUser(KeyPublish::deserialize(data)?),
            NatureKind::KeyPublishToUserGroup => {
                Self::KeyPublishToUserGroup(KeyPublish::deserialize(data)?)
            }
            NatureKind::KeyPublishToProvisionalUser => {
                Self::KeyPublishToProvisionalUser(KeyPublishToProvisionalUser::deserialize(data)?)
            }
            NatureKind::UserGroupCreation => {
                Self::UserGroupCreation(UserGroupCreation::deserialize(nature, data)?)
            }
            NatureKind::UserGroupAddition => {
                Self::UserGroupAddition(UserGroupAddition::deserialize(nature, data)?)
            }
            NatureKind::ProvisionalIdentityClaim => {
                Self::ProvisionalIdentityClaim(ProvisionalIdentityClaim::deserialize(data)?)
            }
            NatureKind::SessionCertificate | NatureKind::UserGroupRemoval => {
                Self::Opaque(data.to_vec())
            }
        })
    }

    /// Encode under the given nature.
    ///
    /// Fails with [`CodecError::InvalidField`] if the payload variant does
    /// not belong to the nature, or lacks fields that nature requires.
    pub fn serialize(&self, nature: Nature) -> Result<Vec<u8>> {
        match (self, nature.kind()) {
            (Self::TrustchainCreation(p), NatureKind::TrustchainCreation) => Ok(p.serialize()),
            (Self::DeviceCreation(p), NatureKind::DeviceCreation) => p.serialize(nature),
            (Self::DeviceRevocation(p), NatureKind::DeviceRevocation) => p.serialize(nature),
            (Self::KeyPublishToDevice(p), NatureKind::KeyPublishToDevice)
            | (Self::KeyPublishToUser(p), NatureKind::KeyPublishToUser)
            | (Self::KeyPublishToUserGroup(p), NatureKind::KeyPublishToUserGroup) => {
                Ok(p.serialize())
            }
            (Self::KeyPublishToProvisionalUser(p), NatureKind::KeyPublishToProvisionalUser) => {
                Ok(p.serialize())
            }
            (Self::UserGroupCreation(p), NatureKind::UserGroupCreation) => p.serialize(nature),
            (Self::UserGroupAddition(p), NatureKind::UserGroupAddition) => p.serialize(nature),
            (Self::ProvisionalIdentityClaim(p), NatureKind::ProvisionalIdentityClaim) => {
                Ok(p.serialize())
            }
            (Self::Opaque(bytes), NatureKind::SessionCertificate)
            | (Self::Opaque(bytes), NatureKind::UserGroupRemoval) => Ok(bytes.clone()),
            _ => Err(CodecError::InvalidField("payload does not match nature")),
        }
    }

    /// The wire version writers emit for this payload.
    pub fn preferred_nature(&self) -> Nature {
        match self {
            Self::TrustchainCreation(_) => Nature::TrustchainCreation,
            Self::DeviceCreation(_) => Nature::DeviceCreationV3,
            Self::DeviceRevocation(_) => Nature::DeviceRevocationV2,
            Self::KeyPublishToDevice(_) => Nature::KeyPublishToDevice,
            Self::KeyPublishToUser(_) => Nature::KeyPublishToUser,
            Self::KeyPublishToUserGroup(_) => Nature::KeyPublishToUserGroup,
            Self::KeyPublishToProvisionalUser(_) => Nature::KeyPublishToProvisionalUser,
            Self::UserGroupCreation(_) => Nature::UserGroupCreationV3,
            Self::UserGroupAddition(_) => Nature::UserGroupAdditionV3,
            Self::ProvisionalIdentityClaim(_) => Nature::ProvisionalIdentityClaim,
            Self::Opaque(_) => Nature::SessionCertificate,
        }
    }
}

pub(crate) fn read_signature(r: &mut Reader<'_>) -> Result<[u8; SIGNATURE_SIZE]> {
    r.read_array()
}
