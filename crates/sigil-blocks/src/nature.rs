//! Block nature taxonomy
//!
//! Natures are integers assigned once and never reused. Gaps in the table
//! (5, 20) are withdrawn versions; decoding them fails with
//! [`CodecError::UnknownNature`]. Several wire versions can share one
//! [`NatureKind`]; writers emit the preferred version for each kind.

use sigil_core::serialize::{CodecError, Result};

/// One on-wire block nature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nature {
    /// Root block of a trustchain (1).
    TrustchainCreation,
    /// Device creation, first version (2).
    DeviceCreationV1,
    /// Resource key shared to a device (3).
    KeyPublishToDevice,
    /// Device revocation without user-key rotation (4).
    DeviceRevocationV1,
    /// Device creation with reset marker (6).
    DeviceCreationV2,
    /// Device creation carrying the sealed user key (7, preferred).
    DeviceCreationV3,
    /// Resource key shared to a user (8).
    KeyPublishToUser,
    /// Device revocation with user-key rotation (9, preferred).
    DeviceRevocationV2,
    /// Group creation, first version (10).
    UserGroupCreationV1,
    /// Resource key shared to a group (11).
    KeyPublishToUserGroup,
    /// Group addition, first version (12).
    UserGroupAdditionV1,
    /// Resource key shared to a provisional user (13).
    KeyPublishToProvisionalUser,
    /// Claim of a provisional identity by a registered user (14).
    ProvisionalIdentityClaim,
    /// Group creation with provisional members (15).
    UserGroupCreationV2,
    /// Group addition with provisional members (16).
    UserGroupAdditionV2,
    /// Group creation, current wire version (17, preferred).
    UserGroupCreationV3,
    /// Group addition, current wire version (18, preferred).
    UserGroupAdditionV3,
    /// Session certificate (19); recognized, rules not yet specified.
    SessionCertificate,
    /// Group member removal (21); recognized, rules not yet specified.
    UserGroupRemoval,
}

/// The semantic kind behind one or more wire natures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NatureKind {
    /// Root block of a trustchain.
    TrustchainCreation,
    /// Device creation.
    DeviceCreation,
    /// Device revocation.
    DeviceRevocation,
    /// Resource key shared to a device.
    KeyPublishToDevice,
    /// Resource key shared to a user.
    KeyPublishToUser,
    /// Resource key shared to a group.
    KeyPublishToUserGroup,
    /// Resource key shared to a provisional user.
    KeyPublishToProvisionalUser,
    /// Group creation.
    UserGroupCreation,
    /// Group addition.
    UserGroupAddition,
    /// Provisional identity claim.
    ProvisionalIdentityClaim,
    /// Session certificate.
    SessionCertificate,
    /// Group member removal.
    UserGroupRemoval,
}

impl Nature {
    /// The integer this nature is assigned on the wire.
    pub fn wire_value(self) -> u64 {
        match self {
            Self::TrustchainCreation => 1,
            Self::DeviceCreationV1 => 2,
            Self::KeyPublishToDevice => 3,
            Self::DeviceRevocationV1 => 4,
            Self::DeviceCreationV2 => 6,
            Self::DeviceCreationV3 => 7,
            Self::KeyPublishToUser => 8,
            Self::DeviceRevocationV2 => 9,
            Self::UserGroupCreationV1 => 10,
            Self::KeyPublishToUserGroup => 11,
            Self::UserGroupAdditionV1 => 12,
            Self::KeyPublishToProvisionalUser => 13,
            Self::ProvisionalIdentityClaim => 14,
            Self::UserGroupCreationV2 => 15,
            Self::UserGroupAdditionV2 => 16,
            Self::UserGroupCreationV3 => 17,
            Self::UserGroupAdditionV3 => 18,
            Self::SessionCertificate => 19,
            Self::UserGroupRemoval => 21,
        }
    }

    /// Decode a wire integer, rejecting unassigned values.
    pub fn from_wire(value: u64) -> Result<Self> {
        Ok(match value {
            1 => Self::TrustchainCreation,
            2 => Self::DeviceCreationV1,
            3 => Self::KeyPublishToDevice,
            4 => Self::DeviceRevocationV1,
            6 => Self::DeviceCreationV2,
            7 => Self::DeviceCreationV3,
            8 => Self::KeyPublishToUser,
            9 => Self::DeviceRevocationV2,
            10 => Self::UserGroupCreationV1,
            11 => Self::KeyPublishToUserGroup,
            12 => Self::UserGroupAdditionV1,
            13 => Self::KeyPublishToProvisionalUser,
            14 => Self::ProvisionalIdentityClaim,
            15 => Self::UserGroupCreationV2,
            16 => Self::UserGroupAdditionV2,
            17 => Self::UserGroupCreationV3,
            18 => Self::UserGroupAdditionV3,
            19 => Self::SessionCertificate,
            21 => Self::UserGroupRemoval,
            other => return Err(CodecError::UnknownNature(other)),
        })
    }

    /// The semantic kind of this nature.
    pub fn kind(self) -> NatureKind {
        match self {
            Self::TrustchainCreation => NatureKind::TrustchainCreation,
            Self::DeviceCreationV1 | Self::DeviceCreationV2 | Self::DeviceCreationV3 => {
                NatureKind::DeviceCreation
            }
            Self::DeviceRevocationV1 | Self::DeviceRevocationV2 => NatureKind::DeviceRevocation,
            Self::KeyPublishToDevice => NatureKind::KeyPublishToDevice,
            Self::KeyPublishToUser => NatureKind::KeyPublishToUser,
            Self::KeyPublishToUserGroup => NatureKind::KeyPublishToUserGroup,
            Self::KeyPublishToProvisionalUser => NatureKind::KeyPublishToProvisionalUser,
            Self::UserGroupCreationV1 | Self::UserGroupCreationV2 | Self::UserGroupCreationV3 => {
                NatureKind::UserGroupCreation
            }
            Self::UserGroupAdditionV1 | Self::UserGroupAdditionV2 | Self::UserGroupAdditionV3 => {
                NatureKind::UserGroupAddition
            }
            Self::ProvisionalIdentityClaim => NatureKind::ProvisionalIdentityClaim,
            Self::SessionCertificate => NatureKind::SessionCertificate,
            Self::UserGroupRemoval => NatureKind::UserGroupRemoval,
        }
    }

    /// Every nature known to this build, in wire order.
    pub fn all() -> &'static [Nature] {
        &[
            Self::TrustchainCreation,
            Self::DeviceCreationV1,
            Self::KeyPublishToDevice,
            Self::DeviceRevocationV1,
            Self::DeviceCreationV2,
            Self::DeviceCreationV3,
            Self::KeyPublishToUser,
            Self::DeviceRevocationV2,
            Self::UserGroupCreationV1,
            Self::KeyPublishToUserGroup,
            Self::UserGroupAdditionV1,
            Self::KeyPublishToProvisionalUser,
            Self::ProvisionalIdentityClaim,
            Self::UserGroupCreationV2,
            Self::UserGroupAdditionV2,
            Self::UserGroupCreationV3,
            Self::UserGroupAdditionV3,
            Self::SessionCertificate,
            Self::UserGroupRemoval,
        ]
    }
}

impl NatureKind {
    /// The wire version writers emit for this kind.
    pub fn preferred_nature(self) -> Nature {
        match self {
            Self::TrustchainCreation => Nature::TrustchainCreation,
            Self::DeviceCreation => Nature::DeviceCreationV3,
            Self::DeviceRevocation => Nature::DeviceRevocationV2,
            Self::KeyPublishToDevice => Nature::KeyPublishToDevice,
            Self::KeyPublishToUser => Nature::KeyPublishToUser,
            Self::KeyPublishToUserGroup => Nature::KeyPublishToUserGroup,
            Self::KeyPublishToProvisionalUser => Nature::KeyPublishToProvisionalUser,
            Self::UserGroupCreation => Nature::UserGroupCreationV3,
            Self::UserGroupAddition => Nature::UserGroupAdditionV3,
            Self::ProvisionalIdentityClaim => Nature::ProvisionalIdentityClaim,
            Self::SessionCertificate => Nature::SessionCertificate,
            Self::UserGroupRemoval => Nature::UserGroupRemoval,
        }
    }
}

impl std::fmt::Display for Nature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_round_trip_for_all_natures() {
        for &nature in Nature::all() {
            assert_eq!(Nature::from_wire(nature.wire_value()).unwrap(), nature);
        }
    }

    #[test]
    fn test_withdrawn_values_rejected() {
        assert_eq!(Nature::from_wire(0), Err(CodecError::UnknownNature(0)));
        assert_eq!(Nature::from_wire(5), Err(CodecError::UnknownNature(5)));
        assert_eq!(Nature::from_wire(20), Err(CodecError::UnknownNature(20)));
        assert_eq!(Nature::from_wire(22), Err(CodecError::UnknownNature(22)));
    }

    #[test]
    fn test_preferred_version_is_newest() {
        assert_eq!(
            NatureKind::DeviceCreation.preferred_nature(),
            Nature::DeviceCreationV3
        );
        assert_eq!(
            NatureKind::UserGroupCreation.preferred_nature(),
            Nature::UserGroupCreationV3
        );
        assert_eq!(
            NatureKind::DeviceRevocation.preferred_nature(),
            Nature::DeviceRevocationV2
        );
    }

    #[test]
    fn test_kind_partition() {
        assert_eq!(Nature::DeviceCreationV1.kind(), NatureKind::DeviceCreation);
        assert_eq!(Nature::DeviceCreationV3.kind(), NatureKind::DeviceCreation);
        assert_eq!(
            Nature::UserGroupAdditionV2.kind(),
            NatureKind::UserGroupAddition
        );
        // Preferred version of a kind maps back to that kind.
        for &nature in Nature::all() {
            assert_eq!(nature.kind().preferred_nature().kind(), nature.kind());
        }
    }
}
