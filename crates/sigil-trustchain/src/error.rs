//! Verification failure reasons
//!
//! Each rejected entry reports the first rule that failed. Failures on
//! peer entries are recovered locally (the entry is skipped and logged);
//! failures on the session's own writes surface to the caller.

use sigil_blocks::Nature;
use sigil_core::SigilError;

/// The first verification rule an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    /// Block signature does not verify under the author key.
    #[error("invalid_signature")]
    InvalidSignature,
    /// Delegation signature does not verify under the delegating authority.
    #[error("invalid_delegation_signature")]
    InvalidDelegationSignature,
    /// Group self-signature does not verify under the group key.
    #[error("invalid_self_signature")]
    InvalidSelfSignature,
    /// Author is not acceptable for this entry.
    #[error("invalid_author")]
    InvalidAuthor,
    /// Author device was revoked before this entry.
    #[error("revoked_author")]
    RevokedAuthor,
    /// Nature is not valid in this position.
    #[error("invalid_nature")]
    InvalidNature,
    /// Root block failed the trustchain-creation rules.
    #[error("invalid_root_block")]
    InvalidRootBlock,
    /// Root block must be authored by the all-zero id.
    #[error("invalid_author_for_trustchain_creation")]
    InvalidAuthorForTrustchainCreation,
    /// `last_reset` must be all-zero.
    #[error("invalid_last_reset")]
    InvalidLastReset,
    /// Device creation carries a user key that contradicts the known one.
    #[error("invalid_public_user_key")]
    InvalidPublicUserKey,
    /// Rotation does not supersede the current user key.
    #[error("invalid_previous_key")]
    InvalidPreviousKey,
    /// Rotated-in key is malformed or inconsistent.
    #[error("invalid_new_key")]
    InvalidNewKey,
    /// Rotation does not address exactly the remaining devices.
    #[error("missing_user_keys")]
    MissingUserKeys,
    /// Revocation targets an unknown user.
    #[error("invalid_revoked_user")]
    InvalidRevokedUser,
    /// Revocation targets a device the user does not have.
    #[error("invalid_revoked_device")]
    InvalidRevokedDevice,
    /// Revocation targets an already-revoked device.
    #[error("device_already_revoked")]
    DeviceAlreadyRevoked,
    /// Revocation version not allowed for this user's key state.
    #[error("invalid_revocation_version")]
    InvalidRevocationVersion,
    /// Nature version no longer accepted for this user.
    #[error("forbidden")]
    Forbidden,
    /// Group creation collides with an existing, different group.
    #[error("group_already_exists")]
    GroupAlreadyExists,
    /// Addition references an unknown group.
    #[error("invalid_group_id")]
    InvalidGroupId,
    /// Addition does not chain from the group's last block.
    #[error("invalid_previous_group_block")]
    InvalidPreviousGroupBlock,
    /// Key publish addressed to an unknown recipient.
    #[error("invalid_recipient")]
    InvalidRecipient,
    /// Key publish addressed to a superseded user key.
    #[error("invalid_user_public_key")]
    InvalidUserPublicKey,
    /// Wire version contradicts the record contents.
    #[error("version_mismatch")]
    VersionMismatch,
    /// Author id resolves to no known device.
    #[error("unknown_author")]
    UnknownAuthor,
    /// Author lookup failed where an author is mandatory.
    #[error("author_not_found")]
    AuthorNotFound,
}

/// A rejected entry: the offending nature and the first failing rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid block ({nature}): {reason}")]
pub struct VerificationError {
    /// Nature of the rejected entry.
    pub nature: Nature,
    /// First rule that failed.
    pub reason: VerificationFailure,
}

impl VerificationError {
    /// Pair a nature with a failing rule.
    pub fn new(nature: Nature, reason: VerificationFailure) -> Self {
        Self { nature, reason }
    }
}

impl From<VerificationError> for SigilError {
    fn from(err: VerificationError) -> Self {
        SigilError::invalid_block(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formats_nature_and_reason() {
        let err = VerificationError::new(
            Nature::DeviceCreationV3,
            VerificationFailure::InvalidDelegationSignature,
        );
        assert_eq!(
            err.to_string(),
            "invalid block (DeviceCreationV3): invalid_delegation_signature"
        );
    }

    #[test]
    fn test_converts_to_public_taxonomy() {
        let err = VerificationError::new(
            Nature::DeviceRevocationV1,
            VerificationFailure::InvalidRevocationVersion,
        );
        let public = SigilError::from(err);
        assert!(matches!(public, SigilError::InvalidBlock { .. }));
    }
}
