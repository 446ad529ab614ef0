//! The network interface the core consumes
//!
//! The core never transports blocks itself: a host-provided client
//! implements this trait against the real server. Blocks cross the
//! interface as opaque wire bytes; the core decodes and verifies them.

use async_trait::async_trait;

use sigil_core::{DeviceId, Result, UserId};
use sigil_crypto::{EncryptionKeyPair, SignatureKeyPair};

use crate::verification::{Verification, VerificationMethod};

/// A user's block history as served by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHistory {
    /// The trustchain-creation block.
    pub root_block: Vec<u8>,
    /// Every relevant block, in server order.
    pub history_blocks: Vec<Vec<u8>>,
}

/// The operation label a submitted block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOperation {
    /// First device of a user (submitted with the user creation).
    CreateUser,
    /// Additional device.
    CreateDevice,
    /// Device revocation.
    RevokeDevice,
    /// Key publish or group block.
    PushBlock,
    /// Provisional identity claim.
    ClaimProvisionalIdentity,
}

/// The tanker-side half of a provisional identity's keys, fetched from the
/// server after verification.
#[derive(Debug, Clone)]
pub struct TankerProvisionalKeys {
    /// Tanker-side signature key pair.
    pub signature_pair: SignatureKeyPair,
    /// Tanker-side encryption key pair.
    pub encryption_pair: EncryptionKeyPair,
}

/// Network operations the session layer depends on.
#[async_trait]
pub trait TrustchainClient: Send + Sync {
    /// Whether a user is already registered on the trustchain.
    async fn user_exists(&self, user_id: &UserId) -> Result<bool>;

    /// Fetch the root block and the user's block history.
    async fn fetch_user_history(&self, user_id: &UserId) -> Result<BlockHistory>;

    /// Atomically submit a user creation: the ghost-device and
    /// first-device blocks, plus the sealed verification key for later
    /// recovery.
    async fn create_user(
        &self,
        user_id: &UserId,
        blocks: Vec<Vec<u8>>,
        encrypted_verification_key: Vec<u8>,
    ) -> Result<()>;

    /// Submit one block labelled with its operation.
    async fn submit_block(&self, operation: BlockOperation, block: Vec<u8>) -> Result<()>;

    /// Fetch the sealed user key addressed to a ghost device, identified
    /// by its public signature key. Returns the ghost's device id and the
    /// sealed key.
    async fn fetch_encrypted_user_key(
        &self,
        ghost_public_signature_key: &[u8; 32],
    ) -> Result<(DeviceId, Vec<u8>)>;

    /// Fetch the sealed verification key, authenticated by the supplied
    /// verification.
    async fn fetch_encrypted_verification_key(
        &self,
        user_id: &UserId,
        verification: &Verification,
    ) -> Result<Vec<u8>>;

    /// Fetch every provisional-identity claim block addressed to a user.
    async fn fetch_claim_blocks(&self, user_id: &UserId) -> Result<Vec<Vec<u8>>>;

    /// Fetch the tanker-side keys of a provisional identity. `None` when
    /// nothing was ever shared with that identity.
    async fn fetch_provisional_identity_keys(
        &self,
        value: &str,
        verification: Option<&Verification>,
    ) -> Result<Option<TankerProvisionalKeys>>;

    /// Fetch the verification methods registered for a user.
    async fn fetch_verification_methods(&self, user_id: &UserId) -> Result<Vec<VerificationMethod>>;

    /// Register a verification method.
    async fn set_verification_method(
        &self,
        user_id: &UserId,
        method: VerificationMethod,
    ) -> Result<()>;
}
