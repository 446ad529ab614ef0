//! Local-user manager
//!
//! Owns the session: the key safe, the local user model, and the
//! operations that mutate them. All verification state belongs to one
//! logical session; operations are serialized behind a session lock, and a
//! second caller racing an in-flight mutation fails with `Busy` instead of
//! queueing.
//!
//! Startup status:
//!
//! ```text
//! INIT ── safe has a device id ──────────────────────→ READY
//! INIT ── no device id, server knows the user ───────→ VERIFICATION_NEEDED
//! INIT ── no device id, server does not know them ───→ REGISTRATION_NEEDED
//! ```

use std::sync::Arc;

use async_lock::Mutex;
use tracing::{debug, info};

use sigil_blocks::Block;
use sigil_core::{DeviceId, Result, SigilError};
use sigil_crypto::{
    seal_decrypt, symmetric_decrypt_v1, symmetric_encrypt_v1, EncryptionKeyPair, SignatureKeyPair,
};
use sigil_store::{KeySafe, KeySafeStorage, RecordStore};
use sigil_trustchain::{BlockAuthor, BlockGenerator, LocalUser, User};

use crate::client::{BlockOperation, TrustchainClient};
use crate::identity::{
    ghost_device_to_verification_key, verification_key_to_ghost_device, SecretIdentity,
};
use crate::verification::Verification;

/// Session status after opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A device exists; the session is usable.
    Ready,
    /// The user is not registered on the trustchain yet.
    IdentityRegistrationNeeded,
    /// The user exists but this device does not; identity verification is
    /// required to create one.
    IdentityVerificationNeeded,
}

pub(crate) struct SessionState {
    pub(crate) local: LocalUser,
    pub(crate) status: Status,
}

/// Orchestrates registration, device management, and refresh for one
/// session.
pub struct LocalUserManager {
    pub(crate) client: Arc<dyn TrustchainClient>,
    pub(crate) safe_storage: KeySafeStorage,
    pub(crate) generator: BlockGenerator,
    pub(crate) identity: SecretIdentity,
    pub(crate) state: Arc<Mutex<SessionState>>,
}

impl LocalUserManager {
    /// Open a session: load (or create) the key safe, restore the local
    /// user, and determine the startup status.
    pub async fn open(
        client: Arc<dyn TrustchainClient>,
        store: Arc<dyn RecordStore>,
        identity: SecretIdentity,
    ) -> Result<Self> {
        let safe_storage = KeySafeStorage::new(store);
        let safe = safe_storage.load_or_create(&identity.user_secret).await?;

        let mut local = LocalUser::new(
            identity.trustchain_id,
            identity.user_id,
            identity.user_secret,
        );
        safe.apply_to_local_user(&mut local)?;

        let status = if local.device_id().is_some() {
            debug!(user_id = %identity.user_id, "device found in safe, authenticating");
            Status::Ready
        } else if client.user_exists(&identity.user_id).await? {
            Status::IdentityVerificationNeeded
        } else {
            Status::IdentityRegistrationNeeded
        };
        info!(user_id = %identity.user_id, ?status, "session opened");

        Ok(Self {
            client,
            safe_storage,
            generator: BlockGenerator::new(identity.trustchain_id),
            identity,
            state: Arc::new(Mutex::new(SessionState { local, status })),
        })
    }

    /// The current session status.
    pub async fn status(&self) -> Status {
        self.state.lock().await.status
    }

    /// Run a read-only closure against the local user.
    pub async fn with_local_user<R>(&self, read: impl FnOnce(&LocalUser) -> R) -> Result<R> {
        let guard = self
            .state
            .try_lock()
            .ok_or_else(|| SigilError::busy("a session operation is in flight"))?;
        Ok(read(&guard.local))
    }

    /// Register the user: compose the ghost-device and first-device
    /// blocks, store the sealed verification key, submit atomically, and
    /// refresh.
    pub async fn create_user(&self, verification: &Verification) -> Result<()> {
        let mut guard = self
            .state
            .try_lock()
            .ok_or_else(|| SigilError::busy("a session operation is in flight"))?;
        if guard.status != Status::IdentityRegistrationNeeded {
            return Err(SigilError::precondition_failed(
                "create_user requires registration-needed status",
            ));
        }

        // The ghost device either comes from a user-supplied verification
        // key or is generated fresh.
        let (ghost_signature_pair, ghost_encryption_pair) = match verification {
            Verification::VerificationKey(token) => verification_key_to_ghost_device(token)?,
            _ => (SignatureKeyPair::generate(), EncryptionKeyPair::generate()),
        };

        let ephemeral = self.identity.ephemeral_signature_pair();
        let new_user = self.generator.make_new_user(
            self.identity.user_id,
            &ephemeral,
            self.identity.delegation_token.delegation_signature,
            ghost_signature_pair.public,
            ghost_encryption_pair.public,
            true,
        )?;

        let device_signature_pair = SignatureKeyPair::generate();
        let device_encryption_pair = EncryptionKeyPair::generate();
        let new_device = self.generator.make_new_device(
            self.identity.user_id,
            BlockAuthor {
                device_id: new_user.device_id,
                signature_pair: &ghost_signature_pair,
            },
            &new_user.user_key_pair,
            device_signature_pair.public,
            device_encryption_pair.public,
            false,
        )?;

        let verification_key =
            ghost_device_to_verification_key(&ghost_signature_pair, &ghost_encryption_pair)?;
        let encrypted_verification_key =
            symmetric_encrypt_v1(&self.identity.user_secret, verification_key.as_bytes());

        self.client
            .create_user(
                &self.identity.user_id,
                vec![new_user.block.serialize(), new_device.block.serialize()],
                encrypted_verification_key,
            )
            .await?;
        if !matches!(verification, Verification::VerificationKey(_)) {
            self.client
                .set_verification_method(&self.identity.user_id, verification.method())
                .await?;
        }

        guard.local.set_device_identity(
            new_device.device_id,
            device_signature_pair,
            device_encryption_pair,
        );
        self.refresh_locked(&mut guard.local).await?;
        guard.status = Status::Ready;
        info!(user_id = %self.identity.user_id, "user registered");
        Ok(())
    }

    /// Create a new device for an existing user: recover the ghost device
    /// from the verification key, fetch and open the user key addressed to
    /// it, compose a device block authored by the ghost, submit, refresh.
    pub async fn create_new_device(&self, verification: &Verification) -> Result<()> {
        let mut guard = self
            .state
            .try_lock()
            .ok_or_else(|| SigilError::busy("a session operation is in flight"))?;
        if guard.status != Status::IdentityVerificationNeeded {
            return Err(SigilError::precondition_failed(
                "create_new_device requires verification-needed status",
            ));
        }

        let verification_key = match verification {
            Verification::VerificationKey(token) => token.clone(),
            _ => {
                let sealed = self
                    .client
                    .fetch_encrypted_verification_key(&self.identity.user_id, verification)
                    .await?;
                let plain = symmetric_decrypt_v1(&self.identity.user_secret, &sealed)
                    .map_err(SigilError::from)?;
                String::from_utf8(plain).map_err(|_| {
                    SigilError::invalid_verification("recovered verification key is not text")
                })?
            }
        };
        let (ghost_signature_pair, ghost_encryption_pair) =
            verification_key_to_ghost_device(&verification_key)?;

        let (ghost_device_id, sealed_user_key) = self
            .client
            .fetch_encrypted_user_key(&ghost_signature_pair.public)
            .await?;
        let user_private = seal_decrypt(&sealed_user_key, &ghost_encryption_pair)
            .map_err(SigilError::from)?;
        let user_private: [u8; 32] = user_private
            .as_slice()
            .try_into()
            .map_err(|_| SigilError::decryption_failed("user key has unexpected length"))?;
        let user_key_pair = EncryptionKeyPair::from_private(&user_private);

        let device_signature_pair = SignatureKeyPair::generate();
        let device_encryption_pair = EncryptionKeyPair::generate();
        let new_device = self.generator.make_new_device(
            self.identity.user_id,
            BlockAuthor {
                device_id: ghost_device_id,
                signature_pair: &ghost_signature_pair,
            },
            &user_key_pair,
            device_signature_pair.public,
            device_encryption_pair.public,
            false,
        )?;

        self.client
            .submit_block(BlockOperation::CreateDevice, new_device.block.serialize())
            .await?;

        guard.local.set_device_identity(
            new_device.device_id,
            device_signature_pair,
            device_encryption_pair,
        );
        self.refresh_locked(&mut guard.local).await?;
        guard.status = Status::Ready;
        info!(user_id = %self.identity.user_id, "device created");
        Ok(())
    }

    /// Revoke one of the user's devices, rotating the user key.
    pub async fn revoke_device(&self, device_id: DeviceId) -> Result<()> {
        let mut guard = self
            .state
            .try_lock()
            .ok_or_else(|| SigilError::busy("a session operation is in flight"))?;
        if guard.status != Status::Ready {
            return Err(SigilError::precondition_failed(
                "revoke_device requires an open device",
            ));
        }

        self.refresh_locked(&mut guard.local).await?;

        let target = guard
            .local
            .devices()
            .iter()
            .find(|device| device.device_id == device_id)
            .ok_or_else(|| SigilError::precondition_failed("unknown device"))?;
        if target.revoked_at.is_some() {
            return Err(SigilError::precondition_failed("device is already revoked"));
        }

        let user = User {
            user_id: self.identity.user_id,
            devices: guard.local.devices().to_vec(),
            user_public_keys: Vec::new(),
        };
        let current_user_key = guard
            .local
            .current_user_key()
            .cloned()
            .ok_or_else(|| SigilError::precondition_failed("user has no key history"))?;
        let author_device_id = guard
            .local
            .device_id()
            .ok_or_else(|| SigilError::precondition_failed("session has no device"))?;
        let author_signature_pair = guard
            .local
            .device_signature_pair()
            .cloned()
            .ok_or_else(|| SigilError::precondition_failed("session has no device keys"))?;

        let (block, _new_key) = self.generator.make_device_revocation(
            &user,
            &current_user_key,
            device_id,
            BlockAuthor {
                device_id: author_device_id,
                signature_pair: &author_signature_pair,
            },
        )?;
        self.client
            .submit_block(BlockOperation::RevokeDevice, block.serialize())
            .await?;

        self.refresh_locked(&mut guard.local).await?;
        info!(%device_id, "device revoked");
        Ok(())
    }

    /// Re-fetch the user's block history, verify it, and persist the
    /// resulting state.
    pub async fn refresh_local_user(&self) -> Result<()> {
        let mut guard = self
            .state
            .try_lock()
            .ok_or_else(|| SigilError::busy("a session operation is in flight"))?;
        self.refresh_locked(&mut guard.local).await
    }

    pub(crate) async fn refresh_locked(&self, local: &mut LocalUser) -> Result<()> {
        let history = self.client.fetch_user_history(&self.identity.user_id).await?;
        let root = Block::deserialize(&history.root_block)?;
        let mut blocks = Vec::with_capacity(history.history_blocks.len());
        for bytes in &history.history_blocks {
            blocks.push(Block::deserialize(bytes)?);
        }
        local.initialize_with_blocks(&root, &blocks)?;
        self.save_locked(local).await
    }

    pub(crate) async fn save_locked(&self, local: &LocalUser) -> Result<()> {
        let safe = KeySafe::from_local_user(local);
        self.safe_storage
            .save(&self.identity.user_secret, &safe)
            .await
    }

    /// Close the session: persist the safe and drop every private key
    /// buffer, zeroizing on the way out.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        self.save_locked(&guard.local).await?;
        // Dropping the local user zeroizes the user secret and, through
        // their own drops, every private key it holds.
        guard.local = LocalUser::new(
            self.identity.trustchain_id,
            self.identity.user_id,
            [0u8; 32],
        );
        guard.status = Status::IdentityVerificationNeeded;
        debug!(user_id = %self.identity.user_id, "session closed");
        Ok(())
    }
}

impl std::fmt::Debug for LocalUserManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUserManager")
            .field("user_id", &self.identity.user_id)
            .finish_non_exhaustive()
    }
}
