//! The session's own user
//!
//! [`LocalUser`] materializes the current user from a replay of verified
//! blocks: its devices, the user-key history with private halves where a
//! block addressed them to this device, and the provisional key pairs
//! adopted through claims. It also signs new blocks with the device keys.
//!
//! # Invariants
//!
//! - `user_keys` is chronological; the current key is last.
//! - A private user key is only ever recovered from a block sealed to this
//!   device; generations this device cannot decrypt are absent.
//! - Replaying the same verified history twice leaves the state unchanged.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zeroize::Zeroize;

use sigil_blocks::{
    Block, DeviceRevocation, Nature, Payload, ProvisionalIdentityClaim, SealedUserKeyPair,
};
use sigil_core::{DeviceId, Result, SigilError, TrustchainId, UserId};
use sigil_crypto::{seal_decrypt, EncryptionKeyPair, SignatureKeyPair};

use crate::entry::Entry;
use crate::users::Device;
use crate::verifier::TrustchainVerifier;

/// The two encryption key pairs attached to one provisional identity.
#[derive(Debug, Clone)]
pub struct ProvisionalUserKeyPair {
    /// App-side encryption key pair.
    pub app_encryption_pair: EncryptionKeyPair,
    /// Tanker-side encryption key pair.
    pub tanker_encryption_pair: EncryptionKeyPair,
}

/// Map key for a provisional identity: base64 of the concatenated app and
/// tanker public signature keys.
pub fn provisional_identity_id(
    app_public_signature_key: &[u8; 32],
    tanker_public_signature_key: &[u8; 32],
) -> String {
    let mut concatenated = [0u8; 64];
    concatenated[..32].copy_from_slice(app_public_signature_key);
    concatenated[32..].copy_from_slice(tanker_public_signature_key);
    BASE64.encode(concatenated)
}

/// In-memory model of the session's user.
pub struct LocalUser {
    trustchain_id: TrustchainId,
    user_id: UserId,
    user_secret: [u8; 32],
    device_id: Option<DeviceId>,
    device_signature_pair: Option<SignatureKeyPair>,
    device_encryption_pair: Option<EncryptionKeyPair>,
    devices: Vec<Device>,
    user_keys: Vec<EncryptionKeyPair>,
    user_key_index: HashMap<[u8; 32], usize>,
    provisional_user_keys: HashMap<String, ProvisionalUserKeyPair>,
    trustchain_public_key: Option<[u8; 32]>,
}

impl LocalUser {
    /// Create an empty local user for a session.
    pub fn new(trustchain_id: TrustchainId, user_id: UserId, user_secret: [u8; 32]) -> Self {
        Self {
            trustchain_id,
            user_id,
            user_secret,
            device_id: None,
            device_signature_pair: None,
            device_encryption_pair: None,
            devices: Vec::new(),
            user_keys: Vec::new(),
            user_key_index: HashMap::new(),
            provisional_user_keys: HashMap::new(),
            trustchain_public_key: None,
        }
    }

    /// The trustchain this user lives on.
    pub fn trustchain_id(&self) -> TrustchainId {
        self.trustchain_id
    }

    /// This user's id.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The user secret the key safe is sealed under.
    pub fn user_secret(&self) -> &[u8; 32] {
        &self.user_secret
    }

    /// This session's device id, once a device exists.
    pub fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    /// This session's device signature key pair.
    pub fn device_signature_pair(&self) -> Option<&SignatureKeyPair> {
        self.device_signature_pair.as_ref()
    }

    /// This session's device encryption key pair.
    pub fn device_encryption_pair(&self) -> Option<&EncryptionKeyPair> {
        self.device_encryption_pair.as_ref()
    }

    /// Every known device of this user.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Replace the device list (restoring from the key safe).
    pub fn set_devices(&mut self, devices: Vec<Device>) {
        self.devices = devices;
    }

    /// The trustchain public signature key, once the root was verified.
    pub fn trustchain_public_key(&self) -> Option<&[u8; 32]> {
        self.trustchain_public_key.as_ref()
    }

    /// Record the trustchain public key (from the verified root block).
    pub fn set_trustchain_public_key(&mut self, key: [u8; 32]) {
        self.trustchain_public_key = Some(key);
    }

    /// Install this session's device identity.
    pub fn set_device_identity(
        &mut self,
        device_id: DeviceId,
        signature_pair: SignatureKeyPair,
        encryption_pair: EncryptionKeyPair,
    ) {
        self.device_id = Some(device_id);
        self.device_signature_pair = Some(signature_pair);
        self.device_encryption_pair = Some(encryption_pair);
    }

    /// The user-key history, chronological.
    pub fn user_keys(&self) -> &[EncryptionKeyPair] {
        &self.user_keys
    }

    /// The current user key pair.
    pub fn current_user_key(&self) -> Option<&EncryptionKeyPair> {
        self.user_keys.last()
    }

    /// O(1) lookup of a user key generation by its public key.
    pub fn find_user_key(&self, public_key: &[u8; 32]) -> Option<&EncryptionKeyPair> {
        self.user_key_index
            .get(public_key)
            .map(|&at| &self.user_keys[at])
    }

    /// Append a user key generation if its public key is not yet known.
    pub fn add_user_key(&mut self, pair: EncryptionKeyPair) {
        if self.user_key_index.contains_key(&pair.public) {
            return;
        }
        self.user_key_index.insert(pair.public, self.user_keys.len());
        self.user_keys.push(pair);
    }

    /// All adopted provisional key pairs, keyed by
    /// [`provisional_identity_id`].
    pub fn provisional_user_keys(&self) -> &HashMap<String, ProvisionalUserKeyPair> {
        &self.provisional_user_keys
    }

    /// Look up an adopted provisional key pair.
    pub fn provisional_key(&self, id: &str) -> Option<&ProvisionalUserKeyPair> {
        self.provisional_user_keys.get(id)
    }

    /// Store an adopted provisional key pair.
    pub fn add_provisional_key(&mut self, id: String, pair: ProvisionalUserKeyPair) {
        self.provisional_user_keys.insert(id, pair);
    }

    /// Verify the root block and replay a block history into this state.
    ///
    /// Device identity and provisional keys are preserved; the device list
    /// and user-key history are rebuilt from the replay, which makes the
    /// call idempotent across re-initialization.
    pub fn initialize_with_blocks(&mut self, root: &Block, histories: &[Block]) -> Result<()> {
        self.devices.clear();
        self.user_keys.clear();
        self.user_key_index.clear();

        let mut verifier = TrustchainVerifier::new(self.trustchain_id);
        let root_entry = Entry::from_block(root)?;
        verifier.apply_root(&root_entry).map_err(SigilError::from)?;
        self.trustchain_public_key = verifier.trustchain_public_key().copied();

        let mut entries = Vec::with_capacity(histories.len());
        for block in histories {
            entries.push(Entry::from_block(block)?);
        }
        entries.sort_by_key(|entry| entry.index);
        verifier.process_batch(entries, self)?;
        Ok(())
    }

    /// Record a verified device creation for this user.
    pub(crate) fn apply_device_creation(
        &mut self,
        device: Device,
        sealed_user_key: Option<&SealedUserKeyPair>,
    ) {
        if self.devices.iter().any(|d| d.device_id == device.device_id) {
            return;
        }
        let is_ours = self.device_id == Some(device.device_id);
        self.devices.push(device);

        // A v3 creation for this very device hands us the user key.
        if let (true, Some(sealed), Some(encryption_pair)) =
            (is_ours, sealed_user_key, self.device_encryption_pair.as_ref())
        {
            if let Ok(private) = seal_decrypt(
                &sealed.encrypted_private_encryption_key,
                encryption_pair,
            ) {
                if let Ok(private) = <[u8; 32]>::try_from(private.as_slice()) {
                    self.add_user_key(EncryptionKeyPair::from_private(&private));
                }
            }
        }
    }

    /// Record a verified device revocation for this user.
    ///
    /// Rotates the local user-key history when the new private key was
    /// sealed to this device.
    pub(crate) fn apply_device_revocation(
        &mut self,
        revocation: &DeviceRevocation,
        index: u64,
    ) -> Result<()> {
        if let Some(device) = self
            .devices
            .iter_mut()
            .find(|d| d.device_id == revocation.device_id)
        {
            device.revoked_at = Some(index);
        }

        let Some(user_keys) = revocation.user_keys.as_ref() else {
            return Ok(());
        };
        let (Some(our_id), Some(encryption_pair)) =
            (self.device_id, self.device_encryption_pair.as_ref())
        else {
            return Ok(());
        };
        let Some(addressed) = user_keys
            .private_keys
            .iter()
            .find(|key| key.recipient == our_id)
        else {
            return Ok(());
        };

        let mut private = seal_decrypt(
            &addressed.encrypted_private_encryption_key,
            encryption_pair,
        )
        .map_err(SigilError::from)?;
        let private_key = <[u8; 32]>::try_from(private.as_slice())
            .map_err(|_| SigilError::internal("rotated user key has wrong length"))?;
        private.zeroize();

        let pair = EncryptionKeyPair::from_private(&private_key);
        if pair.public != user_keys.public_encryption_key {
            return Err(SigilError::internal(
                "rotated user key does not match announced public key",
            ));
        }
        self.add_user_key(pair);
        Ok(())
    }

    /// Decrypt a verified provisional-identity claim addressed to this user
    /// and adopt the provisional key pairs.
    pub fn apply_provisional_identity_claim(
        &mut self,
        claim: &ProvisionalIdentityClaim,
    ) -> Result<ProvisionalUserKeyPair> {
        let user_key = self
            .find_user_key(&claim.recipient_user_public_key)
            .ok_or_else(|| {
                SigilError::precondition_failed(
                    "missing user key for provisional identity claim",
                )
            })?;

        let mut plain = seal_decrypt(
            &claim.encrypted_provisional_identity_private_keys,
            user_key,
        )
        .map_err(SigilError::from)?;
        if plain.len() != 64 {
            plain.zeroize();
            return Err(SigilError::internal(
                "claim does not carry two private encryption keys",
            ));
        }
        let mut app_private = [0u8; 32];
        let mut tanker_private = [0u8; 32];
        app_private.copy_from_slice(&plain[..32]);
        tanker_private.copy_from_slice(&plain[32..]);
        plain.zeroize();

        let pair = ProvisionalUserKeyPair {
            app_encryption_pair: EncryptionKeyPair::from_private(&app_private),
            tanker_encryption_pair: EncryptionKeyPair::from_private(&tanker_private),
        };
        app_private.zeroize();
        tanker_private.zeroize();

        let id = provisional_identity_id(
            &claim.app_provisional_identity_signature_public_key,
            &claim.tanker_provisional_identity_signature_public_key,
        );
        self.provisional_user_keys.insert(id, pair.clone());
        Ok(pair)
    }

    /// Serialize and sign a payload with this device's keys.
    ///
    /// The index is left at zero; the server assigns the real one, and the
    /// block hash does not cover it.
    pub fn make_block(&self, payload: &Payload, nature: Nature) -> Result<Block> {
        let device_id = self.device_id.ok_or_else(|| {
            SigilError::precondition_failed("cannot sign a block without a device")
        })?;
        let signature_pair = self.device_signature_pair.as_ref().ok_or_else(|| {
            SigilError::precondition_failed("cannot sign a block without device keys")
        })?;

        let mut block = Block {
            index: 0,
            trustchain_id: self.trustchain_id,
            nature,
            payload: payload.serialize(nature)?,
            author: *device_id.as_bytes(),
            signature: [0; 64],
        };
        block.signature = signature_pair.sign(&block.hash());
        Ok(block)
    }
}

impl Drop for LocalUser {
    fn drop(&mut self) {
        self.user_secret.zeroize();
    }
}

impl std::fmt::Debug for LocalUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUser")
            .field("trustchain_id", &self.trustchain_id)
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("devices", &self.devices.len())
            .field("user_keys", &self.user_keys.len())
            .finish_non_exhaustive()
    }
}
