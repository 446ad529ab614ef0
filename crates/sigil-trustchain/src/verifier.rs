//! Trustchain verification rules
//!
//! The verifier promotes unverified entries to verified and applies them to
//! the user, group, and local-user projections. Verification is pure once
//! authors are known: every rule reads only the projections built from
//! previously verified entries.
//!
//! # Ordering
//!
//! Within one user, device entries are processed in strict index order.
//! Across users in a batch, entries are grouped by user id (stable) and one
//! device creation per user is verified per sweep, so a device whose author
//! is another device of the same user always sees its author applied first.
//! Group blocks verify before the key publishes that may reference them.
//!
//! # Failure semantics
//!
//! A rule failure on one entry does not poison the batch: the entry is
//! skipped with a warning and the loop continues. Failures while applying
//! the session's own key material are fatal and propagate.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, warn};

use sigil_blocks::{
    DeviceCreation, DeviceRevocation, Nature, NatureKind, Payload, UserGroupAddition,
    UserGroupCreation,
};
use sigil_core::{DeviceId, GroupId, Result, SigilError, TrustchainId, UserId};
use sigil_crypto::{seal_decrypt, verify_signature, EncryptionKeyPair, SignatureKeyPair};

use crate::entry::Entry;
use crate::error::{VerificationError, VerificationFailure};
use crate::groups::{Group, GroupKeys, GroupStore};
use crate::local_user::{provisional_identity_id, LocalUser};
use crate::users::{Device, UserStore};

/// Outcome of verifying one entry inside a batch.
enum EntryError {
    /// The entry failed a rule; skip it and continue.
    Invalid(VerificationError),
    /// The session's own state could not be updated; abort the batch.
    Fatal(SigilError),
}

impl From<VerificationError> for EntryError {
    fn from(err: VerificationError) -> Self {
        Self::Invalid(err)
    }
}

impl From<SigilError> for EntryError {
    fn from(err: SigilError) -> Self {
        Self::Fatal(err)
    }
}

type EntryResult = std::result::Result<(), EntryError>;

/// Applies the verification rules and maintains the chain projections.
#[derive(Debug)]
pub struct TrustchainVerifier {
    trustchain_id: TrustchainId,
    trustchain_public_key: Option<[u8; 32]>,
    users: UserStore,
    groups: GroupStore,
}

impl TrustchainVerifier {
    /// Create a verifier that has not yet seen the root block.
    pub fn new(trustchain_id: TrustchainId) -> Self {
        Self {
            trustchain_id,
            trustchain_public_key: None,
            users: UserStore::new(),
            groups: GroupStore::new(),
        }
    }

    /// Create a verifier with a known trustchain public key.
    pub fn with_trustchain_public_key(trustchain_id: TrustchainId, key: [u8; 32]) -> Self {
        Self {
            trustchain_id,
            trustchain_public_key: Some(key),
            users: UserStore::new(),
            groups: GroupStore::new(),
        }
    }

    /// The trustchain public key, once the root was applied.
    pub fn trustchain_public_key(&self) -> Option<&[u8; 32]> {
        self.trustchain_public_key.as_ref()
    }

    /// The user projection.
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// The group projection.
    pub fn groups(&self) -> &GroupStore {
        &self.groups
    }

    /// Verify and apply the trustchain-creation block.
    ///
    /// Rules: `index = 1`, nature is trustchain creation, the author is the
    /// all-zero id, the signature is all-zero, and the block hash equals
    /// the trustchain id.
    pub fn apply_root(&mut self, entry: &Entry) -> std::result::Result<(), VerificationError> {
        let fail = |reason| VerificationError::new(entry.nature, reason);
        let Payload::TrustchainCreation(root) = &entry.payload else {
            return Err(fail(VerificationFailure::InvalidNature));
        };
        if entry.index != 1 {
            return Err(fail(VerificationFailure::InvalidRootBlock));
        }
        if entry.author != [0u8; 32] {
            return Err(fail(VerificationFailure::InvalidAuthorForTrustchainCreation));
        }
        if entry.signature != [0u8; 64] {
            return Err(fail(VerificationFailure::InvalidSignature));
        }
        if entry.hash != *self.trustchain_id.as_bytes() {
            return Err(fail(VerificationFailure::InvalidRootBlock));
        }
        self.trustchain_public_key = Some(root.public_signature_key);
        debug!(trustchain_id = %self.trustchain_id, "trustchain root verified");
        Ok(())
    }

    /// Verify a batch of entries and apply them to the projections.
    ///
    /// Returns the verified entries in application order. Invalid peer
    /// entries are skipped with a warning; unknown-rule natures and local
    /// state corruption abort the batch.
    pub fn process_batch(
        &mut self,
        entries: Vec<Entry>,
        local: &mut LocalUser,
    ) -> Result<Vec<Entry>> {
        let mut device_entries = Vec::new();
        let mut group_entries = Vec::new();
        let mut claim_entries = Vec::new();
        let mut publish_entries = Vec::new();

        for entry in entries {
            match entry.nature.kind() {
                NatureKind::DeviceCreation | NatureKind::DeviceRevocation => {
                    device_entries.push(entry);
                }
                NatureKind::UserGroupCreation | NatureKind::UserGroupAddition => {
                    group_entries.push(entry);
                }
                NatureKind::ProvisionalIdentityClaim => claim_entries.push(entry),
                NatureKind::KeyPublishToDevice
                | NatureKind::KeyPublishToUser
                | NatureKind::KeyPublishToUserGroup
                | NatureKind::KeyPublishToProvisionalUser => publish_entries.push(entry),
                NatureKind::TrustchainCreation => {
                    warn!(index = entry.index, "trustchain creation outside root position");
                }
                NatureKind::SessionCertificate | NatureKind::UserGroupRemoval => {
                    return Err(SigilError::upgrade_required(format!(
                        "no verification rules for nature {}",
                        entry.nature
                    )));
                }
            }
        }

        let mut verified = Vec::new();
        self.process_device_entries(device_entries, local, &mut verified)?;

        group_entries.sort_by_key(|entry| entry.index);
        for entry in group_entries {
            self.dispatch(entry, &mut verified, |verifier, entry| {
                verifier.verify_and_apply_group(entry, local)
            })?;
        }

        claim_entries.sort_by_key(|entry| entry.index);
        for entry in claim_entries {
            self.dispatch(entry, &mut verified, Self::verify_claim)?;
        }

        publish_entries.sort_by_key(|entry| entry.index);
        for entry in publish_entries {
            self.dispatch(entry, &mut verified, Self::verify_key_publish)?;
        }

        Ok(verified)
    }

    /// Run one verifier function, recording the entry on success and
    /// warning on a rule failure.
    fn dispatch(
        &mut self,
        entry: Entry,
        verified: &mut Vec<Entry>,
        verify: impl FnOnce(&mut Self, &Entry) -> EntryResult,
    ) -> Result<()> {
        match verify(self, &entry) {
            Ok(()) => {
                verified.push(entry);
                Ok(())
            }
            Err(EntryError::Invalid(err)) => {
                warn!(index = entry.index, %err, "skipping invalid entry");
                Ok(())
            }
            Err(EntryError::Fatal(err)) => Err(err),
        }
    }

    /// Process device creations and revocations, one creation per user per
    /// sweep, each user's queue in index order.
    fn process_device_entries(
        &mut self,
        entries: Vec<Entry>,
        local: &mut LocalUser,
        verified: &mut Vec<Entry>,
    ) -> Result<()> {
        let mut queues: BTreeMap<[u8; 32], VecDeque<Entry>> = BTreeMap::new();
        let mut sorted = entries;
        sorted.sort_by_key(|entry| entry.index);

        // A revocation must queue behind its user's creations even when the
        // target device is only created earlier in this very batch, so map
        // the batch's own device ids (creation hashes) to their users.
        let mut batch_owners: BTreeMap<[u8; 32], [u8; 32]> = BTreeMap::new();
        for entry in &sorted {
            if let Payload::DeviceCreation(creation) = &entry.payload {
                batch_owners.insert(entry.hash, *creation.user_id.as_bytes());
            }
        }

        for entry in sorted {
            let user_key = match &entry.payload {
                Payload::DeviceCreation(creation) => *creation.user_id.as_bytes(),
                Payload::DeviceRevocation(revocation) => self
                    .users
                    .user_by_device(&revocation.device_id)
                    .map(|user| *user.user_id.as_bytes())
                    .or_else(|| batch_owners.get(revocation.device_id.as_bytes()).copied())
                    .or_else(|| batch_owners.get(&entry.author).copied())
                    .unwrap_or(entry.author),
                _ => entry.author,
            };
            queues.entry(user_key).or_default().push_back(entry);
        }

        while !queues.is_empty() {
            let keys: Vec<[u8; 32]> = queues.keys().copied().collect();
            for key in keys {
                let Some(queue) = queues.get_mut(&key) else {
                    continue;
                };
                while let Some(entry) = queue.pop_front() {
                    let is_creation = entry.nature.kind() == NatureKind::DeviceCreation;
                    self.dispatch(entry, verified, |verifier, entry| {
                        verifier.verify_and_apply_device(entry, local)
                    })?;
                    if is_creation {
                        break;
                    }
                }
                if queues.get(&key).is_some_and(|queue| queue.is_empty()) {
                    queues.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn verify_and_apply_device(&mut self, entry: &Entry, local: &mut LocalUser) -> EntryResult {
        match &entry.payload {
            Payload::DeviceCreation(creation) => {
                self.verify_device_creation(entry, creation)?;
                self.apply_device_creation(entry, creation, local);
                Ok(())
            }
            Payload::DeviceRevocation(revocation) => {
                let target_user = self.verify_device_revocation(entry, revocation)?;
                self.apply_device_revocation(entry, revocation, &target_user, local)?;
                Ok(())
            }
            _ => Err(VerificationError::new(entry.nature, VerificationFailure::InvalidNature).into()),
        }
    }

    fn verify_device_creation(
        &self,
        entry: &Entry,
        creation: &DeviceCreation,
    ) -> std::result::Result<(), VerificationError> {
        let fail = |reason| VerificationError::new(entry.nature, reason);

        if creation.last_reset != [0u8; 32] {
            return Err(fail(VerificationFailure::InvalidLastReset));
        }

        let user = self.users.user(&creation.user_id);
        let prior_user_key = user.and_then(|u| u.latest_public_key()).copied();
        if prior_user_key.is_some() && entry.nature != Nature::DeviceCreationV3 {
            return Err(fail(VerificationFailure::Forbidden));
        }

        let delegation_data = creation.delegation_data();
        if entry.author == *self.trustchain_id.as_bytes() {
            let trustchain_key = self
                .trustchain_public_key
                .as_ref()
                .ok_or_else(|| fail(VerificationFailure::AuthorNotFound))?;
            if !verify_signature(&delegation_data, &creation.delegation_signature, trustchain_key)
            {
                return Err(fail(VerificationFailure::InvalidDelegationSignature));
            }
            if !verify_signature(
                &entry.hash,
                &entry.signature,
                &creation.ephemeral_public_signature_key,
            ) {
                return Err(fail(VerificationFailure::InvalidSignature));
            }
            // Root-authored creations may only bootstrap the user's first
            // device; anything else must be an idempotent replay.
            let is_replay = user.is_some_and(|u| u.device(&DeviceId::new(entry.hash)).is_some());
            let is_first = user.map_or(true, |u| u.devices.is_empty());
            if !is_first && !is_replay {
                return Err(fail(VerificationFailure::InvalidAuthor));
            }
        } else {
            let author_id = DeviceId::new(entry.author);
            let author_device = self
                .users
                .device(&author_id)
                .ok_or_else(|| fail(VerificationFailure::UnknownAuthor))?;
            if !verify_signature(
                &delegation_data,
                &creation.delegation_signature,
                &author_device.public_signature_key,
            ) {
                return Err(fail(VerificationFailure::InvalidDelegationSignature));
            }
            if !verify_signature(
                &entry.hash,
                &entry.signature,
                &creation.ephemeral_public_signature_key,
            ) {
                return Err(fail(VerificationFailure::InvalidSignature));
            }
            if author_device.is_revoked_at(entry.index) {
                return Err(fail(VerificationFailure::RevokedAuthor));
            }
            let author_user = self
                .users
                .user_by_device(&author_id)
                .ok_or_else(|| fail(VerificationFailure::AuthorNotFound))?;
            if author_user.user_id != creation.user_id {
                return Err(fail(VerificationFailure::InvalidAuthor));
            }
            if let (Some(prior), Nature::DeviceCreationV3) = (prior_user_key, entry.nature) {
                let carried = creation
                    .user_key_pair
                    .as_ref()
                    .ok_or_else(|| fail(VerificationFailure::InvalidPublicUserKey))?;
                if carried.public_encryption_key != prior {
                    return Err(fail(VerificationFailure::InvalidPublicUserKey));
                }
            }
        }
        Ok(())
    }

    fn apply_device_creation(
        &mut self,
        entry: &Entry,
        creation: &DeviceCreation,
        local: &mut LocalUser,
    ) {
        let device = Device {
            device_id: DeviceId::new(entry.hash),
            public_signature_key: creation.public_signature_key,
            public_encryption_key: creation.public_encryption_key,
            is_ghost_device: creation.is_ghost_device,
            created_at: entry.index,
            revoked_at: None,
        };
        let user_public_key = creation
            .user_key_pair
            .as_ref()
            .map(|pair| (entry.index, pair.public_encryption_key));
        self.users
            .apply_device_creation(creation.user_id, device.clone(), user_public_key);
        if creation.user_id == local.user_id() {
            local.apply_device_creation(device, creation.user_key_pair.as_ref());
        }
    }

    fn verify_device_revocation(
        &self,
        entry: &Entry,
        revocation: &DeviceRevocation,
    ) -> std::result::Result<UserId, EntryError> {
        let fail = |reason| VerificationError::new(entry.nature, reason);

        let author_id = DeviceId::new(entry.author);
        let author_device = self
            .users
            .device(&author_id)
            .ok_or_else(|| fail(VerificationFailure::UnknownAuthor))?;
        if !verify_signature(&entry.hash, &entry.signature, &author_device.public_signature_key) {
            return Err(fail(VerificationFailure::InvalidSignature).into());
        }

        let target_user = self
            .users
            .user_by_device(&revocation.device_id)
            .ok_or_else(|| fail(VerificationFailure::InvalidRevokedUser))?;
        let target_device = target_user
            .device(&revocation.device_id)
            .ok_or_else(|| fail(VerificationFailure::InvalidRevokedDevice))?;
        if target_device.revoked_at.is_some() {
            return Err(fail(VerificationFailure::DeviceAlreadyRevoked).into());
        }

        let author_user = self
            .users
            .user_by_device(&author_id)
            .ok_or_else(|| fail(VerificationFailure::AuthorNotFound))?;
        if author_user.user_id != target_user.user_id {
            return Err(fail(VerificationFailure::InvalidAuthor).into());
        }

        match revocation.user_keys.as_ref() {
            None => {
                if !target_user.user_public_keys.is_empty() {
                    return Err(fail(VerificationFailure::InvalidRevocationVersion).into());
                }
            }
            Some(user_keys) => {
                match target_user.latest_public_key() {
                    Some(latest) => {
                        if user_keys.previous_public_encryption_key != *latest {
                            return Err(fail(VerificationFailure::InvalidPreviousKey).into());
                        }
                    }
                    None => {
                        if user_keys.previous_public_encryption_key != [0u8; 32] {
                            return Err(fail(VerificationFailure::InvalidPreviousKey).into());
                        }
                    }
                }

                let remaining: Vec<DeviceId> = target_user
                    .active_devices_at(entry.index)
                    .filter(|device| device.device_id != revocation.device_id)
                    .map(|device| device.device_id)
                    .collect();
                if user_keys.private_keys.len() != remaining.len() {
                    return Err(fail(VerificationFailure::MissingUserKeys).into());
                }
                for device_id in &remaining {
                    let addressed = user_keys
                        .private_keys
                        .iter()
                        .filter(|key| key.recipient == *device_id)
                        .count();
                    if addressed != 1 {
                        return Err(fail(VerificationFailure::MissingUserKeys).into());
                    }
                }
            }
        }
        Ok(target_user.user_id)
    }

    fn apply_device_revocation(
        &mut self,
        entry: &Entry,
        revocation: &DeviceRevocation,
        target_user: &UserId,
        local: &mut LocalUser,
    ) -> EntryResult {
        let new_public_key = revocation
            .user_keys
            .as_ref()
            .map(|keys| keys.public_encryption_key);
        self.users.apply_device_revocation(
            target_user,
            &revocation.device_id,
            entry.index,
            new_public_key,
        );
        if *target_user == local.user_id() {
            local
                .apply_device_revocation(revocation, entry.index)
                .map_err(EntryError::Fatal)?;
        }
        Ok(())
    }

    fn verify_and_apply_group(&mut self, entry: &Entry, local: &mut LocalUser) -> EntryResult {
        match &entry.payload {
            Payload::UserGroupCreation(creation) => {
                self.verify_group_creation(entry, creation)?;
                self.apply_group_creation(entry, creation, local);
                Ok(())
            }
            Payload::UserGroupAddition(addition) => {
                self.verify_group_addition(entry, addition)?;
                self.apply_group_addition(entry, addition, local);
                Ok(())
            }
            _ => Err(VerificationError::new(entry.nature, VerificationFailure::InvalidNature).into()),
        }
    }

    fn author_device_for(
        &self,
        entry: &Entry,
    ) -> std::result::Result<&Device, VerificationError> {
        let fail = |reason| VerificationError::new(entry.nature, reason);
        let author_device = self
            .users
            .device(&DeviceId::new(entry.author))
            .ok_or_else(|| fail(VerificationFailure::UnknownAuthor))?;
        if !verify_signature(&entry.hash, &entry.signature, &author_device.public_signature_key) {
            return Err(fail(VerificationFailure::InvalidSignature));
        }
        if author_device.is_revoked_at(entry.index) {
            return Err(fail(VerificationFailure::RevokedAuthor));
        }
        Ok(author_device)
    }

    fn verify_group_creation(
        &self,
        entry: &Entry,
        creation: &UserGroupCreation,
    ) -> std::result::Result<(), VerificationError> {
        let fail = |reason| VerificationError::new(entry.nature, reason);
        self.author_device_for(entry)?;

        if !verify_signature(
            &creation.signature_data(entry.nature),
            &creation.self_signature,
            &creation.public_signature_key,
        ) {
            return Err(fail(VerificationFailure::InvalidSelfSignature));
        }

        if let Some(existing) = self.groups.group(&creation.group_id()) {
            if existing.public_encryption_key != creation.public_encryption_key {
                return Err(fail(VerificationFailure::GroupAlreadyExists));
            }
        }
        Ok(())
    }

    fn apply_group_creation(
        &mut self,
        entry: &Entry,
        creation: &UserGroupCreation,
        local: &mut LocalUser,
    ) {
        let group_id = creation.group_id();
        if self.groups.group(&group_id).is_some() {
            // Idempotent replay of an identical creation.
            return;
        }
        self.groups.insert(Group {
            group_id,
            public_signature_key: creation.public_signature_key,
            public_encryption_key: creation.public_encryption_key,
            last_group_block: entry.hash,
            encrypted_private_signature_key: creation.encrypted_group_private_signature_key,
            keys: None,
        });
        self.recover_group_keys(
            &group_id,
            &creation.members,
            &creation.provisional_members,
            local,
        );
    }

    fn verify_group_addition(
        &self,
        entry: &Entry,
        addition: &UserGroupAddition,
    ) -> std::result::Result<(), VerificationError> {
        let fail = |reason| VerificationError::new(entry.nature, reason);
        self.author_device_for(entry)?;

        let group = self
            .groups
            .group(&addition.group_id)
            .ok_or_else(|| fail(VerificationFailure::InvalidGroupId))?;
        if addition.previous_group_block != group.last_group_block {
            return Err(fail(VerificationFailure::InvalidPreviousGroupBlock));
        }
        if !verify_signature(
            &addition.signature_data(entry.nature),
            &addition.self_signature_with_current_key,
            &group.public_signature_key,
        ) {
            return Err(fail(VerificationFailure::InvalidSelfSignature));
        }
        Ok(())
    }

    fn apply_group_addition(
        &mut self,
        entry: &Entry,
        addition: &UserGroupAddition,
        local: &mut LocalUser,
    ) {
        self.groups.advance(&addition.group_id, entry.hash);
        self.recover_group_keys(
            &addition.group_id,
            &addition.members,
            &addition.provisional_members,
            local,
        );
    }

    /// Try to recover a group's private keys from member entries that
    /// address the local user. A failed decryption only logs: the group
    /// stays usable in its external view.
    fn recover_group_keys(
        &mut self,
        group_id: &GroupId,
        members: &[sigil_blocks::GroupMember],
        provisional_members: &[sigil_blocks::GroupProvisionalMember],
        local: &mut LocalUser,
    ) {
        let Some(group) = self.groups.group(group_id) else {
            return;
        };
        if group.keys.is_some() {
            return;
        }
        let expected_public = group.public_encryption_key;
        let sealed_signature_key = group.encrypted_private_signature_key;

        let mut encryption_pair: Option<EncryptionKeyPair> = None;
        for member in members.iter().filter(|m| m.user_id == local.user_id()) {
            let Some(user_key) = local.find_user_key(&member.public_user_encryption_key) else {
                continue;
            };
            match seal_decrypt(&member.encrypted_group_private_encryption_key, user_key) {
                Ok(private) => {
                    if let Ok(private) = <[u8; 32]>::try_from(private.as_slice()) {
                        encryption_pair = Some(EncryptionKeyPair::from_private(&private));
                    }
                }
                Err(err) => warn!(%group_id, %err, "failed to open group key for member"),
            }
        }
        if encryption_pair.is_none() {
            for member in provisional_members {
                let id = provisional_identity_id(
                    &member.app_provisional_signature_key,
                    &member.tanker_provisional_signature_key,
                );
                let Some(pair) = local.provisional_key(&id) else {
                    continue;
                };
                // Sealed to the app key first, then the tanker key.
                let opened = seal_decrypt(
                    &member.encrypted_group_private_encryption_key,
                    &pair.tanker_encryption_pair,
                )
                .and_then(|once| seal_decrypt(&once, &pair.app_encryption_pair));
                match opened {
                    Ok(private) => {
                        if let Ok(private) = <[u8; 32]>::try_from(private.as_slice()) {
                            encryption_pair = Some(EncryptionKeyPair::from_private(&private));
                        }
                    }
                    Err(err) => {
                        warn!(%group_id, %err, "failed to open group key for provisional member");
                    }
                }
            }
        }

        let Some(encryption_pair) = encryption_pair else {
            return;
        };
        if encryption_pair.public != expected_public {
            warn!(%group_id, "recovered group key does not match announced public key");
            return;
        }
        match seal_decrypt(&sealed_signature_key, &encryption_pair) {
            Ok(private) => {
                if let Ok(private) = <[u8; 64]>::try_from(private.as_slice()) {
                    let signature_pair = SignatureKeyPair::from_private(&private);
                    self.groups.set_keys(
                        group_id,
                        GroupKeys {
                            signature_pair,
                            encryption_pair,
                        },
                    );
                }
            }
            Err(err) => warn!(%group_id, %err, "failed to open group signature key"),
        }
    }

    fn verify_claim(&mut self, entry: &Entry) -> EntryResult {
        let fail = |reason| VerificationError::new(entry.nature, reason);
        let Payload::ProvisionalIdentityClaim(claim) = &entry.payload else {
            return Err(fail(VerificationFailure::InvalidNature).into());
        };

        let author_id = DeviceId::new(entry.author);
        let author_device = self
            .users
            .device(&author_id)
            .ok_or_else(|| fail(VerificationFailure::UnknownAuthor))?;
        let author_user = self
            .users
            .user_by_device(&author_id)
            .ok_or_else(|| fail(VerificationFailure::AuthorNotFound))?;
        if author_user.user_id != claim.user_id {
            return Err(fail(VerificationFailure::InvalidAuthor).into());
        }
        if !verify_signature(&entry.hash, &entry.signature, &author_device.public_signature_key) {
            return Err(fail(VerificationFailure::InvalidSignature).into());
        }

        let signature_data = claim.signature_data(&author_id);
        if !verify_signature(
            &signature_data,
            &claim.author_signature_by_app_key,
            &claim.app_provisional_identity_signature_public_key,
        ) {
            return Err(fail(VerificationFailure::InvalidSignature).into());
        }
        if !verify_signature(
            &signature_data,
            &claim.author_signature_by_tanker_key,
            &claim.tanker_provisional_identity_signature_public_key,
        ) {
            return Err(fail(VerificationFailure::InvalidSignature).into());
        }
        Ok(())
    }

    fn verify_key_publish(&mut self, entry: &Entry) -> EntryResult {
        let fail = |reason| VerificationError::new(entry.nature, reason);
        self.author_device_for(entry)?;

        match &entry.payload {
            Payload::KeyPublishToUserGroup(publish) => {
                if self
                    .groups
                    .group_by_encryption_key(&publish.recipient)
                    .is_none()
                {
                    return Err(fail(VerificationFailure::InvalidRecipient).into());
                }
            }
            Payload::KeyPublishToUser(publish) => {
                let user = self
                    .users
                    .user_by_public_key(&publish.recipient)
                    .ok_or_else(|| fail(VerificationFailure::InvalidUserPublicKey))?;
                // Current means current at the publish's index: a later
                // rotation must not invalidate an earlier publish.
                if user.public_key_at(entry.index) != Some(&publish.recipient) {
                    return Err(fail(VerificationFailure::InvalidUserPublicKey).into());
                }
            }
            Payload::KeyPublishToDevice(_) | Payload::KeyPublishToProvisionalUser(_) => {}
            _ => return Err(fail(VerificationFailure::InvalidNature).into()),
        }
        Ok(())
    }
}
