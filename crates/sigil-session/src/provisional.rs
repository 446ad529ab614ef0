//! Provisional-identity manager
//!
//! A provisional identity lets content be shared with a user before they
//! register. Once registered, the user adopts the pre-shared keys by
//! claiming the identity: a claim block proves possession of both
//! provisional signature keys and hands the private encryption keys to the
//! user sealed under their current user key.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

use sigil_blocks::Payload;
use sigil_core::{DeviceId, Result, SigilError};
use sigil_crypto::verify_signature;
use sigil_trustchain::{
    provisional_identity_id, BlockAuthor, Entry, LocalUser, ProvisionalUserKeyPair,
};

use crate::client::{BlockOperation, TankerProvisionalKeys};
use crate::identity::SecretProvisionalIdentity;
use crate::manager::{LocalUserManager, Status};
use crate::verification::{Verification, VerificationMethod};

/// Outcome of attaching a provisional identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachResult {
    /// The provisional keys are available; nothing further to do.
    Attached,
    /// The identity must be verified first, with the given method.
    VerificationNeeded(VerificationMethod),
}

/// Attaches, verifies, and refreshes provisional identities for a session.
pub struct ProvisionalIdentityManager {
    manager: LocalUserManager,
}

impl ProvisionalIdentityManager {
    /// Share the session of a local-user manager.
    pub fn new(manager: &LocalUserManager) -> Self {
        Self {
            manager: LocalUserManager {
                client: manager.client.clone(),
                safe_storage: manager.safe_storage.clone(),
                generator: manager.generator.clone(),
                identity: manager.identity.clone(),
                state: manager.state.clone(),
            },
        }
    }

    /// Attach a provisional identity to the current user.
    ///
    /// Returns [`AttachResult::Attached`] when the keys are already in the
    /// safe or recoverable from existing claims; composes a claim right
    /// away when the identity's target is a verified method of this user;
    /// otherwise reports which verification is needed.
    pub async fn attach(&self, provisional: &SecretProvisionalIdentity) -> Result<AttachResult> {
        let mut guard = self
            .manager
            .state
            .try_lock()
            .ok_or_else(|| SigilError::busy("a session operation is in flight"))?;
        if guard.status != Status::Ready {
            return Err(SigilError::precondition_failed(
                "attach requires an open device",
            ));
        }

        self.refresh_claims_locked(&mut guard.local).await?;
        if has_keys_for_app(&guard.local, &provisional.app_signature_pair.public) {
            return Ok(AttachResult::Attached);
        }

        let methods = self
            .manager
            .client
            .fetch_verification_methods(&self.manager.identity.user_id)
            .await?;
        let target_is_verified = provisional.target == "email"
            && methods.iter().any(|method| {
                matches!(method, VerificationMethod::Email { email } if *email == provisional.value)
            });
        if target_is_verified {
            match self
                .manager
                .client
                .fetch_provisional_identity_keys(&provisional.value, None)
                .await?
            {
                Some(tanker) => {
                    self.claim_locked(&mut guard.local, provisional, &tanker).await?;
                }
                None => {
                    debug!(value = %provisional.value, "nothing was shared with this identity");
                }
            }
            return Ok(AttachResult::Attached);
        }

        Ok(AttachResult::VerificationNeeded(VerificationMethod::Email {
            email: provisional.value.clone(),
        }))
    }

    /// Verify possession of the provisional identity's target and claim it.
    pub async fn verify_provisional_identity(
        &self,
        provisional: &SecretProvisionalIdentity,
        verification: &Verification,
    ) -> Result<()> {
        let mut guard = self
            .manager
            .state
            .try_lock()
            .ok_or_else(|| SigilError::busy("a session operation is in flight"))?;
        if guard.status != Status::Ready {
            return Err(SigilError::precondition_failed(
                "verify requires an open device",
            ));
        }

        let matches_target = matches!(
            verification,
            Verification::EmailCode { email, .. }
                if provisional.target == "email" && *email == provisional.value
        );
        if !matches_target {
            return Err(SigilError::invalid_argument(
                "verification does not match the provisional identity",
            ));
        }

        let tanker = self
            .manager
            .client
            .fetch_provisional_identity_keys(&provisional.value, Some(verification))
            .await?
            .ok_or_else(|| {
                SigilError::invalid_verification("no provisional keys for this identity")
            })?;
        self.claim_locked(&mut guard.local, provisional, &tanker).await
    }

    /// Fetch all claim blocks addressed to this user and adopt any keys
    /// not yet in the safe. A no-op on the safe when everything is known.
    pub async fn refresh_provisional_private_keys(&self) -> Result<()> {
        let mut guard = self
            .manager
            .state
            .try_lock()
            .ok_or_else(|| SigilError::busy("a session operation is in flight"))?;
        self.refresh_claims_locked(&mut guard.local).await
    }

    async fn claim_locked(
        &self,
        local: &mut LocalUser,
        provisional: &SecretProvisionalIdentity,
        tanker: &TankerProvisionalKeys,
    ) -> Result<()> {
        let author_device_id = local
            .device_id()
            .ok_or_else(|| SigilError::precondition_failed("session has no device"))?;
        let author_signature_pair = local
            .device_signature_pair()
            .cloned()
            .ok_or_else(|| SigilError::precondition_failed("session has no device keys"))?;
        let user_public_key = local
            .current_user_key()
            .ok_or_else(|| SigilError::precondition_failed("user has no key history"))?
            .public;

        let block = self.manager.generator.make_provisional_identity_claim(
            BlockAuthor {
                device_id: author_device_id,
                signature_pair: &author_signature_pair,
            },
            self.manager.identity.user_id,
            user_public_key,
            &provisional.app_signature_pair,
            &tanker.signature_pair,
            &provisional.app_encryption_pair,
            &tanker.encryption_pair,
        )?;
        self.manager
            .client
            .submit_block(BlockOperation::ClaimProvisionalIdentity, block.serialize())
            .await?;

        let id = provisional_identity_id(
            &provisional.app_signature_pair.public,
            &tanker.signature_pair.public,
        );
        local.add_provisional_key(
            id,
            ProvisionalUserKeyPair {
                app_encryption_pair: provisional.app_encryption_pair.clone(),
                tanker_encryption_pair: tanker.encryption_pair.clone(),
            },
        );
        self.manager.save_locked(local).await?;
        debug!(value = %provisional.value, "provisional identity claimed");
        Ok(())
    }

    async fn refresh_claims_locked(&self, local: &mut LocalUser) -> Result<()> {
        let blocks = self
            .manager
            .client
            .fetch_claim_blocks(&self.manager.identity.user_id)
            .await?;

        let mut changed = false;
        for bytes in blocks {
            let entry = Entry::from_bytes(&bytes)?;
            let Payload::ProvisionalIdentityClaim(claim) = &entry.payload else {
                warn!(index = entry.index, "claim fetch returned a non-claim block");
                continue;
            };
            if claim.user_id != self.manager.identity.user_id {
                continue;
            }

            // The claim was authored by one of this user's devices.
            let author_id = DeviceId::new(entry.author);
            let Some(author) = local
                .devices()
                .iter()
                .find(|device| device.device_id == author_id)
            else {
                warn!(index = entry.index, "claim authored by an unknown device");
                continue;
            };
            if !verify_signature(&entry.hash, &entry.signature, &author.public_signature_key) {
                warn!(index = entry.index, "claim block signature is invalid");
                continue;
            }
            let signature_data = claim.signature_data(&author_id);
            if !verify_signature(
                &signature_data,
                &claim.author_signature_by_app_key,
                &claim.app_provisional_identity_signature_public_key,
            ) || !verify_signature(
                &signature_data,
                &claim.author_signature_by_tanker_key,
                &claim.tanker_provisional_identity_signature_public_key,
            ) {
                warn!(index = entry.index, "claim proof signatures are invalid");
                continue;
            }

            let id = provisional_identity_id(
                &claim.app_provisional_identity_signature_public_key,
                &claim.tanker_provisional_identity_signature_public_key,
            );
            if local.provisional_key(&id).is_some() {
                continue;
            }
            match local.apply_provisional_identity_claim(claim) {
                Ok(_) => changed = true,
                Err(err) => warn!(index = entry.index, %err, "could not open claim"),
            }
        }

        if changed {
            self.manager.save_locked(local).await?;
        }
        Ok(())
    }
}

fn has_keys_for_app(local: &LocalUser, app_public_signature_key: &[u8; 32]) -> bool {
    local.provisional_user_keys().keys().any(|id| {
        BASE64
            .decode(id)
            .ok()
            .map_or(false, |bytes| bytes.len() == 64 && bytes[..32] == app_public_signature_key[..])
    })
}

impl std::fmt::Debug for ProvisionalIdentityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionalIdentityManager").finish_non_exhaustive()
    }
}
