//! Block generation
//!
//! Constructs signed blocks that will pass verification locally and at the
//! server. The generator is re-entrant and stateless beyond its constructor
//! inputs; the signing authority for each operation is passed explicitly,
//! because the first blocks of a user are authored by the trustchain and
//! the ghost device before any "current device" exists.

use zeroize::Zeroize;

use sigil_blocks::{
    Block, DeviceCreation, DeviceRevocation, GroupMember, GroupProvisionalMember, KeyPublish,
    KeyPublishToProvisionalUser, Nature, NatureKind, Payload, PrivateKeyRecipient,
    ProvisionalIdentityClaim, RevocationUserKeys, SealedUserKeyPair, UserGroupAddition,
    UserGroupCreation, DEVICE_NOT_REVOKED,
};
use sigil_core::{DeviceId, GroupId, ResourceId, Result, SigilError, TrustchainId, UserId};
use sigil_crypto::{seal_encrypt, EncryptionKeyPair, SignatureKeyPair};

use crate::users::User;

/// The device identity a generated block is signed with.
#[derive(Debug, Clone, Copy)]
pub struct BlockAuthor<'a> {
    /// Authoring device id.
    pub device_id: DeviceId,
    /// The device's signature key pair.
    pub signature_pair: &'a SignatureKeyPair,
}

/// A provisional recipient's public key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicProvisionalUser {
    /// App-side public signature key.
    pub app_signature_public_key: [u8; 32],
    /// Tanker-side public signature key.
    pub tanker_signature_public_key: [u8; 32],
    /// App-side public encryption key.
    pub app_encryption_public_key: [u8; 32],
    /// Tanker-side public encryption key.
    pub tanker_encryption_public_key: [u8; 32],
}

/// Result of composing a user-creation block.
#[derive(Debug)]
pub struct NewUser {
    /// Ready-to-submit block.
    pub block: Block,
    /// The freshly generated user encryption key pair.
    pub user_key_pair: EncryptionKeyPair,
    /// The new device's id (the block hash).
    pub device_id: DeviceId,
}

/// Result of composing a device-creation block.
#[derive(Debug)]
pub struct NewDevice {
    /// Ready-to-submit block.
    pub block: Block,
    /// The new device's id (the block hash).
    pub device_id: DeviceId,
}

/// Builds signed trustchain blocks.
#[derive(Debug, Clone)]
pub struct BlockGenerator {
    trustchain_id: TrustchainId,
}

impl BlockGenerator {
    /// Create a generator for one trustchain.
    pub fn new(trustchain_id: TrustchainId) -> Self {
        Self { trustchain_id }
    }

    fn block(
        &self,
        nature: Nature,
        payload: &Payload,
        author: [u8; 32],
        signer: &SignatureKeyPair,
    ) -> Result<Block> {
        let mut block = Block {
            index: 0,
            trustchain_id: self.trustchain_id,
            nature,
            payload: payload.serialize(nature)?,
            author,
            signature: [0; 64],
        };
        block.signature = signer.sign(&block.hash());
        Ok(block)
    }

    /// Compose a user-creation block: a v3 device creation authored by the
    /// trustchain, signed by the identity token's ephemeral key, carrying a
    /// fresh user key sealed to the new device.
    pub fn make_new_user(
        &self,
        user_id: UserId,
        ephemeral_signature_pair: &SignatureKeyPair,
        delegation_signature: [u8; 64],
        device_signature_public: [u8; 32],
        device_encryption_public: [u8; 32],
        is_ghost_device: bool,
    ) -> Result<NewUser> {
        let user_key_pair = EncryptionKeyPair::generate();
        let sealed = seal_to_key(user_key_pair.private.as_bytes(), &device_encryption_public)?;

        let payload = Payload::DeviceCreation(DeviceCreation {
            ephemeral_public_signature_key: ephemeral_signature_pair.public,
            user_id,
            delegation_signature,
            public_signature_key: device_signature_public,
            public_encryption_key: device_encryption_public,
            last_reset: [0; 32],
            user_key_pair: Some(SealedUserKeyPair {
                public_encryption_key: user_key_pair.public,
                encrypted_private_encryption_key: sealed,
            }),
            is_ghost_device,
            revoked: DEVICE_NOT_REVOKED,
        });
        let block = self.block(
            Nature::DeviceCreationV3,
            &payload,
            *self.trustchain_id.as_bytes(),
            ephemeral_signature_pair,
        )?;
        let device_id = DeviceId::new(block.hash());
        Ok(NewUser {
            block,
            user_key_pair,
            device_id,
        })
    }

    /// Compose a device-creation block authored by an existing device.
    ///
    /// A fresh ephemeral key pair signs the block; the author's signature
    /// key signs the delegation over `ephemeral_public ‖ user_id`.
    pub fn make_new_device(
        &self,
        user_id: UserId,
        author: BlockAuthor<'_>,
        user_key_pair: &EncryptionKeyPair,
        device_signature_public: [u8; 32],
        device_encryption_public: [u8; 32],
        is_ghost_device: bool,
    ) -> Result<NewDevice> {
        let ephemeral = SignatureKeyPair::generate();
        let delegation_data =
            DeviceCreation::delegation_signature_data(&ephemeral.public, &user_id);
        let delegation_signature = author.signature_pair.sign(&delegation_data);
        let sealed = seal_to_key(user_key_pair.private.as_bytes(), &device_encryption_public)?;

        let payload = Payload::DeviceCreation(DeviceCreation {
            ephemeral_public_signature_key: ephemeral.public,
            user_id,
            delegation_signature,
            public_signature_key: device_signature_public,
            public_encryption_key: device_encryption_public,
            last_reset: [0; 32],
            user_key_pair: Some(SealedUserKeyPair {
                public_encryption_key: user_key_pair.public,
                encrypted_private_encryption_key: sealed,
            }),
            is_ghost_device,
            revoked: DEVICE_NOT_REVOKED,
        });
        let block = self.block(
            Nature::DeviceCreationV3,
            &payload,
            *author.device_id.as_bytes(),
            &ephemeral,
        )?;
        let device_id = DeviceId::new(block.hash());
        Ok(NewDevice { block, device_id })
    }

    /// Compose a v2 device revocation with user-key rotation.
    ///
    /// The old private key is sealed to the rotated-in public key, and the
    /// new private key is sealed to every remaining device.
    pub fn make_device_revocation(
        &self,
        user: &User,
        current_user_key: &EncryptionKeyPair,
        device_id: DeviceId,
        author: BlockAuthor<'_>,
    ) -> Result<(Block, EncryptionKeyPair)> {
        if user.device(&device_id).is_none() {
            return Err(SigilError::invalid_argument(
                "revoked device does not belong to the user",
            ));
        }

        let new_key_pair = EncryptionKeyPair::generate();
        let encrypted_previous =
            seal_to_key(current_user_key.private.as_bytes(), &new_key_pair.public)?;

        let mut private_keys = Vec::new();
        for device in user.devices.iter().filter(|device| {
            device.revoked_at.is_none() && device.device_id != device_id
        }) {
            private_keys.push(PrivateKeyRecipient {
                recipient: device.device_id,
                encrypted_private_encryption_key: seal_to_key(
                    new_key_pair.private.as_bytes(),
                    &device.public_encryption_key,
                )?,
            });
        }

        let payload = Payload::DeviceRevocation(DeviceRevocation {
            device_id,
            user_keys: Some(RevocationUserKeys {
                public_encryption_key: new_key_pair.public,
                previous_public_encryption_key: current_user_key.public,
                encrypted_previous_encryption_key: encrypted_previous,
                private_keys,
            }),
        });
        let block = self.block(
            Nature::DeviceRevocationV2,
            &payload,
            *author.device_id.as_bytes(),
            author.signature_pair,
        )?;
        Ok((block, new_key_pair))
    }

    /// Compose a key publish to a device, user, or group.
    pub fn make_key_publish(
        &self,
        author: BlockAuthor<'_>,
        recipient_encryption_public: [u8; 32],
        resource_key: &[u8; 32],
        resource_id: ResourceId,
        kind: NatureKind,
    ) -> Result<Block> {
        let publish = KeyPublish {
            recipient: recipient_encryption_public,
            resource_id,
            encrypted_resource_key: seal_to_key(resource_key, &recipient_encryption_public)?,
        };
        let payload = match kind {
            NatureKind::KeyPublishToDevice => Payload::KeyPublishToDevice(publish),
            NatureKind::KeyPublishToUser => Payload::KeyPublishToUser(publish),
            NatureKind::KeyPublishToUserGroup => Payload::KeyPublishToUserGroup(publish),
            _ => {
                return Err(SigilError::invalid_argument(
                    "key publish kind must address a device, user, or group",
                ))
            }
        };
        self.block(
            kind.preferred_nature(),
            &payload,
            *author.device_id.as_bytes(),
            author.signature_pair,
        )
    }

    /// Compose a key publish to a provisional user: the resource key is
    /// sealed to the app key, then the result to the tanker key.
    pub fn make_key_publish_to_provisional_user(
        &self,
        author: BlockAuthor<'_>,
        provisional: &PublicProvisionalUser,
        resource_key: &[u8; 32],
        resource_id: ResourceId,
    ) -> Result<Block> {
        let once = seal_encrypt(resource_key, &provisional.app_encryption_public_key);
        let twice = seal_encrypt(&once, &provisional.tanker_encryption_public_key);
        let twice_sealed = twice.try_into().map_err(|_| {
            SigilError::internal("twice-sealed resource key has unexpected length")
        })?;

        let payload = Payload::KeyPublishToProvisionalUser(KeyPublishToProvisionalUser {
            app_public_signature_key: provisional.app_signature_public_key,
            tanker_public_signature_key: provisional.tanker_signature_public_key,
            resource_id,
            twice_encrypted_resource_key: twice_sealed,
        });
        self.block(
            Nature::KeyPublishToProvisionalUser,
            &payload,
            *author.device_id.as_bytes(),
            author.signature_pair,
        )
    }

    /// Compose a group creation: the group private signature key sealed to
    /// the group public encryption key, the group private encryption key
    /// sealed once per member and twice per provisional member, the whole
    /// body self-signed with the group private signature key.
    pub fn create_user_group(
        &self,
        author: BlockAuthor<'_>,
        group_signature_pair: &SignatureKeyPair,
        group_encryption_pair: &EncryptionKeyPair,
        members: &[(UserId, [u8; 32])],
        provisional_members: &[PublicProvisionalUser],
    ) -> Result<Block> {
        let sealed_signature_key = seal_encrypt(
            group_signature_pair.private.as_bytes(),
            &group_encryption_pair.public,
        );
        let encrypted_group_private_signature_key = sealed_signature_key
            .try_into()
            .map_err(|_| SigilError::internal("sealed group signature key has unexpected length"))?;

        let mut creation = UserGroupCreation {
            public_signature_key: group_signature_pair.public,
            public_encryption_key: group_encryption_pair.public,
            encrypted_group_private_signature_key,
            members: seal_group_key_to_members(group_encryption_pair, members)?,
            provisional_members: seal_group_key_to_provisional_members(
                group_encryption_pair,
                provisional_members,
            )?,
            self_signature: [0; 64],
        };
        creation.self_signature =
            group_signature_pair.sign(&creation.signature_data(Nature::UserGroupCreationV3));

        self.block(
            Nature::UserGroupCreationV3,
            &Payload::UserGroupCreation(creation),
            *author.device_id.as_bytes(),
            author.signature_pair,
        )
    }

    /// Compose a group addition chained to the group's last block and
    /// self-signed with the current group private signature key.
    #[allow(clippy::too_many_arguments)]
    pub fn add_to_user_group(
        &self,
        author: BlockAuthor<'_>,
        group_id: GroupId,
        group_signature_pair: &SignatureKeyPair,
        previous_group_block: [u8; 32],
        group_encryption_pair: &EncryptionKeyPair,
        members: &[(UserId, [u8; 32])],
        provisional_members: &[PublicProvisionalUser],
    ) -> Result<Block> {
        let mut addition = UserGroupAddition {
            group_id,
            previous_group_block,
            members: seal_group_key_to_members(group_encryption_pair, members)?,
            provisional_members: seal_group_key_to_provisional_members(
                group_encryption_pair,
                provisional_members,
            )?,
            self_signature_with_current_key: [0; 64],
        };
        addition.self_signature_with_current_key =
            group_signature_pair.sign(&addition.signature_data(Nature::UserGroupAdditionV3));

        self.block(
            Nature::UserGroupAdditionV3,
            &Payload::UserGroupAddition(addition),
            *author.device_id.as_bytes(),
            author.signature_pair,
        )
    }

    /// Compose a provisional-identity claim: proof signatures by both
    /// provisional keys, both private encryption keys sealed to the user's
    /// current public key.
    #[allow(clippy::too_many_arguments)]
    pub fn make_provisional_identity_claim(
        &self,
        author: BlockAuthor<'_>,
        user_id: UserId,
        user_public_key: [u8; 32],
        app_signature_pair: &SignatureKeyPair,
        tanker_signature_pair: &SignatureKeyPair,
        app_encryption_pair: &EncryptionKeyPair,
        tanker_encryption_pair: &EncryptionKeyPair,
    ) -> Result<Block> {
        let mut signature_data = [0u8; 96];
        signature_data[..32].copy_from_slice(author.device_id.as_bytes());
        signature_data[32..64].copy_from_slice(&app_signature_pair.public);
        signature_data[64..].copy_from_slice(&tanker_signature_pair.public);

        let mut both_private = [0u8; 64];
        both_private[..32].copy_from_slice(app_encryption_pair.private.as_bytes());
        both_private[32..].copy_from_slice(tanker_encryption_pair.private.as_bytes());
        let sealed = seal_encrypt(&both_private, &user_public_key);
        both_private.zeroize();
        let encrypted_provisional_identity_private_keys = sealed
            .try_into()
            .map_err(|_| SigilError::internal("sealed provisional keys have unexpected length"))?;

        let payload = Payload::ProvisionalIdentityClaim(ProvisionalIdentityClaim {
            user_id,
            app_provisional_identity_signature_public_key: app_signature_pair.public,
            tanker_provisional_identity_signature_public_key: tanker_signature_pair.public,
            author_signature_by_app_key: app_signature_pair.sign(&signature_data),
            author_signature_by_tanker_key: tanker_signature_pair.sign(&signature_data),
            recipient_user_public_key: user_public_key,
            encrypted_provisional_identity_private_keys,
        });
        self.block(
            Nature::ProvisionalIdentityClaim,
            &payload,
            *author.device_id.as_bytes(),
            author.signature_pair,
        )
    }
}

fn seal_to_key(private: &[u8; 32], recipient_public: &[u8; 32]) -> Result<[u8; 80]> {
    seal_encrypt(private, recipient_public)
        .try_into()
        .map_err(|_| SigilError::internal("sealed key has unexpected length"))
}

fn seal_group_key_to_members(
    group_encryption_pair: &EncryptionKeyPair,
    members: &[(UserId, [u8; 32])],
) -> Result<Vec<GroupMember>> {
    members
        .iter()
        .map(|(user_id, public_user_encryption_key)| {
            Ok(GroupMember {
                user_id: *user_id,
                public_user_encryption_key: *public_user_encryption_key,
                encrypted_group_private_encryption_key: seal_to_key(
                    group_encryption_pair.private.as_bytes(),
                    public_user_encryption_key,
                )?,
            })
        })
        .collect()
}

fn seal_group_key_to_provisional_members(
    group_encryption_pair: &EncryptionKeyPair,
    members: &[PublicProvisionalUser],
) -> Result<Vec<GroupProvisionalMember>> {
    members
        .iter()
        .map(|member| {
            let once = seal_encrypt(
                group_encryption_pair.private.as_bytes(),
                &member.app_encryption_public_key,
            );
            let twice = seal_encrypt(&once, &member.tanker_encryption_public_key);
            let sealed = twice.try_into().map_err(|_| {
                SigilError::internal("twice-sealed group key has unexpected length")
            })?;
            Ok(GroupProvisionalMember {
                app_provisional_signature_key: member.app_signature_public_key,
                tanker_provisional_signature_key: member.tanker_signature_public_key,
                encrypted_group_private_encryption_key: sealed,
            })
        })
        .collect()
}
