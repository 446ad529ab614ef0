//! Round-trip coverage for every assigned nature

use sigil_blocks::{
    Block, DeviceCreation, DeviceRevocation, GroupMember, GroupProvisionalMember, KeyPublish,
    KeyPublishToProvisionalUser, Nature, Payload, PrivateKeyRecipient, ProvisionalIdentityClaim,
    RevocationUserKeys, SealedUserKeyPair, TrustchainCreation, UserGroupAddition,
    UserGroupCreation, DEVICE_NOT_REVOKED, SEALED_KEY_SIZE, SEALED_PROVISIONAL_KEYS_SIZE,
    SEALED_SIGNATURE_KEY_SIZE, TWICE_SEALED_KEY_SIZE,
};
use sigil_core::{DeviceId, GroupId, ResourceId, TrustchainId, UserId};

fn sample_payload(nature: Nature) -> Payload {
    match nature {
        Nature::TrustchainCreation => Payload::TrustchainCreation(TrustchainCreation {
            public_signature_key: [1; 32],
        }),
        Nature::DeviceCreationV1 | Nature::DeviceCreationV2 | Nature::DeviceCreationV3 => {
            Payload::DeviceCreation(DeviceCreation {
                ephemeral_public_signature_key: [1; 32],
                user_id: UserId::new([2; 32]),
                delegation_signature: [3; 64],
                public_signature_key: [4; 32],
                public_encryption_key: [5; 32],
                last_reset: [0; 32],
                user_key_pair: (nature == Nature::DeviceCreationV3).then(|| SealedUserKeyPair {
                    public_encryption_key: [6; 32],
                    encrypted_private_encryption_key: [7; SEALED_KEY_SIZE],
                }),
                is_ghost_device: false,
                revoked: DEVICE_NOT_REVOKED,
            })
        }
        Nature::DeviceRevocationV1 | Nature::DeviceRevocationV2 => {
            Payload::DeviceRevocation(DeviceRevocation {
                device_id: DeviceId::new([1; 32]),
                user_keys: (nature == Nature::DeviceRevocationV2).then(|| RevocationUserKeys {
                    public_encryption_key: [2; 32],
                    previous_public_encryption_key: [3; 32],
                    encrypted_previous_encryption_key: [4; SEALED_KEY_SIZE],
                    private_keys: vec![PrivateKeyRecipient {
                        recipient: DeviceId::new([5; 32]),
                        encrypted_private_encryption_key: [6; SEALED_KEY_SIZE],
                    }],
                }),
            })
        }
        Nature::KeyPublishToDevice => Payload::KeyPublishToDevice(sample_key_publish()),
        Nature::KeyPublishToUser => Payload::KeyPublishToUser(sample_key_publish()),
        Nature::KeyPublishToUserGroup => Payload::KeyPublishToUserGroup(sample_key_publish()),
        Nature::KeyPublishToProvisionalUser => {
            Payload::KeyPublishToProvisionalUser(KeyPublishToProvisionalUser {
                app_public_signature_key: [1; 32],
                tanker_public_signature_key: [2; 32],
                resource_id: ResourceId::new([3; 32]),
                twice_encrypted_resource_key: [4; TWICE_SEALED_KEY_SIZE],
            })
        }
        Nature::UserGroupCreationV1 | Nature::UserGroupCreationV2 | Nature::UserGroupCreationV3 => {
            Payload::UserGroupCreation(UserGroupCreation {
                public_signature_key: [1; 32],
                public_encryption_key: [2; 32],
                encrypted_group_private_signature_key: [3; SEALED_SIGNATURE_KEY_SIZE],
                members: vec![GroupMember {
                    user_id: UserId::new([4; 32]),
                    public_user_encryption_key: [5; 32],
                    encrypted_group_private_encryption_key: [6; SEALED_KEY_SIZE],
                }],
                provisional_members: if nature == Nature::UserGroupCreationV1 {
                    Vec::new()
                } else {
                    vec![sample_provisional_member()]
                },
                self_signature: [8; 64],
            })
        }
        Nature::UserGroupAdditionV1 | Nature::UserGroupAdditionV2 | Nature::UserGroupAdditionV3 => {
            Payload::UserGroupAddition(UserGroupAddition {
                group_id: GroupId::new([1; 32]),
                previous_group_block: [2; 32],
                members: vec![GroupMember {
                    user_id: UserId::new([3; 32]),
                    public_user_encryption_key: [4; 32],
                    encrypted_group_private_encryption_key: [5; SEALED_KEY_SIZE],
                }],
                provisional_members: if nature == Nature::UserGroupAdditionV1 {
                    Vec::new()
                } else {
                    vec![sample_provisional_member()]
                },
                self_signature_with_current_key: [7; 64],
            })
        }
        Nature::ProvisionalIdentityClaim => {
            Payload::ProvisionalIdentityClaim(ProvisionalIdentityClaim {
                user_id: UserId::new([1; 32]),
                app_provisional_identity_signature_public_key: [2; 32],
                tanker_provisional_identity_signature_public_key: [3; 32],
                author_signature_by_app_key: [4; 64],
                author_signature_by_tanker_key: [5; 64],
                recipient_user_public_key: [6; 32],
                encrypted_provisional_identity_private_keys: [7; SEALED_PROVISIONAL_KEYS_SIZE],
            })
        }
        Nature::SessionCertificate | Nature::UserGroupRemoval => {
            Payload::Opaque(vec![0xaa; 40])
        }
    }
}

fn sample_key_publish() -> KeyPublish {
    KeyPublish {
        recipient: [1; 32],
        resource_id: ResourceId::new([2; 32]),
        encrypted_resource_key: [3; SEALED_KEY_SIZE],
    }
}

fn sample_provisional_member() -> GroupProvisionalMember {
    GroupProvisionalMember {
        app_provisional_signature_key: [7; 32],
        tanker_provisional_signature_key: [8; 32],
        encrypted_group_private_encryption_key: [9; TWICE_SEALED_KEY_SIZE],
    }
}

#[test]
fn every_nature_round_trips() {
    for &nature in Nature::all() {
        let payload = sample_payload(nature);
        let bytes = payload.serialize(nature).unwrap();
        let decoded = Payload::deserialize(nature, &bytes).unwrap();
        assert_eq!(decoded, payload, "payload round trip for {nature}");
    }
}

#[test]
fn every_nature_round_trips_inside_a_block() {
    for &nature in Nature::all() {
        let payload = sample_payload(nature);
        let block = Block {
            index: 3,
            trustchain_id: TrustchainId::new([0xcc; 32]),
            nature,
            payload: payload.serialize(nature).unwrap(),
            author: [0xdd; 32],
            signature: [0xee; 64],
        };
        let decoded = Block::deserialize(&block.serialize()).unwrap();
        assert_eq!(decoded, block, "block round trip for {nature}");
        assert_eq!(decoded.hash(), block.hash());
    }
}

proptest::proptest! {
    #[test]
    fn prop_key_publish_round_trips(
        recipient in proptest::array::uniform32(proptest::prelude::any::<u8>()),
        resource in proptest::array::uniform32(proptest::prelude::any::<u8>()),
    ) {
        let record = KeyPublish {
            recipient,
            resource_id: ResourceId::new(resource),
            encrypted_resource_key: [9; SEALED_KEY_SIZE],
        };
        let bytes = record.serialize();
        proptest::prop_assert_eq!(KeyPublish::deserialize(&bytes).unwrap(), record);
    }

    #[test]
    fn prop_device_creation_revoked_field_round_trips(revoked in proptest::prelude::any::<u64>()) {
        let Payload::DeviceCreation(mut record) = sample_payload(Nature::DeviceCreationV3) else {
            panic!("device creation sample");
        };
        record.revoked = revoked;
        let bytes = record.serialize(Nature::DeviceCreationV3).unwrap();
        let decoded = DeviceCreation::deserialize(Nature::DeviceCreationV3, &bytes).unwrap();
        proptest::prop_assert_eq!(decoded, record);
    }
}

#[test]
fn block_hash_is_stable_across_reserialization() {
    let payload = sample_payload(Nature::DeviceCreationV3);
    let block = Block {
        index: 1,
        trustchain_id: TrustchainId::new([0x11; 32]),
        nature: Nature::DeviceCreationV3,
        payload: payload.serialize(Nature::DeviceCreationV3).unwrap(),
        author: [0x22; 32],
        signature: [0x33; 64],
    };
    let reparsed = Block::deserialize(&block.serialize()).unwrap();
    assert_eq!(block.hash(), reparsed.hash());
}
