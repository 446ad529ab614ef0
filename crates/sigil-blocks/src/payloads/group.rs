//! User-group creation and addition payloads
//!
//! Both payloads end in a self-signature computed over the canonical
//! concatenation of every preceding field, exactly as laid out on the
//! wire (including list count prefixes). [`UserGroupCreation::signature_data`]
//! and [`UserGroupAddition::signature_data`] produce that buffer.

use sigil_core::serialize::{deserialize_all, Reader, Result, Writer};
use sigil_core::{GroupId, UserId};

use super::{
    read_signature, SealedKey, TwiceSealedKey, SEALED_KEY_SIZE, SEALED_SIGNATURE_KEY_SIZE,
    TWICE_SEALED_KEY_SIZE,
};
use crate::nature::Nature;

/// A registered member of a group: the group private encryption key is
/// sealed to the member's current user public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    /// Member user id.
    pub user_id: UserId,
    /// User public encryption key the group key was sealed to.
    pub public_user_encryption_key: [u8; 32],
    /// Group private encryption key sealed to that user key.
    pub encrypted_group_private_encryption_key: SealedKey,
}

/// A provisional member of a group: the group private encryption key is
/// sealed first to the app key, then to the tanker key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupProvisionalMember {
    /// App-side provisional public signature key.
    pub app_provisional_signature_key: [u8; 32],
    /// Tanker-side provisional public signature key.
    pub tanker_provisional_signature_key: [u8; 32],
    /// Group private encryption key sealed twice (app, then tanker).
    pub encrypted_group_private_encryption_key: TwiceSealedKey,
}

/// Group creation payload, all wire versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroupCreation {
    /// The group's public signature key (also its group id).
    pub public_signature_key: [u8; 32],
    /// The group's public encryption key.
    pub public_encryption_key: [u8; 32],
    /// Group private signature key sealed to the group public encryption key.
    pub encrypted_group_private_signature_key: [u8; SEALED_SIGNATURE_KEY_SIZE],
    /// Registered members.
    pub members: Vec<GroupMember>,
    /// Provisional members (absent on the v1 wire).
    pub provisional_members: Vec<GroupProvisionalMember>,
    /// Signature over [`Self::signature_data`] by the group private
    /// signature key.
    pub self_signature: [u8; 64],
}

impl UserGroupCreation {
    /// Decode under the given group-creation nature.
    pub fn deserialize(nature: Nature, data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            let public_signature_key = r.read_array()?;
            let public_encryption_key = r.read_array()?;
            let encrypted_group_private_signature_key =
                r.read_array::<SEALED_SIGNATURE_KEY_SIZE>()?;
            let members = r.read_list(read_member)?;
            let provisional_members = match nature {
                Nature::UserGroupCreationV1 => Vec::new(),
                _ => r.read_list(read_provisional_member)?,
            };
            let self_signature = read_signature(r)?;
            Ok(Self {
                public_signature_key,
                public_encryption_key,
                encrypted_group_private_signature_key,
                members,
                provisional_members,
                self_signature,
            })
        })
    }

    /// Encode under the given group-creation nature.
    pub fn serialize(&self, nature: Nature) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(512);
        self.write_body(nature, &mut w);
        w.push_bytes(&self.self_signature);
        Ok(w.into_bytes())
    }

    /// The canonical buffer the self-signature covers.
    pub fn signature_data(&self, nature: Nature) -> Vec<u8> {
        let mut w = Writer::with_capacity(512);
        self.write_body(nature, &mut w);
        w.into_bytes()
    }

    fn write_body(&self, nature: Nature, w: &mut Writer) {
        w.push_bytes(&self.public_signature_key);
        w.push_bytes(&self.public_encryption_key);
        w.push_bytes(&self.encrypted_group_private_signature_key);
        write_members(w, &self.members);
        if nature != Nature::UserGroupCreationV1 {
            write_provisional_members(w, &self.provisional_members);
        }
    }

    /// The group id this creation establishes.
    pub fn group_id(&self) -> GroupId {
        GroupId::new(self.public_signature_key)
    }
}

/// Group addition payload, all wire versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroupAddition {
    /// Group being extended.
    pub group_id: GroupId,
    /// Hash of the group's previous block; chains additions.
    pub previous_group_block: [u8; 32],
    /// Members being added.
    pub members: Vec<GroupMember>,
    /// Provisional members being added (absent on the v1 wire).
    pub provisional_members: Vec<GroupProvisionalMember>,
    /// Signature over [`Self::signature_data`] by the group's current
    /// private signature key.
    pub self_signature_with_current_key: [u8; 64],
}

impl UserGroupAddition {
    /// Decode under the given group-addition nature.
    pub fn deserialize(nature: Nature, data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            let group_id = GroupId::new(r.read_array()?);
            let previous_group_block = r.read_array()?;
            let members = r.read_list(read_member)?;
            let provisional_members = match nature {
                Nature::UserGroupAdditionV1 => Vec::new(),
                _ => r.read_list(read_provisional_member)?,
            };
            let self_signature_with_current_key = read_signature(r)?;
            Ok(Self {
                group_id,
                previous_group_block,
                members,
                provisional_members,
                self_signature_with_current_key,
            })
        })
    }

    /// Encode under the given group-addition nature.
    pub fn serialize(&self, nature: Nature) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(512);
        self.write_body(nature, &mut w);
        w.push_bytes(&self.self_signature_with_current_key);
        Ok(w.into_bytes())
    }

    /// The canonical buffer the self-signature covers.
    pub fn signature_data(&self, nature: Nature) -> Vec<u8> {
        let mut w = Writer::with_capacity(512);
        self.write_body(nature, &mut w);
        w.into_bytes()
    }

    fn write_body(&self, nature: Nature, w: &mut Writer) {
        w.push_bytes(self.group_id.as_bytes());
        w.push_bytes(&self.previous_group_block);
        write_members(w, &self.members);
        if nature != Nature::UserGroupAdditionV1 {
            write_provisional_members(w, &self.provisional_members);
        }
    }
}

fn read_member(r: &mut Reader<'_>) -> Result<GroupMember> {
    Ok(GroupMember {
        user_id: UserId::new(r.read_array()?),
        public_user_encryption_key: r.read_array()?,
        encrypted_group_private_encryption_key: r.read_array::<SEALED_KEY_SIZE>()?,
    })
}

fn read_provisional_member(r: &mut Reader<'_>) -> Result<GroupProvisionalMember> {
    Ok(GroupProvisionalMember {
        app_provisional_signature_key: r.read_array()?,
        tanker_provisional_signature_key: r.read_array()?,
        encrypted_group_private_encryption_key: r.read_array::<TWICE_SEALED_KEY_SIZE>()?,
    })
}

fn write_members(w: &mut Writer, members: &[GroupMember]) {
    w.push_list(members, |w, member| {
        w.push_bytes(member.user_id.as_bytes());
        w.push_bytes(&member.public_user_encryption_key);
        w.push_bytes(&member.encrypted_group_private_encryption_key);
    });
}

fn write_provisional_members(w: &mut Writer, members: &[GroupProvisionalMember]) {
    w.push_list(members, |w, member| {
        w.push_bytes(&member.app_provisional_signature_key);
        w.push_bytes(&member.tanker_provisional_signature_key);
        w.push_bytes(&member.encrypted_group_private_encryption_key);
    });
}
