//! Group projections
//!
//! Groups are identified by their public signature key. The external view
//! (what any verifier tracks) is the key material and the hash of the last
//! group block; the internal view adds the group's private keys, recovered
//! when the local user is among the sealed recipients.

use std::collections::HashMap;

use sigil_core::GroupId;
use sigil_crypto::{EncryptionKeyPair, SignatureKeyPair};

/// Private key material of a group the local user belongs to.
#[derive(Debug, Clone)]
pub struct GroupKeys {
    /// Group signature key pair.
    pub signature_pair: SignatureKeyPair,
    /// Group encryption key pair.
    pub encryption_pair: EncryptionKeyPair,
}

/// One group as seen on the chain.
#[derive(Debug, Clone)]
pub struct Group {
    /// The group id (its public signature key).
    pub group_id: GroupId,
    /// Public signature key.
    pub public_signature_key: [u8; 32],
    /// Public encryption key.
    pub public_encryption_key: [u8; 32],
    /// Hash of the group's most recent block; additions chain from it.
    pub last_group_block: [u8; 32],
    /// Group private signature key sealed to the group public encryption
    /// key, kept from the creation block so a member added later can still
    /// recover the full key set.
    pub encrypted_private_signature_key: [u8; 112],
    /// Private keys, present when the local user has access.
    pub keys: Option<GroupKeys>,
}

/// In-memory projection of every group seen on the chain.
#[derive(Debug, Default)]
pub struct GroupStore {
    groups: HashMap<GroupId, Group>,
    by_encryption_key: HashMap<[u8; 32], GroupId>,
}

impl GroupStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a group by id.
    pub fn group(&self, group_id: &GroupId) -> Option<&Group> {
        self.groups.get(group_id)
    }

    /// Look up a group by its public encryption key.
    pub fn group_by_encryption_key(&self, key: &[u8; 32]) -> Option<&Group> {
        self.by_encryption_key
            .get(key)
            .and_then(|group_id| self.groups.get(group_id))
    }

    /// Insert a newly created group.
    pub fn insert(&mut self, group: Group) {
        self.by_encryption_key
            .insert(group.public_encryption_key, group.group_id);
        self.groups.insert(group.group_id, group);
    }

    /// Advance a group's last-block pointer after a verified addition.
    pub fn advance(&mut self, group_id: &GroupId, last_group_block: [u8; 32]) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group.last_group_block = last_group_block;
        }
    }

    /// Attach recovered private keys to a group.
    pub fn set_keys(&mut self, group_id: &GroupId, keys: GroupKeys) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group.keys = Some(keys);
        }
    }

    /// Number of groups seen so far.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no group has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: u8) -> Group {
        Group {
            group_id: GroupId::new([id; 32]),
            public_signature_key: [id; 32],
            public_encryption_key: [id + 1; 32],
            last_group_block: [id + 2; 32],
            encrypted_private_signature_key: [id + 3; 112],
            keys: None,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut store = GroupStore::new();
        store.insert(group(1));

        assert!(store.group(&GroupId::new([1; 32])).is_some());
        let by_key = store.group_by_encryption_key(&[2; 32]).unwrap();
        assert_eq!(by_key.group_id, GroupId::new([1; 32]));
        assert!(store.group_by_encryption_key(&[9; 32]).is_none());
    }

    #[test]
    fn test_advance_moves_last_block() {
        let mut store = GroupStore::new();
        store.insert(group(1));
        store.advance(&GroupId::new([1; 32]), [7; 32]);
        assert_eq!(store.group(&GroupId::new([1; 32])).unwrap().last_group_block, [7; 32]);
    }
}
