//! User and device projections
//!
//! The verifier replays device-creation and device-revocation entries into
//! this store. A [`User`] aggregates every device bearing its user id plus
//! the ordered history of user public keys, one entry per key rotation.

use std::collections::HashMap;

use sigil_core::{DeviceId, UserId};

/// A device derived from a verified device-creation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Hash of the creation block.
    pub device_id: DeviceId,
    /// Long-lived public signature key.
    pub public_signature_key: [u8; 32],
    /// Public encryption key.
    pub public_encryption_key: [u8; 32],
    /// Whether this is the bootstrap ghost device.
    pub is_ghost_device: bool,
    /// Index of the creation block.
    pub created_at: u64,
    /// Index of the revocation block, if revoked.
    pub revoked_at: Option<u64>,
}

impl Device {
    /// Whether this device counts as revoked at the given chain index.
    pub fn is_revoked_at(&self, index: u64) -> bool {
        self.revoked_at.is_some_and(|at| at <= index)
    }
}

/// A user aggregated from verified entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Opaque user identifier.
    pub user_id: UserId,
    /// Every device created for this user, in creation order.
    pub devices: Vec<Device>,
    /// `(index, key)` per user-key generation, strictly increasing index.
    pub user_public_keys: Vec<(u64, [u8; 32])>,
}

impl User {
    /// Find one of the user's devices.
    pub fn device(&self, device_id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.device_id == device_id)
    }

    /// The current user public key, if any generation exists.
    pub fn latest_public_key(&self) -> Option<&[u8; 32]> {
        self.user_public_keys.last().map(|(_, key)| key)
    }

    /// The user public key that was current at the given chain index: the
    /// newest generation rotated in at or before that index.
    pub fn public_key_at(&self, index: u64) -> Option<&[u8; 32]> {
        self.user_public_keys
            .iter()
            .rev()
            .find(|(at, _)| *at <= index)
            .map(|(_, key)| key)
    }

    /// Devices not revoked at the given index.
    pub fn active_devices_at(&self, index: u64) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(move |d| !d.is_revoked_at(index))
    }
}

/// In-memory projection of every user seen on the chain.
#[derive(Debug, Default)]
pub struct UserStore {
    users: HashMap<UserId, User>,
    device_owners: HashMap<DeviceId, UserId>,
    key_owners: HashMap<[u8; 32], UserId>,
}

impl UserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a user.
    pub fn user(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id)
    }

    /// Look up the user owning a device.
    pub fn user_by_device(&self, device_id: &DeviceId) -> Option<&User> {
        self.device_owners
            .get(device_id)
            .and_then(|user_id| self.users.get(user_id))
    }

    /// Look up a device across all users.
    pub fn device(&self, device_id: &DeviceId) -> Option<&Device> {
        self.user_by_device(device_id)
            .and_then(|user| user.device(device_id))
    }

    /// Look up the user owning a user public key generation.
    pub fn user_by_public_key(&self, key: &[u8; 32]) -> Option<&User> {
        self.key_owners
            .get(key)
            .and_then(|user_id| self.users.get(user_id))
    }

    /// Record a verified device creation.
    ///
    /// Re-applying a creation whose device id is already present is a
    /// no-op, which makes history replay idempotent.
    pub fn apply_device_creation(
        &mut self,
        user_id: UserId,
        device: Device,
        user_public_key: Option<(u64, [u8; 32])>,
    ) {
        let user = self.users.entry(user_id).or_insert_with(|| User {
            user_id,
            devices: Vec::new(),
            user_public_keys: Vec::new(),
        });
        if user.device(&device.device_id).is_some() {
            return;
        }
        self.device_owners.insert(device.device_id, user_id);
        user.devices.push(device);

        if let Some((index, key)) = user_public_key {
            if user.user_public_keys.is_empty() {
                self.key_owners.insert(key, user_id);
                user.user_public_keys.push((index, key));
            }
        }
    }

    /// Record a verified device revocation and its key rotation.
    pub fn apply_device_revocation(
        &mut self,
        user_id: &UserId,
        device_id: &DeviceId,
        index: u64,
        new_public_key: Option<[u8; 32]>,
    ) {
        let Some(user) = self.users.get_mut(user_id) else {
            return;
        };
        if let Some(device) = user.devices.iter_mut().find(|d| &d.device_id == device_id) {
            device.revoked_at = Some(index);
        }
        if let Some(key) = new_public_key {
            self.key_owners.insert(key, *user_id);
            user.user_public_keys.push((index, key));
        }
    }

    /// Number of users seen so far.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: u8, created_at: u64) -> Device {
        Device {
            device_id: DeviceId::new([id; 32]),
            public_signature_key: [id; 32],
            public_encryption_key: [id; 32],
            is_ghost_device: false,
            created_at,
            revoked_at: None,
        }
    }

    #[test]
    fn test_creation_and_lookup() {
        let mut store = UserStore::new();
        let user_id = UserId::new([1; 32]);
        store.apply_device_creation(user_id, device(2, 1), Some((1, [9; 32])));

        let user = store.user(&user_id).unwrap();
        assert_eq!(user.devices.len(), 1);
        assert_eq!(user.latest_public_key(), Some(&[9; 32]));
        assert_eq!(
            store.user_by_device(&DeviceId::new([2; 32])).unwrap().user_id,
            user_id
        );
        assert_eq!(store.user_by_public_key(&[9; 32]).unwrap().user_id, user_id);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let mut store = UserStore::new();
        let user_id = UserId::new([1; 32]);
        store.apply_device_creation(user_id, device(2, 1), Some((1, [9; 32])));
        store.apply_device_creation(user_id, device(2, 1), Some((1, [9; 32])));

        let user = store.user(&user_id).unwrap();
        assert_eq!(user.devices.len(), 1);
        assert_eq!(user.user_public_keys.len(), 1);
    }

    #[test]
    fn test_revocation_rotates_key() {
        let mut store = UserStore::new();
        let user_id = UserId::new([1; 32]);
        store.apply_device_creation(user_id, device(2, 1), Some((1, [9; 32])));
        store.apply_device_creation(user_id, device(3, 2), None);
        store.apply_device_revocation(&user_id, &DeviceId::new([2; 32]), 3, Some([10; 32]));

        let user = store.user(&user_id).unwrap();
        assert_eq!(user.device(&DeviceId::new([2; 32])).unwrap().revoked_at, Some(3));
        assert_eq!(user.device(&DeviceId::new([3; 32])).unwrap().revoked_at, None);
        assert_eq!(user.user_public_keys, vec![(1, [9; 32]), (3, [10; 32])]);
        assert_eq!(user.latest_public_key(), Some(&[10; 32]));
        // The superseded generation still resolves to its owner.
        assert!(store.user_by_public_key(&[9; 32]).is_some());
    }

    #[test]
    fn test_is_revoked_at_boundary() {
        let mut d = device(2, 1);
        d.revoked_at = Some(5);
        assert!(!d.is_revoked_at(4));
        assert!(d.is_revoked_at(5));
        assert!(d.is_revoked_at(6));
    }
}
