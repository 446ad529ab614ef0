//! The encrypted key safe
//!
//! The safe is the at-rest snapshot of a session's secrets: device key
//! pairs, the user-key history, and adopted provisional key pairs. It is
//! serialized as JSON whose binary fields are strings prefixed with
//! `"__BASE64__"`, sealed with the symmetric v1 cipher under the user
//! secret, and stored base64-encoded in the record `"keySafe"`.
//!
//! A record that is absent or fails to decrypt yields a fresh safe rather
//! than an error: the user re-verifies identity and creates a new device
//! instead of being permanently locked out. Readers refuse schema versions
//! newer than their own.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;
use zeroize::Zeroize;

use sigil_core::{DeviceId, Result, SigilError};
use sigil_crypto::{
    symmetric_decrypt_v1, symmetric_encrypt_v1, EncryptionKeyPair, SignatureKeyPair,
};
use sigil_trustchain::{Device, LocalUser, ProvisionalUserKeyPair};

use crate::record_store::{Record, RecordStore, StoreError};

/// Table holding the sealed safe.
pub const KEY_SAFE_TABLE: &str = "key_safe";
/// Record id of the sealed safe.
pub const KEY_SAFE_RECORD_ID: &str = "keySafe";
/// Schema version written by this build.
pub const KEY_SAFE_VERSION: u64 = 1;

const BINARY_MARKER: &str = "__BASE64__";

/// A binary field in the safe's JSON, encoded as `"__BASE64__" + base64`.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
pub struct Binary(pub Vec<u8>);

impl Binary {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Convert to a fixed-size array, failing on length mismatch.
    pub fn to_array<const N: usize>(&self) -> Result<[u8; N]> {
        <[u8; N]>::try_from(self.0.as_slice())
            .map_err(|_| SigilError::invalid_argument("binary field has unexpected length"))
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{BINARY_MARKER}{}", BASE64.encode(&self.0)))
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let encoded = text
            .strip_prefix(BINARY_MARKER)
            .ok_or_else(|| D::Error::custom("binary field is missing its marker"))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| D::Error::custom(format!("binary field is not base64: {err}")))?;
        Ok(Self(bytes))
    }
}

/// A persisted key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairRecord {
    /// Public half.
    pub public_key: Binary,
    /// Private half.
    pub private_key: Binary,
}

impl KeyPairRecord {
    fn from_signature_pair(pair: &SignatureKeyPair) -> Self {
        Self {
            public_key: Binary::new(pair.public.to_vec()),
            private_key: Binary::new(pair.private.as_bytes().to_vec()),
        }
    }

    fn from_encryption_pair(pair: &EncryptionKeyPair) -> Self {
        Self {
            public_key: Binary::new(pair.public.to_vec()),
            private_key: Binary::new(pair.private.as_bytes().to_vec()),
        }
    }

    fn to_signature_pair(&self) -> Result<SignatureKeyPair> {
        Ok(SignatureKeyPair::from_private(&self.private_key.to_array()?))
    }

    fn to_encryption_pair(&self) -> Result<EncryptionKeyPair> {
        Ok(EncryptionKeyPair::from_private(&self.private_key.to_array()?))
    }

    fn wipe(&mut self) {
        self.private_key.zeroize();
    }
}

/// A persisted device of the user's device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device id.
    pub device_id: Binary,
    /// Public signature key.
    pub public_signature_key: Binary,
    /// Public encryption key.
    pub public_encryption_key: Binary,
    /// Ghost marker.
    pub is_ghost_device: bool,
    /// Creation block index.
    pub created_at: u64,
    /// Revocation block index, when revoked.
    pub revoked_at: Option<u64>,
}

impl DeviceRecord {
    fn from_device(device: &Device) -> Self {
        Self {
            device_id: Binary::new(device.device_id.as_bytes().to_vec()),
            public_signature_key: Binary::new(device.public_signature_key.to_vec()),
            public_encryption_key: Binary::new(device.public_encryption_key.to_vec()),
            is_ghost_device: device.is_ghost_device,
            created_at: device.created_at,
            revoked_at: device.revoked_at,
        }
    }

    fn to_device(&self) -> Result<Device> {
        Ok(Device {
            device_id: DeviceId::new(self.device_id.to_array()?),
            public_signature_key: self.public_signature_key.to_array()?,
            public_encryption_key: self.public_encryption_key.to_array()?,
            is_ghost_device: self.is_ghost_device,
            created_at: self.created_at,
            revoked_at: self.revoked_at,
        })
    }
}

/// The user-key history as persisted: the current public key plus every
/// generation keyed by the base64 of its public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUserKeysRecord {
    /// Public key of the current generation.
    pub current_public_key: Binary,
    /// Every generation, keyed by base64 public key.
    pub keys: BTreeMap<String, KeyPairRecord>,
}

/// Persisted provisional key pairs for one provisional identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionalKeysRecord {
    /// App-side encryption key pair.
    pub app_encryption_key_pair: KeyPairRecord,
    /// Tanker-side encryption key pair.
    pub tanker_encryption_key_pair: KeyPairRecord,
}

/// The persisted snapshot of a session's secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySafe {
    /// Schema version; readers refuse anything newer than they understand.
    pub version: u64,
    /// This session's device id, absent while the safe is fresh.
    pub device_id: Option<Binary>,
    /// Device signature key pair.
    pub device_signature_pair: Option<KeyPairRecord>,
    /// Device encryption key pair.
    pub device_encryption_pair: Option<KeyPairRecord>,
    /// The trustchain's public signature key.
    pub trustchain_public_key: Option<Binary>,
    /// The user's device list.
    pub devices: Vec<DeviceRecord>,
    /// The user-key history.
    pub local_user_keys: Option<LocalUserKeysRecord>,
    /// Adopted provisional key pairs, keyed by concatenated public
    /// signature keys (base64).
    pub provisional_user_keys: BTreeMap<String, ProvisionalKeysRecord>,
}

impl KeySafe {
    /// A fresh safe with no device identity.
    pub fn fresh() -> Self {
        Self {
            version: KEY_SAFE_VERSION,
            device_id: None,
            device_signature_pair: None,
            device_encryption_pair: None,
            trustchain_public_key: None,
            devices: Vec::new(),
            local_user_keys: None,
            provisional_user_keys: BTreeMap::new(),
        }
    }

    /// Whether this safe has no device identity yet.
    pub fn is_fresh(&self) -> bool {
        self.device_id.is_none()
    }

    /// Snapshot a local user into a safe.
    pub fn from_local_user(local: &LocalUser) -> Self {
        let local_user_keys = local.current_user_key().map(|current| LocalUserKeysRecord {
            current_public_key: Binary::new(current.public.to_vec()),
            keys: local
                .user_keys()
                .iter()
                .map(|pair| {
                    (
                        BASE64.encode(pair.public),
                        KeyPairRecord::from_encryption_pair(pair),
                    )
                })
                .collect(),
        });

        Self {
            version: KEY_SAFE_VERSION,
            device_id: local
                .device_id()
                .map(|id| Binary::new(id.as_bytes().to_vec())),
            device_signature_pair: local
                .device_signature_pair()
                .map(KeyPairRecord::from_signature_pair),
            device_encryption_pair: local
                .device_encryption_pair()
                .map(KeyPairRecord::from_encryption_pair),
            trustchain_public_key: local
                .trustchain_public_key()
                .map(|key| Binary::new(key.to_vec())),
            devices: local.devices().iter().map(DeviceRecord::from_device).collect(),
            local_user_keys,
            provisional_user_keys: local
                .provisional_user_keys()
                .iter()
                .map(|(id, pair)| {
                    (
                        id.clone(),
                        ProvisionalKeysRecord {
                            app_encryption_key_pair: KeyPairRecord::from_encryption_pair(
                                &pair.app_encryption_pair,
                            ),
                            tanker_encryption_key_pair: KeyPairRecord::from_encryption_pair(
                                &pair.tanker_encryption_pair,
                            ),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Restore this safe's contents into a local user.
    pub fn apply_to_local_user(&self, local: &mut LocalUser) -> Result<()> {
        if let (Some(device_id), Some(signature), Some(encryption)) = (
            self.device_id.as_ref(),
            self.device_signature_pair.as_ref(),
            self.device_encryption_pair.as_ref(),
        ) {
            local.set_device_identity(
                DeviceId::new(device_id.to_array()?),
                signature.to_signature_pair()?,
                encryption.to_encryption_pair()?,
            );
        }
        if let Some(key) = self.trustchain_public_key.as_ref() {
            local.set_trustchain_public_key(key.to_array()?);
        }

        let mut devices = Vec::with_capacity(self.devices.len());
        for record in &self.devices {
            devices.push(record.to_device()?);
        }
        local.set_devices(devices);

        if let Some(keys) = self.local_user_keys.as_ref() {
            let current = BASE64.encode(keys.current_public_key.as_slice());
            for (id, record) in &keys.keys {
                if *id != current {
                    local.add_user_key(record.to_encryption_pair()?);
                }
            }
            let current_record = keys.keys.get(&current).ok_or_else(|| {
                SigilError::invalid_argument("current user key missing from safe")
            })?;
            local.add_user_key(current_record.to_encryption_pair()?);
        }

        for (id, record) in &self.provisional_user_keys {
            local.add_provisional_key(
                id.clone(),
                ProvisionalUserKeyPair {
                    app_encryption_pair: record.app_encryption_key_pair.to_encryption_pair()?,
                    tanker_encryption_pair: record
                        .tanker_encryption_key_pair
                        .to_encryption_pair()?,
                },
            );
        }
        Ok(())
    }

    /// Serialize and seal under the user secret, returning the base64
    /// ciphertext stored in the record.
    pub fn seal(&self, user_secret: &[u8; 32]) -> Result<String> {
        let mut json = serde_json::to_vec(self)?;
        let sealed = symmetric_encrypt_v1(user_secret, &json);
        json.zeroize();
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt and parse a sealed safe.
    pub fn open(user_secret: &[u8; 32], data: &str) -> Result<Self> {
        let ciphertext = BASE64
            .decode(data)
            .map_err(|err| SigilError::decryption_failed(format!("safe is not base64: {err}")))?;
        let mut json = symmetric_decrypt_v1(user_secret, &ciphertext).map_err(SigilError::from)?;
        let parsed: std::result::Result<Self, _> = serde_json::from_slice(&json);
        json.zeroize();
        let safe = parsed?;
        if safe.version > KEY_SAFE_VERSION {
            return Err(SigilError::upgrade_required(format!(
                "key safe version {} is newer than this build",
                safe.version
            )));
        }
        Ok(safe)
    }

    /// Zeroize every private key held by the safe.
    pub fn wipe(&mut self) {
        if let Some(pair) = self.device_signature_pair.as_mut() {
            pair.wipe();
        }
        if let Some(pair) = self.device_encryption_pair.as_mut() {
            pair.wipe();
        }
        if let Some(keys) = self.local_user_keys.as_mut() {
            for pair in keys.keys.values_mut() {
                pair.wipe();
            }
        }
        for record in self.provisional_user_keys.values_mut() {
            record.app_encryption_key_pair.wipe();
            record.tanker_encryption_key_pair.wipe();
        }
    }
}

/// Loads and saves the sealed safe through a record store.
#[derive(Clone)]
pub struct KeySafeStorage {
    store: Arc<dyn RecordStore>,
}

impl KeySafeStorage {
    /// Wrap a record store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Load the safe, or create a fresh one when the record is absent,
    /// unreadable, or carries no device identity.
    ///
    /// Only two outcomes are errors: a storage failure, and a safe written
    /// by a newer schema version.
    pub async fn load_or_create(&self, user_secret: &[u8; 32]) -> Result<KeySafe> {
        let record = match self.store.get(KEY_SAFE_TABLE, KEY_SAFE_RECORD_ID).await {
            Ok(record) => record,
            Err(StoreError::RecordNotFound { .. }) => {
                let safe = KeySafe::fresh();
                self.save(user_secret, &safe).await?;
                return Ok(safe);
            }
            Err(err) => return Err(err.into()),
        };

        let text = String::from_utf8(record.payload).unwrap_or_default();
        match KeySafe::open(user_secret, &text) {
            Ok(safe) if safe.is_fresh() => {
                let safe = KeySafe::fresh();
                self.save(user_secret, &safe).await?;
                Ok(safe)
            }
            Ok(safe) => Ok(safe),
            Err(err @ SigilError::UpgradeRequired { .. }) => Err(err),
            Err(err) => {
                warn!(%err, "key safe could not be opened, starting fresh");
                let safe = KeySafe::fresh();
                self.save(user_secret, &safe).await?;
                Ok(safe)
            }
        }
    }

    /// Seal and persist the safe.
    pub async fn save(&self, user_secret: &[u8; 32], safe: &KeySafe) -> Result<()> {
        let sealed = safe.seal(user_secret)?;
        self.store
            .put(
                KEY_SAFE_TABLE,
                Record::new(KEY_SAFE_RECORD_ID, sealed.into_bytes()),
            )
            .await
            .map_err(SigilError::from)
    }
}

impl std::fmt::Debug for KeySafeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeySafeStorage(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 32] = [7; 32];

    #[test]
    fn test_fresh_safe_seal_open_round_trip() {
        let safe = KeySafe::fresh();
        let sealed = safe.seal(&SECRET).unwrap();
        let opened = KeySafe::open(&SECRET, &sealed).unwrap();
        assert_eq!(opened, safe);
        assert!(opened.is_fresh());
    }

    #[test]
    fn test_populated_safe_round_trip() {
        let mut safe = KeySafe::fresh();
        safe.device_id = Some(Binary::new(vec![1; 32]));
        safe.device_signature_pair = Some(KeyPairRecord::from_signature_pair(
            &SignatureKeyPair::generate(),
        ));
        safe.device_encryption_pair = Some(KeyPairRecord::from_encryption_pair(
            &EncryptionKeyPair::generate(),
        ));
        safe.devices.push(DeviceRecord {
            device_id: Binary::new(vec![2; 32]),
            public_signature_key: Binary::new(vec![3; 32]),
            public_encryption_key: Binary::new(vec![4; 32]),
            is_ghost_device: true,
            created_at: 2,
            revoked_at: Some(9),
        });

        let sealed = safe.seal(&SECRET).unwrap();
        let opened = KeySafe::open(&SECRET, &sealed).unwrap();
        assert_eq!(opened, safe);
    }

    #[test]
    fn test_json_uses_binary_markers() {
        let mut safe = KeySafe::fresh();
        safe.device_id = Some(Binary::new(vec![0xab; 32]));
        let json = serde_json::to_string(&safe).unwrap();
        assert!(json.contains("__BASE64__"));

        // Every binary field decodes back through the marker.
        let parsed: KeySafe = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, safe);
    }

    #[test]
    fn test_open_with_wrong_secret_fails() {
        let safe = KeySafe::fresh();
        let sealed = safe.seal(&SECRET).unwrap();
        let err = KeySafe::open(&[8; 32], &sealed).unwrap_err();
        assert!(matches!(err, SigilError::DecryptionFailed { .. }));
    }

    #[test]
    fn test_newer_version_is_refused() {
        let mut safe = KeySafe::fresh();
        safe.version = KEY_SAFE_VERSION + 1;
        let sealed = safe.seal(&SECRET).unwrap();
        let err = KeySafe::open(&SECRET, &sealed).unwrap_err();
        assert!(matches!(err, SigilError::UpgradeRequired { .. }));
    }

    #[test]
    fn test_wipe_zeroizes_private_keys() {
        let mut safe = KeySafe::fresh();
        let pair = SignatureKeyPair::generate();
        safe.device_signature_pair = Some(KeyPairRecord::from_signature_pair(&pair));
        safe.wipe();
        let record = safe.device_signature_pair.unwrap();
        assert!(record.private_key.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_local_user_round_trip_through_safe() {
        use sigil_core::{TrustchainId, UserId};

        let mut local = LocalUser::new(
            TrustchainId::new([1; 32]),
            UserId::new([2; 32]),
            SECRET,
        );
        local.set_device_identity(
            DeviceId::new([3; 32]),
            SignatureKeyPair::generate(),
            EncryptionKeyPair::generate(),
        );
        local.set_trustchain_public_key([4; 32]);
        local.add_user_key(EncryptionKeyPair::generate());
        local.add_user_key(EncryptionKeyPair::generate());
        local.add_provisional_key(
            "prov".to_string(),
            ProvisionalUserKeyPair {
                app_encryption_pair: EncryptionKeyPair::generate(),
                tanker_encryption_pair: EncryptionKeyPair::generate(),
            },
        );

        let safe = KeySafe::from_local_user(&local);
        let mut restored = LocalUser::new(
            TrustchainId::new([1; 32]),
            UserId::new([2; 32]),
            SECRET,
        );
        safe.apply_to_local_user(&mut restored).unwrap();

        assert_eq!(restored.device_id(), local.device_id());
        assert_eq!(
            restored.current_user_key().unwrap().public,
            local.current_user_key().unwrap().public
        );
        assert_eq!(restored.user_keys().len(), 2);
        for pair in local.user_keys() {
            assert!(restored.find_user_key(&pair.public).is_some());
        }
        assert!(restored.provisional_key("prov").is_some());
        assert_eq!(restored.trustchain_public_key(), local.trustchain_public_key());

        // Snapshotting the restored state yields an identical safe.
        assert_eq!(KeySafe::from_local_user(&restored), safe);
    }
}
