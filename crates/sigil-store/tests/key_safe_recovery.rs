//! Key-safe recovery behavior against a real record store

use std::sync::Arc;

use sigil_store::key_safe::KeyPairRecord;
use sigil_store::{
    Binary, KeySafe, KeySafeStorage, MemoryRecordStore, Record, RecordStore, KEY_SAFE_RECORD_ID,
    KEY_SAFE_TABLE,
};

const SECRET: [u8; 32] = [5; 32];

fn populated_safe() -> KeySafe {
    let mut safe = KeySafe::fresh();
    safe.device_id = Some(Binary::new(vec![1; 32]));
    safe.device_signature_pair = Some(KeyPairRecord {
        public_key: Binary::new(vec![2; 32]),
        private_key: Binary::new(vec![3; 64]),
    });
    safe
}

#[tokio::test]
async fn missing_record_yields_fresh_safe_and_persists_it() {
    let store = Arc::new(MemoryRecordStore::new());
    let storage = KeySafeStorage::new(store.clone());

    let safe = storage.load_or_create(&SECRET).await.unwrap();
    assert!(safe.is_fresh());

    // The fresh safe was persisted and loads back equal.
    let reloaded = storage.load_or_create(&SECRET).await.unwrap();
    assert_eq!(reloaded, safe);
    assert!(store.get(KEY_SAFE_TABLE, KEY_SAFE_RECORD_ID).await.is_ok());
}

#[tokio::test]
async fn saved_safe_loads_back_equal() {
    let store = Arc::new(MemoryRecordStore::new());
    let storage = KeySafeStorage::new(store);

    let safe = populated_safe();
    storage.save(&SECRET, &safe).await.unwrap();

    let loaded = storage.load_or_create(&SECRET).await.unwrap();
    assert_eq!(loaded, safe);
}

#[tokio::test]
async fn corrupted_ciphertext_recovers_as_fresh() {
    let store = Arc::new(MemoryRecordStore::new());
    let storage = KeySafeStorage::new(store.clone());

    storage.save(&SECRET, &populated_safe()).await.unwrap();

    // Flip one byte of the stored ciphertext.
    let mut record = store.get(KEY_SAFE_TABLE, KEY_SAFE_RECORD_ID).await.unwrap();
    let middle = record.payload.len() / 2;
    record.payload[middle] ^= 0x01;
    store
        .put(KEY_SAFE_TABLE, Record::new(KEY_SAFE_RECORD_ID, record.payload))
        .await
        .unwrap();

    // The next open succeeds with a fresh safe instead of an error.
    let recovered = storage.load_or_create(&SECRET).await.unwrap();
    assert!(recovered.is_fresh());
}

#[tokio::test]
async fn fresh_marker_in_stored_safe_is_rebuilt() {
    let store = Arc::new(MemoryRecordStore::new());
    let storage = KeySafeStorage::new(store);

    // A safe without a device id round-trips as fresh.
    let mut safe = populated_safe();
    safe.device_id = None;
    storage.save(&SECRET, &safe).await.unwrap();

    let loaded = storage.load_or_create(&SECRET).await.unwrap();
    assert!(loaded.is_fresh());
    assert!(loaded.device_signature_pair.is_none());
}
