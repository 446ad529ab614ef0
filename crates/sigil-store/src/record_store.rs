//! Key-value record store abstraction
//!
//! The core treats persistence as tables of opaque records addressed by a
//! string id. Implementations in host applications provide durable
//! backends; [`MemoryRecordStore`] backs tests and ephemeral sessions.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sigil_core::SigilError;

/// Errors produced by a record store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("record not found: {table}/{id}")]
    RecordNotFound {
        /// Table that was searched.
        table: String,
        /// Record id that was missing.
        id: String,
    },
    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Build the not-found error for a table and id.
    pub fn not_found(table: &str, id: &str) -> Self {
        Self::RecordNotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for SigilError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound { .. } => SigilError::not_found(err.to_string()),
            StoreError::Backend(_) => SigilError::storage(err.to_string()),
        }
    }
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// One stored record: an id and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record id, unique within its table.
    pub id: String,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl Record {
    /// Build a record.
    pub fn new(id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

/// The persistence interface the core consumes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a record.
    async fn put(&self, table: &str, record: Record) -> Result<()>;

    /// Fetch a record by id.
    async fn get(&self, table: &str, id: &str) -> Result<Record>;

    /// Fetch the first record of a table in id order, if any.
    async fn first(&self, table: &str) -> Result<Option<Record>>;

    /// Delete a record by id. Deleting a missing record is an error.
    async fn delete(&self, table: &str, id: &str) -> Result<()>;

    /// Fetch every record of a table in id order.
    async fn get_all(&self, table: &str) -> Result<Vec<Record>>;

    /// Insert or replace several records.
    async fn bulk_put(&self, table: &str, records: Vec<Record>) -> Result<()>;

    /// Delete several records; missing ids are ignored.
    async fn bulk_delete(&self, table: &str, ids: &[String]) -> Result<()>;
}

/// In-memory record store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, table: &str, record: Record) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(record.id, record.payload);
        Ok(())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Record> {
        let tables = self.tables.lock().await;
        tables
            .get(table)
            .and_then(|records| records.get(id))
            .map(|payload| Record::new(id, payload.clone()))
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    async fn first(&self, table: &str) -> Result<Option<Record>> {
        let tables = self.tables.lock().await;
        Ok(tables.get(table).and_then(|records| {
            records
                .iter()
                .next()
                .map(|(id, payload)| Record::new(id.clone(), payload.clone()))
        }))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .get_mut(table)
            .and_then(|records| records.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    async fn get_all(&self, table: &str) -> Result<Vec<Record>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(table)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, payload)| Record::new(id.clone(), payload.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn bulk_put(&self, table: &str, records: Vec<Record>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let entries = tables.entry(table.to_string()).or_default();
        for record in records {
            entries.insert(record.id, record.payload);
        }
        Ok(())
    }

    async fn bulk_delete(&self, table: &str, ids: &[String]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(records) = tables.get_mut(table) {
            for id in ids {
                records.remove(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = MemoryRecordStore::new();
        store
            .put("safe", Record::new("keySafe", vec![1, 2, 3]))
            .await
            .unwrap();
        let record = store.get("safe", "keySafe").await.unwrap();
        assert_eq!(record.payload, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryRecordStore::new();
        let err = store.get("safe", "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_bulk_operations() {
        let store = MemoryRecordStore::new();
        store
            .bulk_put(
                "t",
                vec![
                    Record::new("a", vec![1]),
                    Record::new("b", vec![2]),
                    Record::new("c", vec![3]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.get_all("t").await.unwrap().len(), 3);
        assert_eq!(store.first("t").await.unwrap().unwrap().id, "a");

        store.delete("t", "b").await.unwrap();
        assert!(store.delete("t", "b").await.is_err());

        store
            .bulk_delete("t", &["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(store.get_all("t").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_table_reads() {
        let store = MemoryRecordStore::new();
        assert!(store.first("empty").await.unwrap().is_none());
        assert!(store.get_all("empty").await.unwrap().is_empty());
    }
}
