//! Sigil persistence
//!
//! Two layers live here:
//!
//! - [`record_store`]: the minimal key-value interface the core requires
//!   from its persistent backend. Tables hold opaque records; the only
//!   semantically distinguished error is a missing record.
//! - [`key_safe`]: the encrypted at-rest snapshot of the session's secrets,
//!   serialized as JSON with binary escapes and sealed under the user
//!   secret. A safe that cannot be opened is replaced by a fresh one
//!   rather than locking the user out permanently.

pub mod key_safe;
pub mod record_store;

pub use key_safe::{
    KeySafe, KeySafeStorage, Binary, KEY_SAFE_RECORD_ID, KEY_SAFE_TABLE, KEY_SAFE_VERSION,
};
pub use record_store::{MemoryRecordStore, Record, RecordStore, StoreError};
