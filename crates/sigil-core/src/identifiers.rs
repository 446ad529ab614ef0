//! Core identifier types used across the Sigil workspace
//!
//! Every entity in the trustchain is addressed by a 32-byte hash: the
//! trustchain by the hash of its creation block, a device by the hash of
//! its device-creation block, a group by its public signature key. These
//! newtypes keep the different address spaces from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size in bytes of every hash-derived identifier.
pub const HASH_SIZE: usize = 32;

macro_rules! hash_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; HASH_SIZE]);

        impl $name {
            /// Wrap raw identifier bytes.
            pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
                Self(bytes)
            }

            /// Borrow the identifier bytes.
            pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
                &self.0
            }

            /// Parse from a byte slice, failing if the length is wrong.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                <[u8; HASH_SIZE]>::try_from(bytes).ok().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Eight hex chars is enough to tell identifiers apart in logs.
                write!(f, concat!($prefix, "-{}"), hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), hex::encode(self.0))
            }
        }

        impl From<[u8; HASH_SIZE]> for $name {
            fn from(bytes: [u8; HASH_SIZE]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; HASH_SIZE] {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

hash_id!(
    /// Identifies a trustchain: the hash of its creation block.
    TrustchainId,
    "trustchain"
);

hash_id!(
    /// Opaque user identifier carried by device-creation blocks.
    UserId,
    "user"
);

hash_id!(
    /// Identifies a device: the hash of its device-creation block.
    DeviceId,
    "device"
);

hash_id!(
    /// Identifies a user group: the group's public signature key.
    GroupId,
    "group"
);

hash_id!(
    /// Identifies a shared resource in key-publish blocks.
    ResourceId,
    "resource"
);

impl TrustchainId {
    /// The root author marker: trustchain-creation blocks are authored by
    /// the all-zero id and new-user blocks by the trustchain id itself.
    pub fn zero() -> [u8; HASH_SIZE] {
        [0u8; HASH_SIZE]
    }
}
