//! Sigil block layer
//!
//! A trustchain is an append-only log of signed blocks. This crate owns the
//! three layers that turn server bytes into typed records and back:
//!
//! - [`nature`]: the closed taxonomy of block natures with their fixed wire
//!   integers. Multiple on-wire versions map to one kind; writers always
//!   emit the preferred (newest) version.
//! - [`payloads`]: the canonical byte layout of each payload variant. All
//!   fields are fixed-size byte arrays concatenated in declaration order,
//!   lists carry a varint count.
//! - [`block`]: the outer framing (`version ‖ index ‖ trustchain_id ‖
//!   nature ‖ payload ‖ author ‖ signature`) and the hash discipline — the
//!   hash covers nature, payload, and author, so the root block's hash can
//!   serve as the trustchain id. The framing layer never looks inside the
//!   payload.
//!
//! Byte-exact interoperability with peer SDKs is required: field order,
//! nature integers, and the all-zero `last_reset` marker must not change.

pub mod block;
pub mod nature;
pub mod payloads;

pub use block::{Block, BLOCK_VERSION};
pub use nature::{Nature, NatureKind};
pub use payloads::{
    DeviceCreation, DeviceRevocation, GroupMember, GroupProvisionalMember, KeyPublish,
    KeyPublishToProvisionalUser, Payload, PrivateKeyRecipient, ProvisionalIdentityClaim,
    RevocationUserKeys, SealedUserKeyPair, TrustchainCreation, UserGroupAddition,
    UserGroupCreation, DEVICE_NOT_REVOKED, SEALED_KEY_SIZE, SEALED_PROVISIONAL_KEYS_SIZE,
    SEALED_SIGNATURE_KEY_SIZE, TWICE_SEALED_KEY_SIZE,
};
