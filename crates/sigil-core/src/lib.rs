//! Sigil core: foundation types shared across the workspace
//!
//! This crate provides the fundamental building blocks the rest of Sigil is
//! written against:
//!
//! - Identifier newtypes for trustchains, users, devices, groups, and
//!   resources. All of them wrap a 32-byte hash.
//! - The unified [`SigilError`] taxonomy surfaced by public operations.
//! - Cursor-based wire primitives ([`serialize`]) for the hand-written,
//!   byte-exact block format. The block layout is fixed by peer SDKs, so
//!   nothing here goes through a serde wire format.

pub mod errors;
pub mod identifiers;
pub mod serialize;

pub use errors::{Result, SigilError};
pub use identifiers::{
    DeviceId, GroupId, ResourceId, TrustchainId, UserId, HASH_SIZE,
};
pub use serialize::{deserialize_all, CodecError, Reader, Writer};
