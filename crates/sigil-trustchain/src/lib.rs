//! Sigil trustchain state
//!
//! Where the block layer turns bytes into typed records, this crate turns
//! verified records into state:
//!
//! - [`entry`]: the unverified entry a server block decodes into.
//! - [`users`] / [`groups`]: the projections the verifier maintains while
//!   replaying a chain (devices per user, key rotations, group membership).
//! - [`verifier`]: the rules that promote unverified entries to verified,
//!   including the per-user ordering discipline and skip-and-warn handling
//!   of invalid peer entries.
//! - [`local_user`]: the in-memory model of the session's own user: device
//!   keys, user-key history, provisional key pairs.
//! - [`generator`]: construction of new signed blocks that will pass the
//!   verifier locally and at the server.

pub mod entry;
pub mod error;
pub mod generator;
pub mod groups;
pub mod local_user;
pub mod users;
pub mod verifier;

pub use entry::Entry;
pub use error::{VerificationError, VerificationFailure};
pub use generator::{BlockAuthor, BlockGenerator, NewDevice, NewUser, PublicProvisionalUser};
pub use groups::{Group, GroupKeys, GroupStore};
pub use local_user::{provisional_identity_id, LocalUser, ProvisionalUserKeyPair};
pub use users::{Device, User, UserStore};
pub use verifier::TrustchainVerifier;
