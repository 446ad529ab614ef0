//! Sigil session layer
//!
//! Orchestrates the crates below into a usable session:
//!
//! - [`identity`]: parsing of identity tokens and the printable
//!   verification-key format.
//! - [`verification`]: the verification methods exchanged with the server.
//! - [`client`]: the network interface the core consumes; the core never
//!   transports blocks itself.
//! - [`manager`]: the local-user manager — startup status, user and device
//!   creation, revocation, refresh — serialized behind a session lock.
//! - [`provisional`]: the provisional-identity manager — attach, verify,
//!   and recovery of pre-shared keys through claim blocks.

pub mod client;
pub mod identity;
pub mod manager;
pub mod provisional;
pub mod verification;

pub use client::{BlockHistory, BlockOperation, TankerProvisionalKeys, TrustchainClient};
pub use identity::{
    generate_verification_key, ghost_device_to_verification_key, verification_key_to_ghost_device,
    DelegationToken, SecretIdentity, SecretProvisionalIdentity,
};
pub use manager::{LocalUserManager, Status};
pub use provisional::{AttachResult, ProvisionalIdentityManager};
pub use verification::{Verification, VerificationMethod};
