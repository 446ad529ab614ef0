//! Block framing and hashing
//!
//! Wire layout of one block:
//!
//! `varint(version=1) ‖ varint(index) ‖ trustchain_id(32) ‖ varint(nature)
//!  ‖ len_prefixed(payload) ‖ author(32) ‖ signature(64)`
//!
//! A block's identity is the hash of its unsigned content
//! `varint(nature) ‖ len_prefixed(payload) ‖ author`; the signature signs
//! that hash. The trustchain id cannot participate in the hash: the root
//! block's hash *is* the trustchain id, so including the id in the preimage
//! would make the root unconstructible. The framing layer never interprets
//! the payload bytes.

use sigil_core::serialize::{deserialize_all, CodecError, Result, Writer};
use sigil_core::{TrustchainId, HASH_SIZE};
use sigil_crypto::{generic_hash, SIGNATURE_SIZE};

use crate::nature::Nature;

/// The block version this build reads and writes.
pub const BLOCK_VERSION: u64 = 1;

/// One framed trustchain block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Per-trustchain sequence number, assigned by the server.
    pub index: u64,
    /// The chain this block belongs to.
    pub trustchain_id: TrustchainId,
    /// Payload interpretation tag.
    pub nature: Nature,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
    /// Author device id, or the trustchain id for root-authored blocks.
    pub author: [u8; HASH_SIZE],
    /// Signature over [`Self::hash`] by the author's signature key.
    pub signature: [u8; SIGNATURE_SIZE],
}

impl Block {
    /// Encode to wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.payload.len() + 160);
        w.push_varint(BLOCK_VERSION);
        w.push_varint(self.index);
        w.push_bytes(self.trustchain_id.as_bytes());
        w.push_varint(self.nature.wire_value());
        w.push_len_prefixed(&self.payload);
        w.push_bytes(&self.author);
        w.push_bytes(&self.signature);
        w.into_bytes()
    }

    /// Decode from wire bytes.
    ///
    /// A version newer than [`BLOCK_VERSION`] fails with
    /// [`CodecError::UpgradeRequired`]; an unassigned nature integer with
    /// [`CodecError::UnknownNature`].
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        deserialize_all(data, |r| {
            let version = r.read_varint()?;
            if version > BLOCK_VERSION {
                return Err(CodecError::UpgradeRequired(version));
            }
            let index = r.read_varint()?;
            let trustchain_id = TrustchainId::new(r.read_array()?);
            let nature = Nature::from_wire(r.read_varint()?)?;
            let payload = r.read_len_prefixed()?.to_vec();
            let author = r.read_array()?;
            let signature = r.read_array()?;
            Ok(Self {
                index,
                trustchain_id,
                nature,
                payload,
                author,
                signature,
            })
        })
    }

    /// The block hash: digest of the unsigned content.
    ///
    /// Deterministic over `nature ‖ payload ‖ author`; neither the index,
    /// the trustchain id, nor the signature participates.
    pub fn hash(&self) -> [u8; HASH_SIZE] {
        let mut w = Writer::with_capacity(self.payload.len() + 48);
        w.push_varint(self.nature.wire_value());
        w.push_len_prefixed(&self.payload);
        w.push_bytes(&self.author);
        generic_hash(&w.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            index: 7,
            trustchain_id: TrustchainId::new([1; 32]),
            nature: Nature::KeyPublishToUser,
            payload: vec![2; 144],
            author: [3; 32],
            signature: [4; 64],
        }
    }

    #[test]
    fn test_block_round_trip() {
        let block = sample_block();
        let bytes = block.serialize();
        assert_eq!(Block::deserialize(&bytes).unwrap(), block);
    }

    #[test]
    fn test_version_two_rejected() {
        let block = sample_block();
        let mut bytes = block.serialize();
        // Version is the first varint; 2 still fits one byte.
        bytes[0] = 2;
        assert_eq!(
            Block::deserialize(&bytes),
            Err(CodecError::UpgradeRequired(2))
        );
    }

    #[test]
    fn test_unknown_nature_rejected() {
        let block = sample_block();
        let bytes = block.serialize();
        // Nature sits after version(1) + index(1) + trustchain_id(32).
        let mut bytes = bytes;
        bytes[34] = 20;
        assert_eq!(Block::deserialize(&bytes), Err(CodecError::UnknownNature(20)));
    }

    #[test]
    fn test_hash_ignores_index_and_signature() {
        let block = sample_block();
        let mut other = block.clone();
        other.index = 99;
        other.signature = [9; 64];
        assert_eq!(block.hash(), other.hash());
    }

    #[test]
    fn test_hash_covers_payload_and_author() {
        let block = sample_block();

        let mut tampered_payload = block.clone();
        tampered_payload.payload[0] ^= 1;
        assert_ne!(block.hash(), tampered_payload.hash());

        let mut tampered_author = block.clone();
        tampered_author.author[0] ^= 1;
        assert_ne!(block.hash(), tampered_author.hash());
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut bytes = sample_block().serialize();
        bytes.push(0);
        assert_eq!(Block::deserialize(&bytes), Err(CodecError::TrailingGarbage));
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = sample_block().serialize();
        assert_eq!(
            Block::deserialize(&bytes[..bytes.len() - 1]),
            Err(CodecError::Truncated)
        );
    }
}
