//! Unverified entries
//!
//! An [`Entry`] is a decoded block plus its derived hash, not yet checked
//! against the verification rules. The verifier consumes entries and either
//! applies them to the trustchain state or rejects them individually.

use sigil_blocks::{Block, Nature, Payload};
use sigil_core::serialize::Result as CodecResult;
use sigil_core::HASH_SIZE;
use sigil_crypto::SIGNATURE_SIZE;

/// A decoded, not yet verified block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Per-trustchain sequence number.
    pub index: u64,
    /// Wire nature of the block.
    pub nature: Nature,
    /// Decoded payload.
    pub payload: Payload,
    /// Author device id, or the trustchain id for root-authored blocks.
    pub author: [u8; HASH_SIZE],
    /// Block signature.
    pub signature: [u8; SIGNATURE_SIZE],
    /// Block hash, the entry's identity.
    pub hash: [u8; HASH_SIZE],
}

impl Entry {
    /// Decode a framed block into an entry.
    pub fn from_block(block: &Block) -> CodecResult<Self> {
        Ok(Self {
            index: block.index,
            nature: block.nature,
            payload: Payload::deserialize(block.nature, &block.payload)?,
            author: block.author,
            signature: block.signature,
            hash: block.hash(),
        })
    }

    /// Decode wire bytes into an entry.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        Self::from_block(&Block::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_blocks::TrustchainCreation;
    use sigil_core::TrustchainId;

    #[test]
    fn test_entry_keeps_block_hash() {
        let payload = Payload::TrustchainCreation(TrustchainCreation {
            public_signature_key: [1; 32],
        });
        let block = Block {
            index: 1,
            trustchain_id: TrustchainId::new([2; 32]),
            nature: Nature::TrustchainCreation,
            payload: payload.serialize(Nature::TrustchainCreation).unwrap(),
            author: [0; 32],
            signature: [0; 64],
        };
        let entry = Entry::from_block(&block).unwrap();
        assert_eq!(entry.hash, block.hash());
        assert_eq!(entry.payload, payload);

        let reparsed = Entry::from_bytes(&block.serialize()).unwrap();
        assert_eq!(reparsed, entry);
    }
}
