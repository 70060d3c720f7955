use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::hash::{double_sha256, H256};
use crate::target::{bits_to_target, target_to_bits, Target, Work};

/// Default Sapling activation height used by fixtures and tests. Real chains
/// configure their own value through `koto_chain::config::EngineConfig`; nothing in
/// this crate hardcodes it for consensus purposes — every (de)serialization call
/// takes the activation height explicitly.
pub const SAPLING_HEIGHT: u32 = 200_000;

const PRE_SAPLING_SIZE: usize = 4 + 32 + 32 + 4 + 4 + 4; // 80
const POST_SAPLING_SIZE: usize = PRE_SAPLING_SIZE + 32; // 112

/// A Koto block header: the pre-Sapling 80-byte transparent layout, plus an
/// optional 32-byte Sapling commitment root once the chain crosses
/// `SAPLING_HEIGHT`. `final_sapling_root` is `Some` exactly when this header's
/// height is at or past the activation height.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub prev_block_hash: H256,
    pub merkle_root: H256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
    pub final_sapling_root: Option<H256>,
}

impl Header {
    /// Wire size for a header at `height`, given the chain's Sapling activation
    /// height.
    #[must_use]
    pub fn size_on_wire(height: u32, sapling_height: u32) -> usize {
        if height >= sapling_height {
            POST_SAPLING_SIZE
        } else {
            PRE_SAPLING_SIZE
        }
    }

    /// Serializes in fixed little-endian field order. The Sapling root is appended
    /// only when present, independent of the caller's notion of height — callers
    /// are responsible for constructing `final_sapling_root` consistently with
    /// `size_on_wire`.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(POST_SAPLING_SIZE);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.prev_block_hash.0);
        out.extend_from_slice(&self.merkle_root.0);
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        if let Some(root) = &self.final_sapling_root {
            out.extend_from_slice(&root.0);
        }
        out
    }

    /// Deserializes a header known to sit at `height` in a chain whose Sapling
    /// activation height is `sapling_height`. Fails with
    /// [`TypesError::InvalidHeader`] when `bytes.len()` doesn't match the size
    /// `size_on_wire` expects for that height — the wire `version` field is never
    /// consulted to decide record size, matching the original consensus rule.
    pub fn deserialize(bytes: &[u8], height: u32, sapling_height: u32) -> Result<Self, TypesError> {
        let expected = Self::size_on_wire(height, sapling_height);
        if bytes.len() != expected {
            return Err(TypesError::InvalidHeader {
                height,
                expected,
                actual: bytes.len(),
            });
        }

        let version = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let prev_block_hash = H256(bytes[4..36].try_into().unwrap());
        let merkle_root = H256(bytes[36..68].try_into().unwrap());
        let time = u32::from_le_bytes(bytes[68..72].try_into().unwrap());
        let bits = u32::from_le_bytes(bytes[72..76].try_into().unwrap());
        let nonce = u32::from_le_bytes(bytes[76..80].try_into().unwrap());
        let final_sapling_root = if expected == POST_SAPLING_SIZE {
            Some(H256(bytes[80..112].try_into().unwrap()))
        } else {
            None
        };

        Ok(Header {
            version,
            prev_block_hash,
            merkle_root,
            time,
            bits,
            nonce,
            final_sapling_root,
        })
    }

    /// The conventional big-endian hex id: `hash_encode(sha256(sha256(serialize)))`.
    #[must_use]
    pub fn id(&self) -> H256 {
        double_sha256(&self.serialize())
    }

    /// Decompact this header's `bits` field into a 256-bit target.
    pub fn target(&self) -> Result<Target, TypesError> {
        bits_to_target(self.bits)
    }
}

#[must_use]
pub fn encode_bits_for_target(target: &Target) -> u32 {
    target_to_bits(target)
}

/// A [`Header`] annotated with the bookkeeping the chain forest needs: the
/// attached (not on-wire) height, the header's own id, and the cumulative
/// chainwork up to and including it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub header: Header,
    pub id: H256,
    pub height: u32,
    pub chain_work: Work,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(final_sapling_root: Option<H256>) -> Header {
        Header {
            version: 4,
            prev_block_hash: H256([1u8; 32]),
            merkle_root: H256([2u8; 32]),
            time: 1_600_000_000,
            bits: 0x1d00_ffff,
            nonce: 42,
            final_sapling_root,
        }
    }

    #[test]
    fn pre_sapling_round_trip() {
        let h = sample_header(None);
        let bytes = h.serialize();
        assert_eq!(bytes.len(), PRE_SAPLING_SIZE);
        let decoded = Header::deserialize(&bytes, 0, 100).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn post_sapling_round_trip() {
        let h = sample_header(Some(H256([3u8; 32])));
        let bytes = h.serialize();
        assert_eq!(bytes.len(), POST_SAPLING_SIZE);
        let decoded = Header::deserialize(&bytes, 100, 100).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn deserialize_rejects_wrong_length_for_height() {
        let h = sample_header(None);
        let bytes = h.serialize();
        let err = Header::deserialize(&bytes, 100, 100).unwrap_err();
        assert!(matches!(err, TypesError::InvalidHeader { .. }));
    }
}
