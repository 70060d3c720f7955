//! The proof-of-work hash is a pure function of a header's serialized bytes and
//! its on-wire size, kept behind a trait per SPEC_FULL.md §9: there is no
//! maintained `yescrypt` crate to depend on, so a memory-hard `scrypt`-based
//! hasher stands in until a bit-exact `yescrypt` binding exists. Swapping it is a
//! one-line change at the config layer, not a redesign.

use koto_types::hash::H256;
use scrypt::Params;

/// Computes a block header's proof-of-work hash from its serialized bytes.
/// Implementations must be pure functions of `header_bytes` (no shared state).
pub trait PowHasher: Send + Sync {
    fn hash(&self, header_bytes: &[u8]) -> H256;
}

/// `scrypt(header_bytes, header_bytes, N=1024, r=1, p=1)`, truncated to 32 bytes.
/// The header itself is used as both password and salt, matching the way the
/// teacher's Litecoin/Dogecoin `scrypt_hash` feature derives a PoW hash from
/// header bytes alone, with no external salt material available.
pub struct ScryptPowHasher {
    params: Params,
}

impl ScryptPowHasher {
    #[must_use]
    pub fn new() -> Self {
        ScryptPowHasher {
            params: Params::new(10, 1, 1, 32).expect("static scrypt params are valid"),
        }
    }
}

impl Default for ScryptPowHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PowHasher for ScryptPowHasher {
    fn hash(&self, header_bytes: &[u8]) -> H256 {
        let mut out = [0u8; 32];
        scrypt::scrypt(header_bytes, header_bytes, &self.params, &mut out)
            .expect("32-byte output is within scrypt's valid output length range");
        H256(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_a_pure_function_of_input_bytes() {
        let hasher = ScryptPowHasher::new();
        let a = hasher.hash(b"some header bytes");
        let b = hasher.hash(b"some header bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_hash_differently() {
        let hasher = ScryptPowHasher::new();
        assert_ne!(hasher.hash(b"header a"), hasher.hash(b"header b"));
    }
}
