use thiserror::Error;

/// Failures raised while decoding or validating the core wire types: headers,
/// compact targets, and hashes. Consensus-level failures (continuity, PoW) live in
/// `koto-chain`'s error type, which wraps this one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid header: expected {expected} bytes for height {height}, got {actual}")]
    InvalidHeader {
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("invalid compact bits {bits:#010x}: exponent {exponent} or mantissa {mantissa:#08x} out of range")]
    InvalidBits {
        bits: u32,
        exponent: u32,
        mantissa: u32,
    },

    #[error("invalid hex hash: {0}")]
    InvalidHex(String),
}
