use koto_types::hash::H256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("missing header at height {0}")]
    MissingHeader(u32),

    #[error("invalid header: {0}")]
    InvalidHeader(#[from] koto_types::error::TypesError),

    #[error("header hash mismatch at height {height}: expected {expected:?}, got {actual:?}")]
    HashMismatch { height: u32, expected: H256, actual: H256 },

    #[error("prev_block_hash mismatch at height {height}")]
    PrevHashMismatch { height: u32 },

    #[error("bits mismatch at height {height}: expected {expected:#010x}, got {actual:#010x}")]
    BitsMismatch {
        height: u32,
        expected: u32,
        actual: u32,
    },

    #[error("insufficient proof of work at height {0}")]
    InsufficientProofOfWork(u32),

    #[error("reorg loop exceeded safety bound of {0} iterations")]
    ReorgLoop(usize),

    #[error("fork at height {forkpoint} is at or below max checkpoint {max_checkpoint}")]
    ForkBelowCheckpoint { forkpoint: u32, max_checkpoint: u32 },

    #[error("chain not found for id {0:?}")]
    ChainNotFound(H256),

    #[error("header must be appended contiguously: chain height is {height}, expected height {expected}")]
    NonContiguousAppend { height: u32, expected: u32 },

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChainError {
    fn from(e: std::io::Error) -> Self {
        ChainError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
