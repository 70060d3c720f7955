use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("not a recognized redeem script")]
    NotRecognizedRedeemScript,
}

pub type Result<T> = std::result::Result<T, TxError>;
