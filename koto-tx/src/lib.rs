pub mod codec;
pub mod error;
pub mod script;
pub mod sighash;
pub mod stream;

pub use codec::Transaction;
pub use error::TxError;
