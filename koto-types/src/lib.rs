pub mod checkpoints;
pub mod error;
pub mod hash;
pub mod header;
pub mod target;
pub mod u256;

pub use error::TypesError;
pub use hash::{double_sha256, H256};
pub use header::{Header, SAPLING_HEIGHT};
pub use target::{Target, Work, MAX_TARGET};
pub use u256::U256;
