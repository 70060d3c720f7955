//! Header chain store, chain forest, retarget engine, verification, and reorg
//! logic for the Koto light header-chain engine. The wallet layer (not part of
//! this crate) drives everything here through [`ChainForest`] and [`Chain`].

pub mod config;
pub mod error;
pub mod forest;
pub mod layout;
pub mod pow;
pub mod retarget;
pub mod reorg;
pub mod store;
pub mod verify;

pub use config::{EngineConfig, KotoEngineConfig};
pub use error::{ChainError, Result};
pub use forest::ChainForest;
pub use pow::{PowHasher, ScryptPowHasher};
pub use store::{Chain, ChainState};
