//! Engine configuration. `KotoEngineConfig` is the serializable, file-loadable
//! shape (TOML via the `config` crate, following `tari-project-tari`'s layered
//! config-file-plus-environment-override approach); `EngineConfig` is the
//! runtime value threaded through the engine, carrying the non-serializable
//! `PowHasher` trait object.

use std::path::PathBuf;
use std::sync::Arc;

use koto_types::hash::H256;
use koto_types::target::Target;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::pow::{PowHasher, ScryptPowHasher};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KotoEngineConfig {
    pub headers_dir: PathBuf,
    pub sapling_height: u32,
    pub testnet: bool,
    /// `(hex id, compact bits)` pairs, one per retarget chunk, least height first.
    #[serde(default)]
    pub checkpoints: Vec<(String, u32)>,
}

impl KotoEngineConfig {
    /// Loads configuration from a TOML file at `path`, with `KOTO_` prefixed
    /// environment variables overriding individual fields (e.g.
    /// `KOTO_TESTNET=true`), matching the layered approach the examples pack's
    /// node configuration (`tari-project-tari`) uses.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("KOTO"))
            .build()
            .map_err(|e| ChainError::Io(e.to_string()))?;
        settings
            .try_deserialize()
            .map_err(|e| ChainError::Io(e.to_string()))
    }

    pub fn into_engine_config(self) -> Result<EngineConfig> {
        let mut checkpoints = Vec::with_capacity(self.checkpoints.len());
        for (hex_id, bits) in &self.checkpoints {
            let id = H256::from_hex_id(hex_id)?;
            let target = koto_types::target::bits_to_target(*bits)?;
            checkpoints.push((id, target));
        }

        Ok(EngineConfig {
            headers_dir: self.headers_dir,
            sapling_height: self.sapling_height,
            testnet: self.testnet,
            checkpoints,
            pow_hasher: Arc::new(ScryptPowHasher::new()),
        })
    }
}

/// Runtime configuration threaded through the store/forest/retarget/verify/reorg
/// operations.
#[derive(Clone)]
pub struct EngineConfig {
    pub headers_dir: PathBuf,
    pub sapling_height: u32,
    pub testnet: bool,
    pub checkpoints: Vec<(H256, Target)>,
    pub pow_hasher: Arc<dyn PowHasher>,
}

impl EngineConfig {
    #[must_use]
    pub fn max_checkpoint(&self) -> Option<u32> {
        koto_types::checkpoints::max_checkpoint(
            &self
                .checkpoints
                .iter()
                .map(|(id, target)| (*id, *target))
                .collect::<Vec<_>>(),
        )
    }

    #[must_use]
    pub fn for_testing(headers_dir: PathBuf, sapling_height: u32) -> Self {
        EngineConfig {
            headers_dir,
            sapling_height,
            testnet: false,
            checkpoints: Vec::new(),
            pow_hasher: Arc::new(ScryptPowHasher::new()),
        }
    }
}
