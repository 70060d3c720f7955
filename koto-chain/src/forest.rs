//! The chain forest: a registry of every known chain (the main chain plus any
//! number of forks), keyed by chain id (the hash of each chain's first header).
//! Grounded on Electrum's `blockchain.blockchains` global dict and
//! `read_blockchains` startup scan (see `original_source/`), reworked into an
//! owned, lockable registry per SPEC_FULL.md §5.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use koto_types::hash::H256;
use koto_types::header::Header;
use koto_types::target::{chainwork_of_target, Target, Work};
use parking_lot::ReentrantMutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{ChainError, Result};
use crate::store::{Chain, ChainState};

/// Registry of every chain known to this engine, keyed by chain id.
pub struct ChainForest {
    registry: ReentrantMutex<RefCell<HashMap<H256, Arc<Chain>>>>,
    pub config: EngineConfig,
}

impl ChainForest {
    #[must_use]
    pub fn empty(config: EngineConfig) -> Self {
        let main = Arc::new(Chain::new(config.headers_dir.clone(), ChainState::genesis()));
        let mut map = HashMap::new();
        map.insert(main.id(), main);
        ChainForest {
            registry: ReentrantMutex::new(RefCell::new(map)),
            config,
        }
    }

    #[must_use]
    pub fn get(&self, id: &H256) -> Option<Arc<Chain>> {
        self.registry.lock().borrow().get(id).cloned()
    }

    #[must_use]
    pub fn main_chain(&self) -> Arc<Chain> {
        self.registry
            .lock()
            .borrow()
            .values()
            .find(|c| c.parent_id().is_none())
            .cloned()
            .expect("the main chain is always present")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn chains(&self) -> Vec<Arc<Chain>> {
        self.registry.lock().borrow().values().cloned().collect()
    }

    pub fn insert(&self, chain: Arc<Chain>) {
        self.registry.lock().borrow_mut().insert(chain.id(), chain);
    }

    /// Re-keys a chain whose identity changed (its first header's hash changed,
    /// as happens on both sides of a `swap_with_parent`).
    pub fn rekey(&self, old_id: H256, new_id: H256) {
        if old_id == new_id {
            return;
        }
        let registry = self.registry.lock();
        let mut map = registry.borrow_mut();
        if let Some(chain) = map.remove(&old_id) {
            map.insert(new_id, chain);
        }
    }

    /// Reads a header at `height` from whichever chain owns that height,
    /// preferring `chain` and walking up its `parent_id` chain otherwise.
    pub fn read_header_from(&self, chain: &Chain, height: u32) -> Result<Option<Header>> {
        let parent = chain.parent_id().and_then(|id| self.get(&id));
        chain.read_header(&self.config, parent.as_deref(), height)
    }

    /// Total chain work accumulated from genesis to `chain`'s tip. Recomputed on
    /// demand; callers invoke this on the handful of candidate chains in the
    /// registry, not per-header.
    pub fn get_chainwork(&self, chain: &Chain) -> Result<Work> {
        let mut total = Work::ZERO;
        let tip = chain.height();
        if tip < 0 {
            return Ok(total);
        }
        for height in 0..=(tip as u32) {
            let header = self
                .read_header_from(chain, height)?
                .ok_or(ChainError::MissingHeader(height))?;
            let target = koto_types::target::bits_to_target(header.bits)?;
            total = total.overflowing_add(chainwork_of_target(&target)).0;
        }
        Ok(total)
    }

    /// The chain with the greatest accumulated proof of work.
    pub fn get_best_chain(&self) -> Result<Arc<Chain>> {
        let mut best: Option<(Arc<Chain>, Work)> = None;
        for chain in self.chains() {
            let work = self.get_chainwork(&chain)?;
            best = match best {
                Some((_, best_work)) if best_work >= work => best,
                _ => Some((chain, work)),
            };
        }
        best.map(|(chain, _)| chain)
            .ok_or(ChainError::ChainNotFound(H256::ZERO))
    }

    /// Finds the chain whose current tip hash equals `header.prev_block_hash`,
    /// i.e. the chain `header` would directly extend.
    #[must_use]
    pub fn check_header(&self, header: &Header) -> Option<Arc<Chain>> {
        self.chains().into_iter().find(|c| {
            let tip_height = c.height();
            tip_height >= 0
                && self
                    .read_header_from(c, tip_height as u32)
                    .ok()
                    .flatten()
                    .map(|h| h.id() == header.prev_block_hash)
                    .unwrap_or(false)
        })
    }

    /// Whether `header` can be connected to any known chain without a gap.
    #[must_use]
    pub fn can_connect(&self, header: &Header) -> bool {
        self.check_header(header).is_some()
    }

    /// Creates a new fork chain starting at `height` with `header` as its first
    /// record, parented on `parent`.
    pub fn fork(&self, parent: &Chain, height: u32, header: &Header) -> Result<Arc<Chain>> {
        if let Some(max) = self.config.max_checkpoint() {
            if height <= max {
                return Err(ChainError::ForkBelowCheckpoint {
                    forkpoint: height,
                    max_checkpoint: max,
                });
            }
        }

        let state = ChainState {
            forkpoint: height,
            forkpoint_hash: header.id(),
            prev_hash: Some(header.prev_block_hash),
            parent_id: Some(parent.id()),
            size: 0,
        };
        let fork_chain = Arc::new(Chain::new(self.config.headers_dir.clone(), state));
        fork_chain.save_header(&self.config, height, header)?;
        self.insert(fork_chain.clone());
        info!(height, "created fork chain");
        Ok(fork_chain)
    }

    pub fn get_checkpoints(&self) -> &[(H256, Target)] {
        &self.config.checkpoints
    }

    /// Startup discovery: inserts the main chain, then scans `headers_dir/forks`
    /// for `fork2_<forkpoint>_<prev>_<first>` files, validating each against its
    /// parent before admitting it into the registry. Unparseable or
    /// below-checkpoint fork files are removed rather than silently ignored.
    #[tracing::instrument(skip(config))]
    pub fn read_chains(config: EngineConfig) -> Result<Self> {
        let forest = ChainForest::empty(config);
        forest.main_chain().update_size(&forest.config)?;

        let forks_dir = forest.config.headers_dir.join("forks");
        let Ok(entries) = fs::read_dir(&forks_dir) else {
            return Ok(forest);
        };

        let mut candidates: Vec<(u32, H256, H256, std::path::PathBuf)> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            match parse_fork_filename(name) {
                Some(parsed) => candidates.push((parsed.0, parsed.1, parsed.2, path)),
                None => warn!(file = name, "ignoring unparseable fork filename"),
            }
        }
        candidates.sort_by_key(|(forkpoint, _, _, _)| *forkpoint);

        for (forkpoint, prev, first, path) in candidates {
            if let Some(max) = forest.config.max_checkpoint() {
                if forkpoint <= max {
                    warn!(forkpoint, "dropping fork at or below max checkpoint");
                    let _ = fs::remove_file(&path);
                    continue;
                }
            }

            let parent = match forest.find_parent_for(forkpoint, prev) {
                Some(p) => p,
                None => {
                    warn!(forkpoint, "no parent chain found for fork, skipping");
                    continue;
                }
            };

            let state = ChainState {
                forkpoint,
                forkpoint_hash: first,
                prev_hash: Some(prev),
                parent_id: Some(parent.id()),
                size: 0,
            };
            let chain = Arc::new(Chain::new(forest.config.headers_dir.clone(), state));
            chain.update_size(&forest.config)?;

            match chain.read_header(&forest.config, Some(parent.as_ref()), forkpoint)? {
                Some(h) if h.id() == first => {
                    forest.insert(chain);
                }
                _ => {
                    warn!(forkpoint, "fork file's first header does not match its name, skipping");
                }
            }
        }

        Ok(forest)
    }

    fn find_parent_for(&self, forkpoint: u32, prev: H256) -> Option<Arc<Chain>> {
        self.chains().into_iter().find(|c| {
            if forkpoint == 0 {
                return false;
            }
            self.read_header_from(c, forkpoint - 1)
                .ok()
                .flatten()
                .map(|h| h.id() == prev)
                .unwrap_or(false)
        })
    }
}

fn parse_fork_filename(name: &str) -> Option<(u32, H256, H256)> {
    let mut parts = name.split('_');
    if parts.next()? != "fork2" {
        return None;
    }
    let forkpoint: u32 = parts.next()?.parse().ok()?;
    let prev = H256::from_hex_id(&pad_hex(parts.next()?)).ok()?;
    let first = H256::from_hex_id(&pad_hex(parts.next()?)).ok()?;
    Some((forkpoint, prev, first))
}

fn pad_hex(stripped: &str) -> String {
    format!("{stripped:0>64}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_filename_round_trips_through_strip_and_pad() {
        let prev = H256([0xab; 32]);
        let first = H256([0xcd; 32]);
        let name = format!(
            "fork2_10_{}_{}",
            crate::store::strip_leading_zeros(&prev.to_hex_id()),
            crate::store::strip_leading_zeros(&first.to_hex_id())
        );
        let (forkpoint, parsed_prev, parsed_first) = parse_fork_filename(&name).unwrap();
        assert_eq!(forkpoint, 10);
        assert_eq!(parsed_prev, prev);
        assert_eq!(parsed_first, first);
    }

    #[test]
    fn unparseable_filename_is_rejected() {
        assert!(parse_fork_filename("not_a_fork_file").is_none());
    }

    #[test]
    fn empty_forest_has_only_main_chain() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::for_testing(dir.path().to_path_buf(), 100);
        let forest = ChainForest::empty(config);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.main_chain().forkpoint(), 0);
    }
}
