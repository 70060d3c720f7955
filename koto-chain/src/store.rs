//! Per-chain file storage: one fixed-offset, append-only file per `Blockchain`,
//! with the mid-file record-size transition at the chain's configured Sapling
//! activation height. Grounded on `contract/src/lib.rs`'s
//! `store_block_header`/`remove_block_header` shape, generalized from an
//! in-memory `LookupMap` to real file I/O per SPEC_FULL.md §4.4.

use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use koto_types::hash::H256;
use koto_types::header::Header;
use parking_lot::ReentrantMutex;
use tracing::instrument;

use crate::config::EngineConfig;
use crate::error::{ChainError, Result};
use crate::layout::{header_size_at, offset_for_height, size_from_file_len};

/// The mutable bookkeeping the chain forest rewires on fork discovery and reorg.
#[derive(Clone, Debug)]
pub struct ChainState {
    pub forkpoint: u32,
    pub forkpoint_hash: H256,
    pub prev_hash: Option<H256>,
    pub parent_id: Option<H256>,
    pub size: u32,
}

impl ChainState {
    #[must_use]
    pub fn genesis() -> Self {
        ChainState {
            forkpoint: 0,
            forkpoint_hash: H256::ZERO,
            prev_hash: None,
            parent_id: None,
            size: 0,
        }
    }
}

/// One chain's file and mutable metadata, guarded by a reentrant, per-chain lock
/// (SPEC_FULL.md §5: `save_chunk` may re-enter the main chain's lock while a
/// fork's lock is already held by the same thread).
pub struct Chain {
    pub state: ReentrantMutex<RefCell<ChainState>>,
    headers_dir: PathBuf,
}

impl Chain {
    #[must_use]
    pub fn new(headers_dir: PathBuf, state: ChainState) -> Self {
        Chain {
            state: ReentrantMutex::new(RefCell::new(state)),
            headers_dir,
        }
    }

    #[must_use]
    pub fn id(&self) -> H256 {
        self.state.lock().borrow().forkpoint_hash
    }

    #[must_use]
    pub fn forkpoint(&self) -> u32 {
        self.state.lock().borrow().forkpoint
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<H256> {
        self.state.lock().borrow().parent_id
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.state.lock().borrow().size
    }

    /// Last persisted height, or `forkpoint - 1` (may be negative for an empty
    /// main chain) when the chain has no headers yet.
    #[must_use]
    pub fn height(&self) -> i64 {
        let st = self.state.lock();
        let st = st.borrow();
        i64::from(st.forkpoint) + i64::from(st.size) - 1
    }

    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        let st = self.state.lock();
        let st = st.borrow();
        self.file_path_for(&st)
    }

    fn file_path_for(&self, st: &ChainState) -> PathBuf {
        if st.forkpoint == 0 {
            self.headers_dir.join("blockchain_headers")
        } else {
            let prev = strip_leading_zeros(&st.prev_hash.unwrap_or(H256::ZERO).to_hex_id());
            let first = strip_leading_zeros(&st.forkpoint_hash.to_hex_id());
            self.headers_dir
                .join("forks")
                .join(format!("fork2_{}_{}_{}", st.forkpoint, prev, first))
        }
    }

    /// Reads the header at `height`, delegating to `parent` when `height` falls
    /// before this chain's forkpoint. Returns `Ok(None)` when `height` is past
    /// this chain's current tip, or when the on-disk record is all-zero bytes (a
    /// tombstone).
    pub fn read_header(
        &self,
        config: &EngineConfig,
        parent: Option<&Chain>,
        height: u32,
    ) -> Result<Option<Header>> {
        let (forkpoint, chain_height) = {
            let st = self.state.lock();
            let st = st.borrow();
            (st.forkpoint, self.height())
        };

        if height < forkpoint {
            return match parent {
                Some(p) => p.read_header(config, None, height),
                None => Ok(None),
            };
        }
        if i64::from(height) > chain_height {
            return Ok(None);
        }

        let path = self.file_path();
        let size = header_size_at(height, config.sapling_height);
        let offset = offset_for_height(height, forkpoint, config.sapling_height);

        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let metadata_len = file.metadata()?.len();
        if offset + size > metadata_len {
            return Err(ChainError::MissingHeader(height));
        }

        let mut buf = vec![0u8; size as usize];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;

        if buf.iter().all(|b| *b == 0) {
            return Ok(None);
        }

        Ok(Some(Header::deserialize(&buf, height, config.sapling_height)?))
    }

    /// Appends `header` at `height`, which must equal `forkpoint + size`
    /// (strict contiguity). Does not run the reorg check; callers invoke
    /// `crate::reorg::swap_with_parent` afterwards.
    #[instrument(skip(self, config, header), fields(height = height))]
    pub fn save_header(&self, config: &EngineConfig, height: u32, header: &Header) -> Result<()> {
        let (forkpoint, expected_next) = {
            let st = self.state.lock();
            let st = st.borrow();
            (st.forkpoint, st.forkpoint + st.size)
        };
        if height != expected_next {
            return Err(ChainError::NonContiguousAppend {
                height,
                expected: expected_next,
            });
        }

        let offset = offset_for_height(height, forkpoint, config.sapling_height);
        self.write(&header.serialize(), offset, false)?;
        self.update_size(config)?;
        tracing::debug!(height, "saved header");
        Ok(())
    }

    /// Persists a 2016-header chunk at chunk `index` to this chain's own file.
    /// Checkpointed chunks belonging to a fork are redirected to the main chain
    /// by `verify::connect_chunk` before this is ever called; this method always
    /// writes to `self`.
    #[instrument(skip(self, config, data), fields(index = index))]
    pub fn save_chunk(&self, config: &EngineConfig, index: u32, data: &[u8]) -> Result<()> {
        let forkpoint = self.forkpoint();
        let chunk_start_height = index * koto_types::checkpoints::BLOCKS_PER_CHUNK;

        let within_checkpoint_region = config
            .max_checkpoint()
            .is_some_and(|max| chunk_start_height <= max);

        let mut offset = offset_for_height(chunk_start_height, forkpoint, config.sapling_height);
        let mut payload = data;

        if chunk_start_height < forkpoint {
            // clip the chunk prefix that would precede this chain's forkpoint
            let skip_headers = forkpoint - chunk_start_height;
            let mut skip_bytes = 0u64;
            let mut h = chunk_start_height;
            for _ in 0..skip_headers {
                skip_bytes += header_size_at(h, config.sapling_height);
                h += 1;
            }
            payload = &data[skip_bytes as usize..];
            offset = offset_for_height(forkpoint, forkpoint, config.sapling_height);
        }

        self.write(payload, offset, !within_checkpoint_region)?;
        self.update_size(config)?;
        Ok(())
    }

    /// Opens the file read-write (creating it if absent), optionally truncating
    /// from `offset` onward, writes `data`, then flushes and fsyncs before
    /// returning — every write is durable before the per-chain lock is released.
    fn write(&self, data: &[u8], offset: u64, truncate: bool) -> Result<()> {
        let path = self.file_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        if truncate {
            file.set_len(offset)?;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Recomputes `size` from the file's current byte length.
    pub fn update_size(&self, config: &EngineConfig) -> Result<()> {
        let path = self.file_path();
        let file_len = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let forkpoint = self.forkpoint();
        let size = size_from_file_len(file_len, forkpoint, config.sapling_height);

        let st = self.state.lock();
        st.borrow_mut().size = size;
        Ok(())
    }
}

/// Strips leading `'0'` characters from a hex string, matching the fork filename
/// convention (`fork2_<forkpoint>_<prev_stripped>_<first_stripped>`).
#[must_use]
pub fn strip_leading_zeros(hex: &str) -> String {
    let stripped = hex.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koto_types::header::Header;

    fn test_config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig::for_testing(dir.to_path_buf(), 3)
    }

    fn header(nonce: u32) -> Header {
        Header {
            version: 1,
            prev_block_hash: H256::ZERO,
            merkle_root: H256::ZERO,
            time: 0,
            bits: 0x1d00_ffff,
            nonce,
            final_sapling_root: None,
        }
    }

    #[test]
    fn save_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let chain = Chain::new(dir.path().to_path_buf(), ChainState::genesis());

        let h0 = header(1);
        chain.save_header(&config, 0, &h0).unwrap();
        let read_back = chain.read_header(&config, None, 0).unwrap().unwrap();
        assert_eq!(read_back, h0);
    }

    #[test]
    fn non_contiguous_append_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let chain = Chain::new(dir.path().to_path_buf(), ChainState::genesis());

        assert!(chain.save_header(&config, 1, &header(1)).is_err());
    }

    #[test]
    fn sapling_transition_file_size_matches_invariant() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let chain = Chain::new(dir.path().to_path_buf(), ChainState::genesis());

        for height in 0..3u32 {
            chain.save_header(&config, height, &header(height)).unwrap();
        }
        for height in 3..5u32 {
            let mut h = header(height);
            h.final_sapling_root = Some(H256::ZERO);
            chain.save_header(&config, height, &h).unwrap();
        }

        let file_len = fs::metadata(chain.file_path()).unwrap().len();
        assert_eq!(file_len, 3 * 80 + 2 * 112);
        assert_eq!(chain.size(), 5);
    }

    #[test]
    fn read_past_tip_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let chain = Chain::new(dir.path().to_path_buf(), ChainState::genesis());
        chain.save_header(&config, 0, &header(1)).unwrap();
        assert!(chain.read_header(&config, None, 5).unwrap().is_none());
    }
}
