//! Reorg: when a fork accumulates more proof of work than its parent, the two
//! chains trade file segments and identities so that the stronger chain always
//! ends up addressed as the continuation of the (new) parent. Grounded on
//! Electrum's `Blockchain.swap_with_parent`; `koto-types`/`koto-chain` have no
//! teacher counterpart for this (the NEAR contract had no concept of files to
//! swap), so the shape follows `original_source/` directly.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use koto_types::hash::H256;

use crate::config::EngineConfig;
use crate::error::{ChainError, Result};
use crate::forest::ChainForest;
use crate::layout::{header_size_at, swap_offset_into_parent};

/// Repeatedly promotes `id` above its parent while it remains the stronger
/// chain, bounded by the registry size (a chain can displace at most every
/// other chain once before the loop must terminate).
#[tracing::instrument(skip(forest, config))]
pub fn swap_with_parent(forest: &ChainForest, config: &EngineConfig, id: H256) -> Result<()> {
    let max_iterations = forest.len();
    let mut current_id = id;

    for _ in 0..max_iterations {
        let chain = match forest.get(&current_id) {
            Some(c) => c,
            None => return Ok(()),
        };
        let parent_id = match chain.parent_id() {
            Some(p) => p,
            None => return Ok(()),
        };
        let parent = forest
            .get(&parent_id)
            .ok_or(ChainError::ChainNotFound(parent_id))?;

        // lock order: parent before self, matching every other entry point so a
        // concurrent save on the main chain can never deadlock against this
        let parent_guard = parent.state.lock();
        let chain_guard = chain.state.lock();

        let chain_work = forest.get_chainwork(&chain)?;
        let parent_work = forest.get_chainwork(&parent)?;
        if chain_work <= parent_work {
            return Ok(());
        }

        let forkpoint = chain_guard.borrow().forkpoint;
        let parent_forkpoint = parent_guard.borrow().forkpoint;

        let my_data = fs::read(chain.file_path())?;
        let parent_offset = swap_offset_into_parent(forkpoint, parent_forkpoint, config.sapling_height);
        let parent_data_full = fs::read(parent.file_path())?;
        if parent_offset as usize > parent_data_full.len() {
            return Err(ChainError::Io(format!(
                "swap offset {parent_offset} beyond parent file length {}",
                parent_data_full.len()
            )));
        }
        let parent_overlap = parent_data_full[parent_offset as usize..].to_vec();

        fs::write(chain.file_path(), &parent_overlap)?;
        {
            let mut parent_file = OpenOptions::new().write(true).open(parent.file_path())?;
            parent_file.seek(SeekFrom::Start(parent_offset))?;
            parent_file.write_all(&my_data)?;
            parent_file.set_len(parent_offset + my_data.len() as u64)?;
            parent_file.flush()?;
            parent_file.sync_all()?;
        }

        let old_parent_forkpoint_hash = parent_guard.borrow().forkpoint_hash;
        let old_parent_prev_hash = parent_guard.borrow().prev_hash;
        let old_parent_parent_id = parent_guard.borrow().parent_id;
        let old_chain_forkpoint_hash = chain_guard.borrow().forkpoint_hash;
        let old_chain_prev_hash = chain_guard.borrow().prev_hash;

        {
            let mut c = chain_guard.borrow_mut();
            c.forkpoint = parent_forkpoint;
            c.forkpoint_hash = old_parent_forkpoint_hash;
            c.prev_hash = old_parent_prev_hash;
            c.parent_id = old_parent_parent_id;
        }
        {
            let new_parent_header_size =
                header_size_at(forkpoint, config.sapling_height) as usize;
            let new_parent_forkpoint_hash =
                koto_types::hash::double_sha256(&parent_overlap[..new_parent_header_size]);

            let mut p = parent_guard.borrow_mut();
            p.forkpoint = forkpoint;
            p.forkpoint_hash = new_parent_forkpoint_hash;
            p.prev_hash = old_chain_prev_hash;
            p.parent_id = Some(old_parent_forkpoint_hash);
        }

        drop(chain_guard);
        drop(parent_guard);

        chain.update_size(config)?;
        parent.update_size(config)?;

        forest.rekey(old_chain_forkpoint_hash, chain.id());
        forest.rekey(parent_id, parent.id());

        tracing::info!(
            new_parent = ?chain.id(),
            old_parent = ?parent.id(),
            "swapped fork above its former parent"
        );

        current_id = chain.id();
    }

    Err(ChainError::ReorgLoop(max_iterations))
}
