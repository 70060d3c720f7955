use crate::hash::H256;
use crate::target::Target;

/// One entry per retarget chunk (2016 headers): the id and target of the chunk's
/// last header. Chains below `max_checkpoint(CHECKPOINTS)` skip transaction-level
/// verification for off-boundary headers inside the checkpointed region (see
/// `koto_chain::verify`).
pub type Checkpoint = (H256, Target);

pub const BLOCKS_PER_CHUNK: u32 = 2016;

/// The compiled-in checkpoint table. Empty by default; a deployment wires its own
/// table in through `koto_chain::config::EngineConfig` (hardcoding a specific
/// chain's checkpoints in this crate would make the engine chain-specific, which
/// `koto-chain`'s config layer exists to avoid).
pub const CHECKPOINTS: &[Checkpoint] = &[];

/// The highest height still covered by the checkpoint table (`len*2016 - 1`), or
/// `None` when there are no checkpoints. Forks at or below this height are
/// rejected with `ForkBelowCheckpoint`.
#[must_use]
pub fn max_checkpoint(checkpoints: &[Checkpoint]) -> Option<u32> {
    if checkpoints.is_empty() {
        None
    } else {
        Some(checkpoints.len() as u32 * BLOCKS_PER_CHUNK - 1)
    }
}

/// Whether `height` lands exactly on a chunk boundary (`height % 2016 == 0`).
#[must_use]
pub fn is_chunk_boundary(height: u32) -> bool {
    height % BLOCKS_PER_CHUNK == 0
}

/// The chunk index a height belongs to.
#[must_use]
pub fn chunk_index(height: u32) -> u32 {
    height / BLOCKS_PER_CHUNK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_checkpoint_of_one_entry_is_2015() {
        let table = vec![(H256::ZERO, Target::ZERO)];
        assert_eq!(max_checkpoint(&table), Some(2015));
    }

    #[test]
    fn empty_table_has_no_max() {
        assert_eq!(max_checkpoint(&[]), None);
    }
}
