//! The Koto difficulty retarget rule: a 17-block trailing average target, damped
//! against a 1020-second timespan using median-of-11 timestamps (the standard
//! anti-timewarp defense), clamped to `[84%, 132%]` of the target timespan.
//! Grounded on `original_source/`'s retarget routine; the Bitcoin-style single-step
//! rule the teacher's `contract/src/bitcoin.rs` implements is the wrong shape for
//! Koto's per-block retarget, so this module is new rather than adapted.

use koto_types::checkpoints::{chunk_index, is_chunk_boundary};
use koto_types::header::Header;
use koto_types::target::{bits_to_target, Target, MAX_TARGET};
use koto_types::u256::U256;

use crate::config::EngineConfig;
use crate::error::{ChainError, Result};

/// Number of trailing blocks averaged for the target.
pub const BLOCK_WINDOW: u32 = 17;
/// Target spacing for the averaging window, in seconds (`17 * 60`).
pub const TARGET_TIMESPAN: i64 = 1020;
/// Blocks used for the anti-timewarp median timestamp.
pub const MEDIAN_TIME_SPAN: usize = 11;

/// Looks up the target effective for `height`: a checkpointed target on chunk
/// boundaries within the checkpointed region, `0` for other heights inside that
/// region (verification there is skipped — see `verify::verify_header`), and
/// otherwise the computed windowed-average retarget.
pub fn get_target(
    height: i64,
    header_at: &dyn Fn(u32) -> Option<Header>,
    config: &EngineConfig,
) -> Result<Target> {
    if config.testnet {
        return Ok(Target::ZERO);
    }
    if height < 0 {
        return Ok(MAX_TARGET);
    }
    let height = height as u32;

    if let Some(max) = config.max_checkpoint() {
        if height <= max {
            return if is_chunk_boundary(height) {
                let idx = chunk_index(height) as usize;
                Ok(config
                    .checkpoints
                    .get(idx)
                    .map(|(_, target)| *target)
                    .unwrap_or(Target::ZERO))
            } else {
                Ok(Target::ZERO)
            };
        }
    }

    get_target_koto(height, header_at, config)
}

/// The windowed, damped retarget computation proper.
pub fn get_target_koto(
    height: u32,
    header_at: &dyn Fn(u32) -> Option<Header>,
    config: &EngineConfig,
) -> Result<Target> {
    // genesis warm-up window: below len(checkpoints)*2016 + 28 there isn't enough
    // retarget history to trust, so bits/PoW verification is skipped entirely (see
    // verify::verify_header's Target::ZERO handling) rather than averaged over a
    // window that doesn't exist yet. With the default empty checkpoint table this
    // degenerates to `height < 28`.
    let warm_up_ceiling = config.checkpoints.len() as u32 * koto_types::checkpoints::BLOCKS_PER_CHUNK + 28;
    if height < warm_up_ceiling {
        return Ok(Target::ZERO);
    }
    if height < BLOCK_WINDOW {
        return Ok(MAX_TARGET);
    }

    let mut sum_of_targets = U256::ZERO;
    for h in (height - BLOCK_WINDOW + 1)..=height {
        let header = header_at(h).ok_or(ChainError::MissingHeader(h))?;
        let target = bits_to_target(header.bits)?;
        sum_of_targets = sum_of_targets.overflowing_add(target).0;
    }
    let avg_target = sum_of_targets / U256::from(u64::from(BLOCK_WINDOW));

    let last_time = median_time(header_at, height)?;
    let first_time = median_time(header_at, height - BLOCK_WINDOW)?;
    let actual_timespan = last_time - first_time;

    // damp toward the target timespan; truncating division matches the reference
    // implementation's fix-up logic for its own floor-division retarget bug
    let diff = actual_timespan - TARGET_TIMESPAN;
    let damped_timespan = TARGET_TIMESPAN + diff / 4;

    let min_timespan = TARGET_TIMESPAN * 84 / 100;
    let max_timespan = TARGET_TIMESPAN * 132 / 100;
    let clamped_timespan = damped_timespan.clamp(min_timespan, max_timespan);

    // division before multiplication: matches the reference implementation's
    // integer-truncation behavior bit for bit, not merely its intent
    let new_target = (avg_target / U256::from(TARGET_TIMESPAN as u64))
        .overflowing_mul(clamped_timespan as u64)
        .0;

    Ok(if new_target > MAX_TARGET { MAX_TARGET } else { new_target })
}

/// The median of up to 11 timestamps walking backward from `height`, Bitcoin's
/// standard defense against timestamp manipulation in the retarget input.
fn median_time(header_at: &dyn Fn(u32) -> Option<Header>, height: u32) -> Result<i64> {
    let mut times = Vec::with_capacity(MEDIAN_TIME_SPAN);
    let mut h = height;
    for _ in 0..MEDIAN_TIME_SPAN {
        if h == 0 {
            break;
        }
        let header = header_at(h).ok_or(ChainError::MissingHeader(h))?;
        times.push(i64::from(header.time));
        h -= 1;
    }
    if times.is_empty() {
        return Err(ChainError::MissingHeader(0));
    }
    times.sort_unstable();
    Ok(times[times.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn header_at_fixed_spacing(spacing: u32) -> HashMap<u32, Header> {
        let mut map = HashMap::new();
        for height in 0..64u32 {
            map.insert(
                height,
                Header {
                    version: 1,
                    prev_block_hash: koto_types::hash::H256::ZERO,
                    merkle_root: koto_types::hash::H256::ZERO,
                    time: height * spacing,
                    bits: 0x1d00_ffff,
                    nonce: 0,
                    final_sapling_root: None,
                },
            );
        }
        map
    }

    #[test]
    fn below_warm_up_ceiling_returns_zero_target() {
        let config = EngineConfig::for_testing(std::path::PathBuf::new(), 1_000_000);
        let headers = header_at_fixed_spacing(60);
        let lookup = |h: u32| headers.get(&h).cloned();
        let target = get_target_koto(5, &lookup, &config).unwrap();
        assert_eq!(target, Target::ZERO);
    }

    #[test]
    fn retarget_boundary_with_one_checkpoint_chunk_uses_seed_target() {
        // mantissa divisible by 255 so the windowed average survives the
        // divide-then-multiply-by-TARGET_TIMESPAN round trip exactly
        let seed_bits = 0x1d00_c738u32;
        let seed_target = bits_to_target(seed_bits).unwrap();

        let mut config = EngineConfig::for_testing(std::path::PathBuf::new(), 1_000_000);
        config.checkpoints = vec![(koto_types::hash::H256::ZERO, seed_target)];

        let height = koto_types::checkpoints::BLOCKS_PER_CHUNK + 28;
        let mut headers = HashMap::new();
        for h in (height - 40)..=height {
            headers.insert(
                h,
                Header {
                    version: 1,
                    prev_block_hash: koto_types::hash::H256::ZERO,
                    merkle_root: koto_types::hash::H256::ZERO,
                    time: h * 60,
                    bits: seed_bits,
                    nonce: 0,
                    final_sapling_root: None,
                },
            );
        }
        let lookup = |h: u32| headers.get(&h).cloned();

        let target = get_target_koto(height, &lookup, &config).unwrap();
        assert_eq!(target, seed_target);
    }

    #[test]
    fn steady_spacing_keeps_target_within_clamp_bounds() {
        let config = EngineConfig::for_testing(std::path::PathBuf::new(), 1_000_000);
        let headers = header_at_fixed_spacing(60);
        let lookup = |h: u32| headers.get(&h).cloned();
        let target = get_target_koto(40, &lookup, &config).unwrap();
        assert!(target <= MAX_TARGET);
        assert!(!target.is_zero());
    }

    #[test]
    fn testnet_bypasses_retarget_entirely() {
        let mut config = EngineConfig::for_testing(std::path::PathBuf::new(), 1_000_000);
        config.testnet = true;
        let headers = header_at_fixed_spacing(60);
        let lookup = |h: u32| headers.get(&h).cloned();
        assert_eq!(get_target(40, &lookup, &config).unwrap(), Target::ZERO);
    }

    #[test]
    fn negative_height_returns_max_target() {
        let config = EngineConfig::for_testing(std::path::PathBuf::new(), 1_000_000);
        let lookup = |_: u32| None;
        assert_eq!(get_target(-1, &lookup, &config).unwrap(), MAX_TARGET);
    }
}
