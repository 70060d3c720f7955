//! Pure helpers for the piecewise record-size/offset arithmetic that every
//! read/write/reorg path consults, keyed on `(forkpoint, height, sapling_height)`
//! per SPEC_FULL.md §9's design note. Tested exhaustively at the boundary heights.

pub const HEADER_SIZE_PRE_SAPLING: u64 = 80;
pub const HEADER_SIZE_SAPLING: u64 = 112;

/// Wire size in bytes of the header at `height`.
#[must_use]
pub fn header_size_at(height: u32, sapling_height: u32) -> u64 {
    if height < sapling_height {
        HEADER_SIZE_PRE_SAPLING
    } else {
        HEADER_SIZE_SAPLING
    }
}

/// Byte offset of the header at `height` within a chain file whose first header
/// is at `forkpoint`.
#[must_use]
pub fn offset_for_height(height: u32, forkpoint: u32, sapling_height: u32) -> u64 {
    if height < sapling_height {
        u64::from(height - forkpoint) * HEADER_SIZE_PRE_SAPLING
    } else if forkpoint >= sapling_height {
        u64::from(height - forkpoint) * HEADER_SIZE_SAPLING
    } else {
        u64::from(sapling_height - forkpoint) * HEADER_SIZE_PRE_SAPLING
            + u64::from(height - sapling_height) * HEADER_SIZE_SAPLING
    }
}

/// The byte offset `swap_with_parent` reads from within the *parent's* file when
/// absorbing the range `[forkpoint, parent.height()]`. Preserves the original's
/// documented bug: when `forkpoint > sapling_height` and the parent's own
/// forkpoint is already `>= sapling_height`, both terms of the combination arm
/// are (incorrectly) sized at `HEADER_SIZE_SAPLING` rather than taking the
/// straight-line `forkpoint >= sapling_height` branch above. Flagged in
/// DESIGN.md; preserved bit-exact because consensus/file-format compatibility
/// demands it.
#[must_use]
pub fn swap_offset_into_parent(height: u32, parent_forkpoint: u32, sapling_height: u32) -> u64 {
    if height < sapling_height {
        u64::from(height - parent_forkpoint) * HEADER_SIZE_PRE_SAPLING
    } else if height > sapling_height && sapling_height <= parent_forkpoint {
        u64::from(sapling_height - parent_forkpoint) * HEADER_SIZE_SAPLING
            + u64::from(height - sapling_height) * HEADER_SIZE_SAPLING
    } else if parent_forkpoint >= sapling_height {
        u64::from(height - parent_forkpoint) * HEADER_SIZE_SAPLING
    } else {
        u64::from(sapling_height - parent_forkpoint) * HEADER_SIZE_PRE_SAPLING
            + u64::from(height - sapling_height) * HEADER_SIZE_SAPLING
    }
}

/// Recomputes a chain's header count from its on-disk byte length. The
/// post-transition branch divides raw bytes by 112 with integer division,
/// silently rounding down when the tail isn't a whole number of post-Sapling
/// records — preserved per DESIGN.md rather than treated as corruption.
#[must_use]
pub fn size_from_file_len(file_len: u64, forkpoint: u32, sapling_height: u32) -> u32 {
    if forkpoint >= sapling_height {
        return u32::try_from(file_len / HEADER_SIZE_SAPLING).unwrap_or(u32::MAX);
    }

    let pre_sapling_headers = sapling_height - forkpoint;
    let pre_sapling_bytes = u64::from(pre_sapling_headers) * HEADER_SIZE_PRE_SAPLING;

    if file_len <= pre_sapling_bytes {
        return u32::try_from(file_len / HEADER_SIZE_PRE_SAPLING).unwrap_or(u32::MAX);
    }

    let post_sapling_bytes = file_len - pre_sapling_bytes;
    let post_sapling_headers = u32::try_from(post_sapling_bytes / HEADER_SIZE_SAPLING).unwrap_or(u32::MAX);
    pre_sapling_headers + post_sapling_headers
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAPLING_HEIGHT: u32 = 3;

    #[test]
    fn offsets_match_pre_sapling() {
        assert_eq!(offset_for_height(0, 0, SAPLING_HEIGHT), 0);
        assert_eq!(offset_for_height(2, 0, SAPLING_HEIGHT), 160);
    }

    #[test]
    fn offsets_match_across_transition() {
        // main chain, forkpoint 0, sapling activates at height 3
        assert_eq!(offset_for_height(3, 0, SAPLING_HEIGHT), 3 * 80);
        assert_eq!(offset_for_height(4, 0, SAPLING_HEIGHT), 3 * 80 + 112);
    }

    #[test]
    fn offsets_match_fork_entirely_post_sapling() {
        assert_eq!(offset_for_height(10, 10, SAPLING_HEIGHT), 0);
        assert_eq!(offset_for_height(12, 10, SAPLING_HEIGHT), 2 * 112);
    }

    #[test]
    fn file_size_for_sapling_transition_scenario() {
        // 3 pre-sapling + 2 post-sapling headers
        let file_len = 3 * 80 + 2 * 112;
        assert_eq!(size_from_file_len(file_len, 0, SAPLING_HEIGHT), 5);
    }

    #[test]
    fn size_rounds_down_on_partial_trailing_record() {
        let file_len = 3 * 80 + 112 + 50; // trailing partial post-sapling record
        assert_eq!(size_from_file_len(file_len, 0, SAPLING_HEIGHT), 4);
    }
}
