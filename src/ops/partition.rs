//! Task-range division
//!
//! Splits `[0, n)` into contiguous per-group ranges, tile-aligned so a
//! group's chunk loop never straddles a range boundary mid-tile. When there
//! are more tiles than groups (oversubscription), earlier groups absorb one
//! extra tile each.

use std::ops::Range;

/// Divide `[0, n)` into `num_groups` contiguous, gap-free, non-overlapping
/// ranges whose starts are multiples of `tile` (the final range may be a
/// short remainder).
///
/// Requires `1 <= num_groups <= ceil(n / tile)`, so every range covers at
/// least one element.
pub fn divide_task_ranges(n: usize, tile: usize, num_groups: usize) -> Vec<Range<usize>> {
    debug_assert!(tile >= 1);
    let n_tiles = n.div_ceil(tile);
    debug_assert!(num_groups >= 1 && num_groups <= n_tiles);

    let base = n_tiles / num_groups;
    let extra = n_tiles % num_groups;

    let mut ranges = Vec::with_capacity(num_groups);
    let mut first_tile = 0;
    for i in 0..num_groups {
        let count = base + usize::from(i < extra);
        let begin = first_tile * tile;
        let end = ((first_tile + count) * tile).min(n);
        ranges.push(begin..end);
        first_tile += count;
    }
    ranges
}
