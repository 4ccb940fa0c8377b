//! Global merge orchestrator
//!
//! Unlike scan, merge tiles have no sequential dependency: the merge-path
//! split point at each tile boundary is a pure function of the two inputs.
//! All `num_groups + 1` boundaries are searched up front (in parallel under
//! the `rayon` feature), then one group per tile performs an independent
//! bounded merge of its `(mp0, mp1)`-delimited windows.

use super::Policy;
use crate::algorithm;
use crate::error::{Error, Result};
use crate::group::Span;
use crate::runtime::{launch, GroupShape, LaunchConfig};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Fast-pool bytes one bounded merge needs: a tile-sized stage plus
/// alignment slack.
fn merge_pool_bytes<T>(shape: GroupShape) -> usize {
    shape.tile() * std::mem::size_of::<T>() + 32
}

/// Merge two sorted slices into `output`, preserving stability: on ties
/// (`less(b, a)` false) elements of `a` come first, and equal elements keep
/// their relative order within each input.
///
/// `less` must be a strict weak ordering and both inputs must already be
/// sorted by it.
///
/// # Errors
/// [`Error::LengthMismatch`] when `output.len() != a.len() + b.len()`.
pub fn merge<T, F>(a: &[T], b: &[T], output: &mut [T], less: F) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(&T, &T) -> bool + Sync,
{
    merge_with_policy(a, b, output, less, &Policy::default())
}

/// [`merge`] with an explicit [`Policy`].
pub fn merge_with_policy<T, F>(
    a: &[T],
    b: &[T],
    output: &mut [T],
    less: F,
    policy: &Policy,
) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(&T, &T) -> bool + Sync,
{
    let total = a.len() + b.len();
    if output.len() != total {
        return Err(Error::LengthMismatch {
            expected: total,
            got: output.len(),
        });
    }
    if total == 0 {
        return Ok(());
    }

    let shape = policy.shape;
    // Validate the shape before any tile arithmetic can divide by zero.
    LaunchConfig::new(shape, 1)?;
    let tile = shape.tile();
    let num_groups = total.div_ceil(tile);

    // Tile boundaries in the combined index space and their split points.
    // Boundaries are independent of each other (no carry), so the searches
    // run fully in parallel.
    let diags: Vec<usize> = (0..=num_groups).map(|i| (i * tile).min(total)).collect();

    #[cfg(feature = "rayon")]
    let splits: Vec<usize> = diags
        .par_iter()
        .map(|&d| algorithm::merge_path(a, b, d, &less))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let splits: Vec<usize> = diags
        .iter()
        .map(|&d| algorithm::merge_path(a, b, d, &less))
        .collect();

    let src_a = Span::from_slice(a);
    let src_b = Span::from_slice(b);
    let dst = Span::from_mut_slice(output);

    let config =
        LaunchConfig::new(shape, num_groups)?.with_pool_bytes(merge_pool_bytes::<T>(shape));
    let diags = &diags;
    let splits = &splits;
    launch(&config, |gid, g| {
        let d0 = diags[gid];
        let d1 = diags[gid + 1];
        let a0 = splits[gid];
        let a1 = splits[gid + 1];
        // Everything before (a0, d0 - a0) belongs to earlier tiles; the
        // window covers exactly output[d0..d1]. Empty windows merge to
        // nothing without fault.
        algorithm::bounded_merge(
            g,
            src_a.skip(a0),
            a1 - a0,
            src_b.skip(d0 - a0),
            (d1 - a1) - (d0 - a0),
            dst.skip(d0),
            &less,
        );
    })
}
