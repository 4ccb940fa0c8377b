//! Global scan orchestrator
//!
//! Two modes, chosen by input size. Small inputs go to a single group that
//! loops over tiles, threading its carry internally - no inter-group
//! coordination exists or is needed. Large inputs run three sequential
//! dispatch phases over `num_groups` task ranges:
//!
//! 1. **upsweep** - every group reduces its range to one partial;
//! 2. **carry scan** - one group exclusive-scans the partials, seeded with
//!    the caller's `init`, yielding each group's carry-in;
//! 3. **downsweep** - every group re-scans its range seeded with its carry,
//!    writing final results.
//!
//! A single pass cannot know a tile's true carry-in (it depends on *all*
//! preceding tiles) and still write final output in one traversal; the
//! three-phase split keeps global memory traffic at `2n + O(num_groups)`.
//! Phase ordering comes from [`launch`] being synchronous.

use super::partition::divide_task_ranges;
use super::Policy;
use crate::algorithm;
use crate::error::{Error, Result};
use crate::group::Span;
use crate::runtime::{launch, parallelism_budget, GroupShape, LaunchConfig};

/// Fast-pool bytes one group-local scan needs: a tile-sized stage plus the
/// double-buffered lane partials, with alignment slack.
fn scan_pool_bytes<T>(shape: GroupShape) -> usize {
    (shape.tile() + 2 * shape.size) * std::mem::size_of::<T>() + 64
}

fn scan_with_policy_impl<T, F>(
    inclusive: bool,
    input: &[T],
    output: &mut [T],
    init: T,
    combine: F,
    policy: &Policy,
) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    if output.len() != input.len() {
        return Err(Error::LengthMismatch {
            expected: input.len(),
            got: output.len(),
        });
    }
    let n = input.len();
    if n == 0 {
        return Ok(());
    }

    let shape = policy.shape;
    // Validate the shape before any tile arithmetic can divide by zero.
    LaunchConfig::new(shape, 1)?;

    let src = Span::from_slice(input);
    let dst = Span::from_mut_slice(output);

    if n <= policy.single_group_threshold {
        let config = LaunchConfig::new(shape, 1)?.with_pool_bytes(scan_pool_bytes::<T>(shape));
        launch(&config, |_, g| {
            if inclusive {
                algorithm::inclusive_scan(g, src, n, dst, init, &combine);
            } else {
                algorithm::exclusive_scan(g, src, n, dst, init, &combine);
            }
        })?;
        return Ok(());
    }

    let tile = shape.tile();
    let n_tiles = n.div_ceil(tile);
    let budget = policy.max_groups.unwrap_or_else(parallelism_budget).max(1);
    let num_groups = budget.min(n_tiles);
    let ranges = divide_task_ranges(n, tile, num_groups);

    // Phase 1: upsweep. The init placeholder is overwritten by every group
    // (task ranges are never empty).
    let mut partials = vec![init; num_groups];
    {
        let partials_span = Span::from_mut_slice(&mut partials);
        let config =
            LaunchConfig::new(shape, num_groups)?.with_pool_bytes(scan_pool_bytes::<T>(shape));
        let ranges = &ranges;
        launch(&config, |gid, g| {
            let r = &ranges[gid];
            if let Some(partial) = algorithm::reduce(g, src.skip(r.start), r.len(), &combine) {
                if g.index() == 0 {
                    // Safety: slot gid belongs to this group alone; launch's
                    // join publishes it to the next phase.
                    unsafe { partials_span.write(gid, partial) };
                }
            }
        })?;
    }

    // Phase 2: one group exclusive-scans the per-group partials into
    // carries, seeded with the global init.
    let mut carries = vec![init; num_groups];
    {
        let partials_ro = Span::from_slice(&partials);
        let carries_span = Span::from_mut_slice(&mut carries);
        let config = LaunchConfig::new(shape, 1)?.with_pool_bytes(scan_pool_bytes::<T>(shape));
        launch(&config, |_, g| {
            algorithm::exclusive_scan(g, partials_ro, num_groups, carries_span, init, &combine);
        })?;
    }

    // Phase 3: downsweep, seeded per group with its carry.
    {
        let config =
            LaunchConfig::new(shape, num_groups)?.with_pool_bytes(scan_pool_bytes::<T>(shape));
        let ranges = &ranges;
        let carries = &carries;
        launch(&config, |gid, g| {
            let r = &ranges[gid];
            let carry = carries[gid];
            if inclusive {
                algorithm::inclusive_scan(g, src.skip(r.start), r.len(), dst.skip(r.start), carry, &combine);
            } else {
                algorithm::exclusive_scan(g, src.skip(r.start), r.len(), dst.skip(r.start), carry, &combine);
            }
        })?;
    }

    Ok(())
}

/// Inclusive scan: `output[i] = init ⊕ input[0] ⊕ ... ⊕ input[i]`.
///
/// `combine` must be associative and pure; it need not be commutative.
///
/// # Errors
/// [`Error::LengthMismatch`] when `output.len() != input.len()`.
pub fn inclusive_scan<T, F>(input: &[T], output: &mut [T], init: T, combine: F) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    inclusive_scan_with_policy(input, output, init, combine, &Policy::default())
}

/// [`inclusive_scan`] with an explicit [`Policy`].
pub fn inclusive_scan_with_policy<T, F>(
    input: &[T],
    output: &mut [T],
    init: T,
    combine: F,
    policy: &Policy,
) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    scan_with_policy_impl(true, input, output, init, combine, policy)
}

/// Exclusive scan: `output[i] = init ⊕ input[0] ⊕ ... ⊕ input[i-1]`, with
/// `output[0] = init`.
///
/// # Errors
/// [`Error::LengthMismatch`] when `output.len() != input.len()`.
pub fn exclusive_scan<T, F>(input: &[T], output: &mut [T], init: T, combine: F) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    exclusive_scan_with_policy(input, output, init, combine, &Policy::default())
}

/// [`exclusive_scan`] with an explicit [`Policy`].
pub fn exclusive_scan_with_policy<T, F>(
    input: &[T],
    output: &mut [T],
    init: T,
    combine: F,
    policy: &Policy,
) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    scan_with_policy_impl(false, input, output, init, combine, policy)
}

/// Inclusive scan seeded from the first element: `output[0] = input[0]`,
/// `output[i] = input[0] ⊕ ... ⊕ input[i]`. Empty input writes nothing.
///
/// # Errors
/// [`Error::LengthMismatch`] when `output.len() != input.len()`.
pub fn inclusive_scan_from_first<T, F>(input: &[T], output: &mut [T], combine: F) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    inclusive_scan_from_first_with_policy(input, output, combine, &Policy::default())
}

/// [`inclusive_scan_from_first`] with an explicit [`Policy`].
pub fn inclusive_scan_from_first_with_policy<T, F>(
    input: &[T],
    output: &mut [T],
    combine: F,
    policy: &Policy,
) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    if output.len() != input.len() {
        return Err(Error::LengthMismatch {
            expected: input.len(),
            got: output.len(),
        });
    }
    if input.is_empty() {
        return Ok(());
    }
    let seed = input[0];
    output[0] = seed;
    scan_with_policy_impl(true, &input[1..], &mut output[1..], seed, combine, policy)
}
