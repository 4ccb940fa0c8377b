//! Group-local prefix scans
//!
//! Inclusive and exclusive scans over a range of any length, processed in
//! tile-sized chunks. Each chunk is staged through scratch, reduced to one
//! partial per lane, prefix-scanned across lanes in `O(log size)`
//! barrier-synchronized steps, then re-expanded to per-element results.
//! The chunk total is threaded forward as the carry of the next chunk,
//! which is what lets the global orchestrator compose per-group scans.
//!
//! `combine` must be associative. It need not be commutative: every
//! combination performed here preserves source order, so non-commutative
//! operations (function composition, matrix products) scan correctly.

use super::copy::copy_n;
use crate::group::{Group, Span};
use smallvec::SmallVec;

/// Exclusive scan across the per-lane partials in `sums`.
///
/// `sums` holds `2 * size` slots: the first `size` are the partials (slot
/// `tid` written by lane `tid`, for `tid < occupied`), the second `size`
/// are the ping-pong buffer. Log-step Hillis-Steele with double buffering:
/// each step reads the previous step's buffer and writes the other, so one
/// barrier per step suffices with no read/write hazard.
///
/// `carry` seeds slot 0 before the scan. On return, slots `0..occupied`
/// hold the exclusive prefixes and the inclusive total of all `occupied`
/// partials is returned to every lane.
fn lane_exclusive_scan<T, F>(
    g: &Group<'_>,
    sums: Span<T>,
    occupied: usize,
    carry: T,
    combine: &F,
) -> T
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let size = g.size();
    let tid = g.index();
    debug_assert!(occupied >= 1 && occupied <= size);
    debug_assert!(sums.len() >= 2 * size);

    if tid == 0 {
        // Safety: slot 0 was written by lane 0 before entry (occupied >= 1);
        // the caller's barrier separates that write from this read.
        unsafe { sums.write(0, combine(carry, sums.read(0))) };
    }
    g.wait();

    // `ping` offsets the buffer holding the most current data.
    let mut ping = 0usize;
    let mut pong = size;

    // Lanes beyond the occupied prefix have no partial; they still run the
    // full loop so every barrier stays group-uniform.
    let mut x = if tid < occupied {
        // Safety: slot tid was written pre-entry for tid < occupied.
        Some(unsafe { sums.read(ping + tid) })
    } else {
        None
    };

    let mut offset = 1;
    while offset < size {
        if tid >= offset && tid < occupied {
            // Safety: lane tid - offset (< occupied) wrote this slot in the
            // previous step (or pre-entry), separated by a barrier.
            let prev = unsafe { sums.read(ping + tid - offset) };
            x = x.map(|v| combine(prev, v));
        }
        std::mem::swap(&mut ping, &mut pong);
        if let Some(v) = x {
            // Safety: slot ping + tid is owned by this lane until the
            // barrier below.
            unsafe { sums.write(ping + tid, v) };
        }
        g.wait();
        offset <<= 1;
    }

    // Safety: slot occupied - 1 holds that lane's inclusive prefix, i.e.
    // the total; the loop's trailing barrier ordered the write.
    let total = unsafe { sums.read(ping + occupied - 1) };

    let exclusive = if tid == 0 {
        Some(carry)
    } else if tid < occupied {
        // Safety: as above for slot tid - 1.
        Some(unsafe { sums.read(ping + tid - 1) })
    } else {
        None
    };
    // The write-back below may target the buffer just read from.
    g.wait();
    if let Some(v) = exclusive {
        // Safety: slot tid is owned by this lane until the barrier below.
        unsafe { sums.write(tid, v) };
    }
    g.wait();

    total
}

/// Shared body of the inclusive and exclusive scans.
fn scan_tiles<T, F>(
    g: &Group<'_>,
    inclusive: bool,
    src: Span<T>,
    n: usize,
    dst: Span<T>,
    init: T,
    combine: &F,
) -> T
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let size = g.size();
    let grain = g.grain();
    let tile = g.tile_size();
    let tid = g.index();

    // One typed stage reused for raw inputs, then (after a barrier) for
    // computed results, to halve the scratch footprint.
    let stage = g.alloc_slots::<T>(tile);
    let sums = g.alloc_slots::<T>(2 * size);

    let mut carry = init;
    let mut local: SmallVec<[T; 16]> = SmallVec::with_capacity(grain);

    let mut off = 0;
    while off < n {
        let partition = (n - off).min(tile);

        copy_n(g, src.skip(off), partition, stage.span());

        // Fused load + accumulate of this lane's contiguous segment.
        let local_offset = grain * tid;
        let local_size = partition.saturating_sub(local_offset).min(grain);
        local.clear();
        let mut acc: Option<T> = None;
        for i in 0..local_size {
            // Safety: local_offset + i < partition, staged by copy_n above.
            let v = unsafe { stage.span().read(local_offset + i) };
            local.push(v);
            acc = Some(match acc {
                Some(a) => combine(a, v),
                None => v,
            });
        }
        if let Some(a) = acc {
            // Safety: slot tid is this lane's until the barrier below.
            unsafe { sums.span().write(tid, a) };
        }
        g.wait();

        let occupied = partition.div_ceil(grain).min(size);
        carry = lane_exclusive_scan(g, sums.span(), occupied, carry, combine);

        // Re-expand: seed with this lane's exclusive prefix, then replay the
        // local elements. Inclusive combines before writing, exclusive
        // after.
        if local_size > 0 {
            // Safety: lane_exclusive_scan left slot tid holding this lane's
            // exclusive prefix, barrier-ordered.
            let mut run = unsafe { sums.span().read(tid) };
            for (i, &v) in local.iter().enumerate() {
                let idx = local_offset + i;
                if inclusive {
                    run = combine(run, v);
                    // Safety: idx is within this lane's segment.
                    unsafe { stage.span().write(idx, run) };
                } else {
                    // Safety: as above.
                    unsafe { stage.span().write(idx, run) };
                    run = combine(run, v);
                }
            }
        }
        g.wait();

        copy_n(g, stage.span(), partition, dst.skip(off));
        off += tile;
    }

    g.free(sums);
    g.free(stage);
    carry
}

/// Group-local inclusive scan: `dst[i] = init ⊕ src[0] ⊕ ... ⊕ src[i]`.
///
/// Handles any `n`, looping over tile-sized chunks. Returns the total
/// `init ⊕ src[0] ⊕ ... ⊕ src[n-1]` (the carry-out) to every lane, so a
/// caller can chain scans over consecutive ranges.
///
/// Group-uniform; `combine` must be associative and pure.
pub fn inclusive_scan<T, F>(
    g: &Group<'_>,
    src: Span<T>,
    n: usize,
    dst: Span<T>,
    init: T,
    combine: &F,
) -> T
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    scan_tiles(g, true, src, n, dst, init, combine)
}

/// Group-local exclusive scan: `dst[i] = init ⊕ src[0] ⊕ ... ⊕ src[i-1]`,
/// with `dst[0] = init`.
///
/// Same contract and carry-out semantics as [`inclusive_scan`].
pub fn exclusive_scan<T, F>(
    g: &Group<'_>,
    src: Span<T>,
    n: usize,
    dst: Span<T>,
    init: T,
    combine: &F,
) -> T
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    scan_tiles(g, false, src, n, dst, init, combine)
}

/// Inclusive scan seeded from the first element: `dst[0] = src[0]`,
/// `dst[i] = src[0] ⊕ ... ⊕ src[i]`.
///
/// Returns the total, or `None` when `n == 0` (in which case nothing is
/// written).
pub fn inclusive_scan_from_first<T, F>(
    g: &Group<'_>,
    src: Span<T>,
    n: usize,
    dst: Span<T>,
    combine: &F,
) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    if n == 0 {
        return None;
    }
    // Safety: n >= 1; element 0 is caller-initialized input.
    let seed = unsafe { src.read(0) };
    if g.index() == 0 {
        // Safety: only lane 0 writes slot 0; the scan below ends with a
        // barrier before any lane returns.
        unsafe { dst.write(0, seed) };
    }
    Some(inclusive_scan(g, src.skip(1), n - 1, dst.skip(1), seed, combine))
}
