//! Merge-path partitioning and group-local merge
//!
//! Merging two sorted sequences parallelizes through the *merge path*: for
//! an output position (diagonal) `d`, a binary search finds how many of the
//! first `d` merged elements come from each source. Split points are
//! monotone in `d`, so diagonals spaced `grain` apart hand every lane a
//! disjoint, perfectly balanced serial merge with no cross-lane
//! coordination.
//!
//! Ties break toward the first sequence (left-biased, lower-bound search),
//! which is what makes the merge stable.

use super::copy::copy_n;
use crate::group::{Group, Span};
use smallvec::SmallVec;

/// Merge-path split point over raw spans.
///
/// # Safety
/// `a[0..n1]` and `b[0..n2]` must be initialized, and `diag <= n1 + n2`.
unsafe fn merge_path_spans<T, F>(
    a: Span<T>,
    n1: usize,
    b: Span<T>,
    n2: usize,
    diag: usize,
    less: &F,
) -> usize
where
    T: Copy,
    F: Fn(&T, &T) -> bool,
{
    let mut lo = diag.saturating_sub(n2);
    let mut hi = diag.min(n1);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        // Candidates astride the diagonal: a[mid] vs b[diag - 1 - mid].
        let a_key = a.read(mid);
        let b_key = b.read(diag - 1 - mid);
        if less(&b_key, &a_key) {
            hi = mid;
        } else {
            // On ties a[mid] precedes: left bias.
            lo = mid + 1;
        }
    }
    lo
}

/// Find the merge-path split point for diagonal `diag`.
///
/// Returns the unique `mp` such that taking `mp` elements from `a` and
/// `diag - mp` from `b` forms a valid prefix of the merged order under
/// `less`, with ties preferring `a`. `mp` is non-decreasing in `diag` and
/// steps by at most one.
///
/// `diag` must be at most `a.len() + b.len()`.
pub fn merge_path<T, F>(a: &[T], b: &[T], diag: usize, less: &F) -> usize
where
    T: Copy,
    F: Fn(&T, &T) -> bool,
{
    assert!(diag <= a.len() + b.len());
    // Safety: slices are initialized and diag is checked above.
    unsafe {
        merge_path_spans(
            Span::from_slice(a),
            a.len(),
            Span::from_slice(b),
            b.len(),
            diag,
            less,
        )
    }
}

/// Merge two sorted bounded ranges whose combined length fits in one tile.
///
/// `n1 + n2 <= tile_size()` is caller contract. Both sources are staged
/// into scratch, each lane binary-searches its own diagonal (`grain *
/// index`), serially merges up to `grain` elements into registers, and the
/// results are staged back through scratch and copied to `dst`.
///
/// Group-uniform. Stable: ties take from the first sequence.
pub fn bounded_merge<T, F>(
    g: &Group<'_>,
    a: Span<T>,
    n1: usize,
    b: Span<T>,
    n2: usize,
    dst: Span<T>,
    less: &F,
) where
    T: Copy,
    F: Fn(&T, &T) -> bool,
{
    let grain = g.grain();
    let tid = g.index();
    let total = n1 + n2;
    debug_assert!(total <= g.tile_size());

    let stage = g.alloc_slots::<T>(g.tile_size());

    // Stage a then b contiguously; each copy_n ends with a barrier.
    copy_n(g, a, n1, stage.span());
    copy_n(g, b, n2, stage.span().skip(n1));

    let staged_a = stage.span();
    let staged_b = stage.span().skip(n1);

    let diag = (grain * tid).min(total);
    let diag_end = (diag + grain).min(total);
    // Safety: both staged ranges were just initialized, barrier-ordered,
    // and diag <= total.
    let mp = unsafe { merge_path_spans(staged_a, n1, staged_b, n2, diag, less) };

    // Serial register-resident merge of this lane's window.
    let mut i = mp;
    let mut j = diag - mp;
    let mut out: SmallVec<[T; 16]> = SmallVec::with_capacity(diag_end - diag);
    for _ in diag..diag_end {
        // Safety: i < n1 / j < n2 guard every read; staged data is
        // barrier-ordered.
        let take_a = unsafe {
            i < n1 && (j >= n2 || !less(&staged_b.read(j), &staged_a.read(i)))
        };
        if take_a {
            out.push(unsafe { staged_a.read(i) });
            i += 1;
        } else {
            out.push(unsafe { staged_b.read(j) });
            j += 1;
        }
    }

    // All lanes are done reading before the stage is reused for results.
    g.wait();
    for (k, &v) in out.iter().enumerate() {
        // Safety: diag..diag_end windows are disjoint across lanes.
        unsafe { stage.span().write(diag + k, v) };
    }
    g.wait();

    copy_n(g, stage.span(), total, dst);
    g.free(stage);
}

/// Merge two sorted ranges of any length into `dst`.
///
/// The combined length is processed in tile-sized chunks: one merge-path
/// search per chunk boundary locates how much of each source the chunk
/// consumes (computed redundantly by every lane - it is deterministic),
/// then [`bounded_merge`] handles the chunk and both cursors advance.
///
/// `dst` must hold `n1 + n2` elements. Group-uniform; stable.
pub fn merge<T, F>(
    g: &Group<'_>,
    a: Span<T>,
    n1: usize,
    b: Span<T>,
    n2: usize,
    dst: Span<T>,
    less: &F,
) where
    T: Copy,
    F: Fn(&T, &T) -> bool,
{
    let tile = g.tile_size();
    let total = n1 + n2;

    let mut taken1 = 0;
    let mut taken2 = 0;
    let mut off = 0;
    while off < total {
        let chunk = (total - off).min(tile);
        let rem1 = n1 - taken1;
        let rem2 = n2 - taken2;
        // Safety: the remaining source ranges are initialized and
        // chunk <= rem1 + rem2.
        let mp = unsafe {
            merge_path_spans(a.skip(taken1), rem1, b.skip(taken2), rem2, chunk, less)
        };
        bounded_merge(
            g,
            a.skip(taken1),
            mp,
            b.skip(taken2),
            chunk - mp,
            dst.skip(off),
            less,
        );
        taken1 += mp;
        taken2 += chunk - mp;
        off += chunk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_path_monotone_in_diagonal() {
        let a = [1u32, 2, 2, 5, 7, 7, 9];
        let b = [2u32, 2, 3, 7, 8];
        let less = |x: &u32, y: &u32| x < y;
        let mut prev = merge_path(&a, &b, 0, &less);
        assert_eq!(prev, 0);
        for d in 1..=a.len() + b.len() {
            let mp = merge_path(&a, &b, d, &less);
            assert!(mp >= prev, "split point regressed at diagonal {d}");
            assert!(mp <= prev + 1, "split point jumped at diagonal {d}");
            prev = mp;
        }
        assert_eq!(prev, a.len());
    }

    #[test]
    fn test_merge_path_prefers_first_sequence_on_ties() {
        let a = [3u32];
        let b = [3u32];
        let less = |x: &u32, y: &u32| x < y;
        // The first merged element must come from a.
        assert_eq!(merge_path(&a, &b, 1, &less), 1);
    }

    #[test]
    fn test_merge_path_empty_sides() {
        let a: [u32; 0] = [];
        let b = [1u32, 2, 3];
        let less = |x: &u32, y: &u32| x < y;
        assert_eq!(merge_path(&a, &b, 2, &less), 0);
        assert_eq!(merge_path(&b, &a, 2, &less), 2);
    }
}
