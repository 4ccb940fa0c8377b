//! Group-local reduction
//!
//! Order-preserving reduce used by the global scan's upsweep phase: each
//! group collapses its task range to a single partial value. Lanes take
//! contiguous grain-sized segments (not strided), so the fold order matches
//! source order and non-commutative `combine`s reduce correctly.

use crate::group::{Group, Span};

/// Reduce `src[0..n]` with `combine`, cooperatively across the group.
///
/// Per tile, each lane folds its contiguous segment, partials are staged
/// through scratch, and every lane folds the staged partials in lane order
/// (redundantly - cheaper than broadcasting for team-sized arrays). Tiles
/// beyond the first fold into the running value, preserving order.
///
/// Returns `None` when `n == 0`. The fold is seedless: the first element is
/// the natural seed, so `combine` needs no identity value.
///
/// Group-uniform; every lane receives the same result.
pub fn reduce<T, F>(g: &Group<'_>, src: Span<T>, n: usize, combine: &F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let size = g.size();
    let grain = g.grain();
    let tile = g.tile_size();
    let tid = g.index();

    let partials = g.alloc_slots::<T>(size);

    let mut total: Option<T> = None;
    let mut off = 0;
    while off < n {
        let partition = (n - off).min(tile);

        let local_offset = grain * tid;
        let local_size = partition.saturating_sub(local_offset).min(grain);
        let mut acc: Option<T> = None;
        for i in 0..local_size {
            // Safety: off + local_offset + i < n; src is caller-initialized.
            let v = unsafe { src.read(off + local_offset + i) };
            acc = Some(match acc {
                Some(a) => combine(a, v),
                None => v,
            });
        }
        if let Some(a) = acc {
            // Safety: slot tid is this lane's until the barrier below.
            unsafe { partials.span().write(tid, a) };
        }
        g.wait();

        let occupied = partition.div_ceil(grain).min(size);
        for i in 0..occupied {
            // Safety: slots 0..occupied were written above, barrier-ordered.
            let p = unsafe { partials.span().read(i) };
            total = Some(match total {
                Some(t) => combine(t, p),
                None => p,
            });
        }
        // The next tile reuses the partials slots.
        g.wait();

        off += tile;
    }

    g.free(partials);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{launch, GroupShape, LaunchConfig};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_reduce_matches_sequential_fold() {
        let input: Vec<u64> = (1..=100).collect();
        let expected: u64 = input.iter().sum();
        let config = LaunchConfig::new(GroupShape::new(4, 3), 1).unwrap();
        let src = Span::from_slice(&input);
        let got = AtomicU64::new(0);
        launch(&config, |_, g| {
            let r = reduce(g, src, input.len(), &|a, b| a + b).unwrap();
            // Every lane must agree on the total.
            got.fetch_max(r, Ordering::Relaxed);
            assert_eq!(r, expected);
        })
        .unwrap();
        assert_eq!(got.load(Ordering::Relaxed), expected);
    }

    #[test]
    fn test_reduce_empty_is_none() {
        let input: Vec<u64> = Vec::new();
        let config = LaunchConfig::new(GroupShape::new(2, 2), 1).unwrap();
        let src = Span::from_slice(&input);
        launch(&config, |_, g| {
            assert!(reduce(g, src, 0, &|a, b| a + b).is_none());
        })
        .unwrap();
    }

    #[test]
    fn test_reduce_preserves_order() {
        // Subtraction is not associative, but (a, b) -> a concatenated-fold
        // order still shows up with a non-commutative associative op:
        // affine map composition f(x) = a*x + b.
        let maps: Vec<(u64, u64)> = (0..37).map(|i| (i % 5 + 1, i)).collect();
        let compose =
            |f: (u64, u64), g: (u64, u64)| (g.0.wrapping_mul(f.0), g.0.wrapping_mul(f.1).wrapping_add(g.1));
        let expected = maps[1..].iter().fold(maps[0], |acc, &m| compose(acc, m));
        let config = LaunchConfig::new(GroupShape::new(4, 2), 1).unwrap();
        let src = Span::from_slice(&maps);
        launch(&config, |_, g| {
            let r = reduce(g, src, maps.len(), &compose).unwrap();
            assert_eq!(r, expected);
        })
        .unwrap();
    }
}
