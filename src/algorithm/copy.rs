//! Group-cooperative bulk copy

use crate::group::{Group, Span};

/// Copy `n` elements from `src` to `dst`, cooperatively across the group.
///
/// Lane `i` handles the strided elements `i + k * size()` for
/// `k in 0..grain()`, bounds-checked per element so `n` need not divide the
/// group's capacity. Ends with a barrier: the destination is fully visible
/// to every lane when `copy_n` returns.
///
/// Group-uniform: every lane must call with the same arguments.
/// `n <= tile_size()` and in-range spans are caller contract; out-of-range
/// inputs are undefined behavior, not a checked error.
pub fn copy_n<T: Copy>(g: &Group<'_>, src: Span<T>, n: usize, dst: Span<T>) {
    debug_assert!(n <= g.tile_size());
    debug_assert!(n <= src.len() && n <= dst.len());

    let size = g.size();
    for k in 0..g.grain() {
        let i = g.index() + k * size;
        if i < n {
            // Safety: i < n is in range for both spans; each index is owned
            // by exactly one lane, and the trailing barrier publishes the
            // writes.
            unsafe { dst.write(i, src.read(i)) };
        }
    }
    g.wait();
}
