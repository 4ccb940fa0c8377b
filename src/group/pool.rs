//! Scoped scratch allocation for one group invocation
//!
//! Each group owns a small fixed "fast" buffer standing in for on-chip
//! shared memory. Allocation is bump-style over that buffer; when it is
//! exhausted the pool transparently falls back to the global heap. Frees
//! must be strictly LIFO within the group's call tree - the bump top is
//! restored on free, so out-of-order frees corrupt the discipline (checked
//! with `debug_assert!`, never reported).

use parking_lot::Mutex;
use std::alloc::{alloc, dealloc, Layout};

/// Alignment the fast buffer guarantees. Requests that need more are served
/// from the heap fallback with their own layout.
pub(crate) const POOL_ALIGN: usize = 16;

/// Which backing served an allocation. Callers cannot observe this except
/// through the paired free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Backing {
    /// Bump allocation in the fast buffer; `prev_top` restores the bump
    /// pointer on free.
    Fast { prev_top: usize },
    /// Heap fallback.
    Heap,
}

/// An untyped allocation handed out by [`SharedPool`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawAlloc {
    pub(crate) ptr: *mut u8,
    bytes: usize,
    align: usize,
    backing: Backing,
}

// Safety: RawAlloc is a passive (pointer, size, tag) triple. It travels from
// the allocating lane to its peers through the pool's broadcast slot; the
// barrier on that path provides the synchronization.
unsafe impl Send for RawAlloc {}

struct PoolState {
    base: *mut u8,
    capacity: usize,
    top: usize,
    /// Live allocations in allocation order, for the LIFO check.
    live: Vec<RawAlloc>,
}

// Safety: PoolState is only reached through the SharedPool mutex.
unsafe impl Send for PoolState {}

/// Per-group scratch pool: fixed fast buffer with heap fallback.
///
/// One `SharedPool` is created per group invocation and dropped when the
/// invocation ends; it is never shared across groups.
pub(crate) struct SharedPool {
    state: Mutex<PoolState>,
    /// Slot through which the allocating lane publishes a handle to its
    /// peers during a collective alloc.
    broadcast: Mutex<Option<RawAlloc>>,
}

impl SharedPool {
    /// Create a pool with `capacity` bytes of fast storage.
    pub(crate) fn new(capacity: usize) -> Self {
        let base = if capacity == 0 {
            std::ptr::null_mut()
        } else {
            // Safety: capacity > 0 and POOL_ALIGN is a power of two.
            unsafe { alloc(Self::fast_layout(capacity)) }
        };
        assert!(
            capacity == 0 || !base.is_null(),
            "scratch pool allocation of {capacity} bytes failed"
        );
        Self {
            state: Mutex::new(PoolState {
                base,
                capacity,
                top: 0,
                live: Vec::new(),
            }),
            broadcast: Mutex::new(None),
        }
    }

    fn fast_layout(capacity: usize) -> Layout {
        // Infallible: POOL_ALIGN is a power of two and capacity came from a
        // validated launch config.
        Layout::from_size_align(capacity, POOL_ALIGN)
            .expect("scratch pool capacity overflows a Layout")
    }

    /// Allocate `bytes` at `align`, bumping the fast buffer or falling back
    /// to the heap. `align` must be a power of two; requests over-aligned
    /// for the fast buffer always take the fallback.
    pub(crate) fn alloc(&self, bytes: usize, align: usize) -> RawAlloc {
        debug_assert!(align.is_power_of_two());
        let mut state = self.state.lock();
        let aligned_top = state.top.next_multiple_of(POOL_ALIGN);
        let fits = align <= POOL_ALIGN
            && aligned_top <= state.capacity
            && bytes <= state.capacity - aligned_top;
        let raw = if fits {
            let prev_top = state.top;
            state.top = aligned_top + bytes;
            RawAlloc {
                // Safety: aligned_top + bytes <= capacity.
                ptr: unsafe { state.base.add(aligned_top) },
                bytes,
                align,
                backing: Backing::Fast { prev_top },
            }
        } else {
            let ptr = if bytes == 0 {
                // Aligned dangling pointer; never dereferenced.
                align as *mut u8
            } else {
                // Safety: bytes > 0 and align is a power of two.
                unsafe { alloc(Self::heap_layout(bytes, align)) }
            };
            assert!(!ptr.is_null(), "scratch fallback of {bytes} bytes failed");
            RawAlloc {
                ptr,
                bytes,
                align,
                backing: Backing::Heap,
            }
        };
        state.live.push(raw);
        raw
    }

    fn heap_layout(bytes: usize, align: usize) -> Layout {
        Layout::from_size_align(bytes, align).expect("scratch request overflows a Layout")
    }

    /// Release the most recent live allocation.
    ///
    /// `raw` must be the handle returned by the matching `alloc`; frees must
    /// be strictly LIFO.
    pub(crate) fn free(&self, raw: RawAlloc) {
        let mut state = self.state.lock();
        let last = state.live.pop();
        debug_assert!(
            last.map(|l| l.ptr == raw.ptr && l.bytes == raw.bytes)
                .unwrap_or(false),
            "scratch frees must be LIFO"
        );
        match raw.backing {
            Backing::Fast { prev_top } => state.top = prev_top,
            Backing::Heap => {
                if raw.bytes > 0 {
                    // Safety: ptr came from alloc with the same layout.
                    unsafe { dealloc(raw.ptr, Self::heap_layout(raw.bytes, raw.align)) }
                }
            }
        }
    }

    /// Publish a handle for the group's other lanes (leader side of a
    /// collective alloc). A barrier must separate `publish` from `take`.
    pub(crate) fn publish(&self, raw: RawAlloc) {
        *self.broadcast.lock() = Some(raw);
    }

    /// Read the handle published by the leader.
    pub(crate) fn published(&self) -> RawAlloc {
        self.broadcast
            .lock()
            .expect("collective alloc read before the leader published")
    }
}

impl Drop for SharedPool {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        // A lane unwinding mid-kernel legitimately abandons its scratch; the
        // leak check only means something on the clean path.
        debug_assert!(
            state.live.is_empty() || std::thread::panicking(),
            "scratch allocations leaked"
        );
        // A leaked heap fallback would otherwise outlive the group.
        for raw in state.live.drain(..) {
            if raw.backing == Backing::Heap && raw.bytes > 0 {
                // Safety: same layout as the original alloc.
                unsafe { dealloc(raw.ptr, Self::heap_layout(raw.bytes, raw.align)) }
            }
        }
        if state.capacity > 0 {
            // Safety: base came from alloc with this exact layout.
            unsafe { dealloc(state.base, Self::fast_layout(state.capacity)) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_then_restore() {
        let pool = SharedPool::new(256);
        let a = pool.alloc(64, 8);
        let b = pool.alloc(64, 8);
        assert_eq!(a.backing, Backing::Fast { prev_top: 0 });
        assert_eq!(b.backing, Backing::Fast { prev_top: 64 });
        pool.free(b);
        let c = pool.alloc(32, 8);
        // b's space was returned to the bump region.
        assert_eq!(c.ptr, b.ptr);
        pool.free(c);
        pool.free(a);
    }

    #[test]
    fn test_fallback_when_exhausted() {
        let pool = SharedPool::new(64);
        let a = pool.alloc(48, 8);
        let b = pool.alloc(48, 8);
        assert!(matches!(a.backing, Backing::Fast { .. }));
        assert_eq!(b.backing, Backing::Heap);
        pool.free(b);
        pool.free(a);
    }

    #[test]
    fn test_zero_capacity_pool_always_falls_back() {
        let pool = SharedPool::new(0);
        let a = pool.alloc(16, 8);
        assert_eq!(a.backing, Backing::Heap);
        pool.free(a);
    }

    #[test]
    fn test_alignment() {
        let pool = SharedPool::new(256);
        let a = pool.alloc(3, 1);
        let b = pool.alloc(8, 8);
        assert_eq!(a.ptr as usize % POOL_ALIGN, 0);
        assert_eq!(b.ptr as usize % POOL_ALIGN, 0);
        pool.free(b);
        pool.free(a);
    }

    #[test]
    fn test_over_aligned_requests_take_the_fallback() {
        let pool = SharedPool::new(256);
        let a = pool.alloc(64, 64);
        assert_eq!(a.backing, Backing::Heap);
        assert_eq!(a.ptr as usize % 64, 0);
        pool.free(a);
        // Zero-byte over-aligned requests still hand out an aligned pointer.
        let b = pool.alloc(0, 32);
        assert_eq!(b.ptr as usize % 32, 0);
        pool.free(b);
    }
}
