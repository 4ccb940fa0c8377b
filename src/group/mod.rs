//! Execution-group abstraction
//!
//! A *group* is a fixed-size team of lanes executing the same kernel in
//! lockstep between explicit barrier points. Each lane holds its own
//! [`Group`] value: the team shape, this lane's index, and handles to the
//! team barrier and the group's scoped scratch pool.
//!
//! # Group-uniform discipline
//!
//! All lanes of a group must execute the same control path between
//! barriers. A branch that reaches [`Group::wait`] (or any collective
//! operation: [`Group::alloc_slots`], [`Group::free`], the kernels in
//! [`crate::algorithm`]) must be taken by every lane or by none - violating
//! this deadlocks or corrupts the computation and is a caller contract
//! violation, not a reported error.

mod barrier;
mod pool;
mod span;

pub(crate) use barrier::GroupBarrier;
pub(crate) use pool::SharedPool;
pub use span::Span;

use pool::RawAlloc;
use std::alloc::Layout;

/// Per-lane view of one execution group.
///
/// Obtained inside a kernel dispatched through
/// [`runtime::launch`](crate::runtime::launch); cannot be constructed by
/// user code. The group owns no persistent state - all mutable state lives
/// in caller-provided spans or in scratch allocated from the group's pool.
pub struct Group<'a> {
    size: usize,
    grain: usize,
    index: usize,
    barrier: &'a GroupBarrier,
    pool: &'a SharedPool,
}

impl<'a> Group<'a> {
    pub(crate) fn new(
        size: usize,
        grain: usize,
        index: usize,
        barrier: &'a GroupBarrier,
        pool: &'a SharedPool,
    ) -> Self {
        debug_assert!(index < size);
        Self {
            size,
            grain,
            index,
            barrier,
            pool,
        }
    }

    /// Team cardinality: how many lanes cooperate in this group.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Elements each lane processes per group-local pass.
    #[inline]
    pub fn grain(&self) -> usize {
        self.grain
    }

    /// This lane's position, in `0..size()`.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Maximum elements one group-local pass covers: `size() * grain()`.
    #[inline]
    pub fn tile_size(&self) -> usize {
        self.size * self.grain
    }

    /// Full-team barrier.
    ///
    /// No lane proceeds past `wait` until every lane of the group has
    /// reached it. Doubles as a memory-visibility fence: writes by any lane
    /// before the barrier are visible to all lanes after it.
    ///
    /// Panics if a sibling lane panicked out of its kernel, so the group
    /// unwinds as a whole instead of deadlocking on a dead lane.
    ///
    /// Must not be called divergently (see the module docs).
    #[inline]
    pub fn wait(&self) {
        self.barrier.wait();
    }

    /// Collectively allocate scratch for `len` elements of `T`.
    ///
    /// Every lane must call this with the same `len`. All lanes receive a
    /// handle to the same storage, served from the group's fast pool when it
    /// has capacity and transparently from the heap otherwise - callers
    /// cannot tell the difference except through the paired [`Group::free`].
    /// `T`'s alignment is honored either way; types over-aligned for the
    /// fast pool go to the heap.
    ///
    /// The returned scratch is uninitialized; reading an element before some
    /// lane wrote it (with a barrier in between) is undefined behavior.
    pub fn alloc_slots<T: Copy>(&self, len: usize) -> Scratch<T> {
        let layout = Layout::array::<T>(len).expect("scratch request overflows a Layout");
        if self.index == 0 {
            let raw = self.pool.alloc(layout.size(), layout.align());
            self.pool.publish(raw);
        }
        self.wait();
        let raw = self.pool.published();
        // The second barrier keeps the leader from reusing the broadcast
        // slot for a later alloc before every lane has read this one.
        self.wait();
        Scratch {
            // Safety: raw covers len elements of T at T's alignment.
            span: unsafe { Span::from_raw_parts(raw.ptr as *mut T, len) },
            raw,
        }
    }

    /// Collectively release scratch obtained from [`Group::alloc_slots`].
    ///
    /// Frees must pair 1:1 with allocations in strict reverse order within
    /// the group's call tree. Every lane passes its own copy of the handle.
    pub fn free<T>(&self, scratch: Scratch<T>) {
        // All lanes must be done with the memory before it is recycled.
        self.wait();
        if self.index == 0 {
            self.pool.free(scratch.raw);
        }
        self.wait();
    }
}

/// Typed scratch handle returned by [`Group::alloc_slots`].
///
/// `Copy` so every lane can hold its own handle to the shared storage.
#[derive(Clone, Copy)]
pub struct Scratch<T> {
    span: Span<T>,
    raw: RawAlloc,
}

impl<T> Scratch<T> {
    /// Shared view over the scratch elements.
    #[inline]
    pub fn span(&self) -> Span<T> {
        self.span
    }
}
