//! Shared element views for group-cooperative kernels
//!
//! Lanes of a group write disjoint elements of the same buffer between
//! barriers. Safe references cannot express that aliasing pattern, so the
//! kernels operate on [`Span`]: a raw-pointer view with per-element unsafe
//! access, in the same spirit as raw-pointer CPU kernels elsewhere in this
//! crate family.

use std::marker::PhantomData;

/// A shared view over a contiguous element range.
///
/// `Span` is `Copy` and crosses lane threads freely. It carries no ownership
/// and no lifetime; the caller keeps the backing storage alive for the
/// duration of the dispatch that uses the span.
///
/// # Safety contract
///
/// - Writes from different lanes must target disjoint indices between two
///   barriers.
/// - A write by one lane is visible to another lane only after an
///   intervening [`Group::wait`](crate::group::Group::wait).
/// - A span built with [`Span::from_slice`] must never be written.
pub struct Span<T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for Span<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Span<T> {}

// Safety: Span hands out raw element copies/writes only through unsafe
// methods whose contracts (disjoint writes, barrier visibility) make the
// cross-thread sharing sound.
unsafe impl<T: Send + Sync> Send for Span<T> {}
unsafe impl<T: Send + Sync> Sync for Span<T> {}

impl<T> Span<T> {
    /// View a read-only slice.
    ///
    /// The resulting span must never be written; doing so is undefined
    /// behavior.
    pub fn from_slice(slice: &[T]) -> Self {
        Self {
            ptr: slice.as_ptr() as *mut T,
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// View a mutable slice.
    pub fn from_mut_slice(slice: &mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// Build a span from a raw base pointer and length.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` elements for as
    /// long as the span is used.
    pub(crate) unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> Self {
        Self {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    /// Number of elements in view.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A sub-view starting `n` elements in.
    ///
    /// `n` may equal `len()`, producing an empty span.
    pub fn skip(self, n: usize) -> Self {
        debug_assert!(n <= self.len);
        Self {
            // Safety: n <= len keeps the pointer within (or one past) the
            // allocation the span was built from.
            ptr: unsafe { self.ptr.add(n) },
            len: self.len - n,
            _marker: PhantomData,
        }
    }
}

impl<T: Copy> Span<T> {
    /// Read element `i`.
    ///
    /// # Safety
    /// `i < len()`, and the element must have been initialized; if another
    /// lane wrote it, a barrier must separate that write from this read.
    #[inline]
    pub unsafe fn read(&self, i: usize) -> T {
        debug_assert!(i < self.len);
        *self.ptr.add(i)
    }

    /// Write element `i`.
    ///
    /// # Safety
    /// `i < len()`, the span must derive from writable storage, and no other
    /// lane may access element `i` before the next barrier.
    #[inline]
    pub unsafe fn write(&self, i: usize, value: T) {
        debug_assert!(i < self.len);
        *self.ptr.add(i) = value;
    }
}
