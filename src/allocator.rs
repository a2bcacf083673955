//! Allocation capabilities consumed by the map.
//!
//! The map allocates through any [`Allocator`]. [`CanAllocate`] adds the
//! pre-flight question "would this allocation succeed?" used by
//! [`RBTreeMap::can_perform_operation`](crate::RBTreeMap::can_perform_operation).
//! [`BoundedAllocator`] is a byte-budgeted allocator that answers it precisely.

use core::alloc::Layout;
use core::cell::Cell;
use core::fmt;
use core::ptr::NonNull;

use allocator_api2::alloc::{AllocError, Allocator, Global};

/// Reports whether an allocation of a given layout would currently succeed.
pub trait CanAllocate {
    /// Returns `true` if allocating `layout` is expected to succeed.
    fn can_allocate(&self, layout: Layout) -> bool;
}

impl CanAllocate for Global {
    /// The global allocator is assumed never to run out.
    fn can_allocate(&self, _layout: Layout) -> bool {
        true
    }
}

impl<T: CanAllocate + ?Sized> CanAllocate for &T {
    fn can_allocate(&self, layout: Layout) -> bool {
        (**self).can_allocate(layout)
    }
}

/// An allocator that forwards to `A` while enforcing a budget on the bytes in use.
///
/// It also counts allocations, which makes it the allocator of choice for
/// observing how the map uses memory. Counters use [`Cell`], so it is meant
/// to be shared by reference within a single thread.
///
/// # Examples
///
/// ```
/// use blob_tree::{BoundedAllocator, Lexicographic, RBTreeMap};
///
/// let alloc = BoundedAllocator::new(1024);
/// let mut map = RBTreeMap::new_in(4, 4, Lexicographic, &alloc)?;
/// map.insert(b"key1", b"val1")?;
/// assert!(alloc.bytes_in_use() > 0);
///
/// drop(map);
/// assert_eq!(alloc.bytes_in_use(), 0);
/// # Ok::<(), blob_tree::Error>(())
/// ```
pub struct BoundedAllocator<A: Allocator = Global> {
    inner: A,
    limit: Cell<usize>,
    in_use: Cell<usize>,
    total: Cell<usize>,
    live: Cell<usize>,
}

impl BoundedAllocator<Global> {
    /// Creates an allocator over [`Global`] that admits at most `limit` bytes at a time.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self::with_inner(Global, limit)
    }

    /// Creates an allocator over [`Global`] without a budget; it only counts.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::new(usize::MAX)
    }
}

impl<A: Allocator> BoundedAllocator<A> {
    /// Wraps `inner` with a budget of `limit` bytes.
    pub const fn with_inner(inner: A, limit: usize) -> Self {
        Self {
            inner,
            limit: Cell::new(limit),
            in_use: Cell::new(0),
            total: Cell::new(0),
            live: Cell::new(0),
        }
    }

    /// The current budget in bytes.
    pub fn limit(&self) -> usize {
        self.limit.get()
    }

    /// Changes the budget. Memory already handed out is unaffected.
    pub fn set_limit(&self, limit: usize) {
        self.limit.set(limit);
    }

    /// Bytes currently allocated and not yet returned.
    pub fn bytes_in_use(&self) -> usize {
        self.in_use.get()
    }

    /// Bytes that can still be allocated under the current budget.
    pub fn remaining(&self) -> usize {
        self.limit.get().saturating_sub(self.in_use.get())
    }

    /// Number of successful allocations over the allocator's lifetime.
    pub fn total_allocations(&self) -> usize {
        self.total.get()
    }

    /// Number of allocations not yet returned.
    pub fn live_allocations(&self) -> usize {
        self.live.get()
    }

    fn fits(&self, size: usize) -> bool {
        size <= self.remaining()
    }
}

impl<A: Allocator> CanAllocate for BoundedAllocator<A> {
    fn can_allocate(&self, layout: Layout) -> bool {
        self.fits(layout.size())
    }
}

// SAFETY: every block comes from `inner` and is returned to it unchanged; the
// budget bookkeeping does not touch the memory.
unsafe impl<A: Allocator> Allocator for BoundedAllocator<A> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if !self.fits(layout.size()) {
            #[cfg(feature = "tracing")]
            tracing::trace!(size = layout.size(), remaining = self.remaining(), "allocation rejected by budget");
            return Err(AllocError);
        }
        let block = self.inner.allocate(layout)?;
        self.in_use.set(self.in_use.get() + layout.size());
        self.total.set(self.total.get() + 1);
        self.live.set(self.live.get() + 1);
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: the caller upholds the `Allocator` contract, which we forward to `inner`.
        unsafe { self.inner.deallocate(ptr, layout) };
        self.in_use.set(self.in_use.get() - layout.size());
        self.live.set(self.live.get() - 1);
    }
}

impl<A: Allocator> fmt::Debug for BoundedAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedAllocator")
            .field("limit", &self.limit.get())
            .field("in_use", &self.in_use.get())
            .field("total", &self.total.get())
            .field("live", &self.live.get())
            .finish_non_exhaustive()
    }
}

impl Default for BoundedAllocator<Global> {
    fn default() -> Self {
        Self::unbounded()
    }
}
