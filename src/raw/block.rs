use core::alloc::Layout;
use core::ptr::NonNull;

use allocator_api2::alloc::Allocator;

use crate::error::{Error, Result};

/// Alignment of every key and value block.
pub(crate) const BLOCK_ALIGN: usize = core::mem::align_of::<usize>();

/// Builds the layout used for blocks of `size` bytes.
pub(crate) fn block_layout(size: usize) -> Result<Layout> {
    Layout::from_size_align(size, BLOCK_ALIGN).map_err(|_| Error::InvalidArgument("block size overflows isize::MAX"))
}

/// A fixed-size byte buffer owned by a node.
///
/// A block does not free itself: it has to be handed back to the allocator it
/// came from through [`Block::release`].
pub(crate) struct Block {
    ptr: NonNull<u8>,
    len: usize,
}

impl Block {
    /// Allocates a block of `layout` and fills it with `bytes`.
    pub(crate) fn copy_in<A: Allocator>(alloc: &A, layout: Layout, bytes: &[u8]) -> Result<Self> {
        debug_assert_eq!(layout.size(), bytes.len());
        let ptr = alloc.allocate(layout)?.cast::<u8>();
        // SAFETY: the allocation is at least `layout.size() == bytes.len()` bytes and cannot
        // overlap `bytes`, which is borrowed from the caller.
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) };
        Ok(Self { ptr, len: bytes.len() })
    }

    /// Returns the block to `alloc`.
    ///
    /// # Safety
    /// - `alloc` must be the allocator that produced this block.
    /// - `layout` must be the layout passed to [`Block::copy_in`].
    pub(crate) unsafe fn release<A: Allocator>(self, alloc: &A, layout: Layout) {
        // SAFETY: guaranteed by the caller.
        unsafe { alloc.deallocate(self.ptr, layout) };
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `len` initialized bytes for as long as the block lives.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

// SAFETY: a block is a uniquely owned heap buffer of plain bytes.
unsafe impl Send for Block {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for Block {}
