use allocator_api2::alloc::Allocator;
use allocator_api2::vec::Vec;

use super::handle::Handle;
use crate::error::{Error, Result};

// Vacant slots are chained through `next_free`, so releasing a slot never allocates.
enum Slot<T> {
    Occupied(T),
    Vacant { next_free: Option<Handle> },
}

impl<T> Slot<T> {
    #[inline]
    fn as_ref(&self) -> Option<&T> {
        match self {
            Slot::Occupied(element) => Some(element),
            Slot::Vacant { .. } => None,
        }
    }

    #[inline]
    fn as_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Occupied(element) => Some(element),
            Slot::Vacant { .. } => None,
        }
    }
}

/// Slot table whose backing storage comes from `A`.
pub(crate) struct Arena<T, A: Allocator> {
    slots: Vec<Slot<T>, A>,
    free_head: Option<Handle>,
    len: usize,
}

impl<T, A: Allocator> Arena<T, A> {
    pub(crate) const fn new_in(alloc: A) -> Self {
        Self {
            slots: Vec::new_in(alloc),
            free_head: None,
            len: 0,
        }
    }

    pub(crate) fn try_with_capacity_in(capacity: usize, alloc: A) -> Result<Self> {
        let mut slots = Vec::new_in(alloc);
        slots.try_reserve_exact(capacity).map_err(|_| Error::NoMemory)?;
        Ok(Self {
            slots,
            free_head: None,
            len: 0,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Makes sure the next `alloc()` needs no further memory.
    pub(crate) fn reserve(&mut self) -> Result<()> {
        if self.free_head.is_some() {
            return Ok(());
        }
        if Handle::try_from_index(self.slots.len()).is_none() {
            return Err(Error::Overflow);
        }
        self.slots.try_reserve(1).map_err(|_| Error::NoMemory)
    }

    /// Bytes the allocator has to provide for the next `reserve()`, or `None` if the table cannot grow.
    ///
    /// Follows the amortized growth of the backing `Vec`: double the capacity, at least 4 slots
    /// (8 for 1-byte slots, 1 for slots over 1 KiB).
    pub(crate) fn growth_bytes(&self) -> Option<usize> {
        if self.free_head.is_some() {
            return Some(0);
        }
        let len = self.slots.len();
        Handle::try_from_index(len)?;
        if len < self.slots.capacity() {
            return Some(0);
        }

        let slot_size = core::mem::size_of::<Slot<T>>();
        let min_capacity = match slot_size {
            1 => 8,
            2..=1024 => 4,
            _ => 1,
        };
        let next = len.checked_mul(2)?.max(len + 1).max(min_capacity);
        let bytes = next.checked_mul(slot_size)?;
        (bytes <= isize::MAX as usize).then_some(bytes)
    }

    /// Stores `element` in a free slot. Call `reserve()` first; without it a full table grows infallibly.
    pub(crate) fn alloc(&mut self, element: T) -> Handle {
        let handle = if let Some(h) = self.free_head {
            let slot = &mut self.slots[h.to_index()];
            self.free_head = match slot {
                Slot::Vacant { next_free } => *next_free,
                Slot::Occupied(_) => panic!("`Arena::alloc()` - free list points at an occupied slot!"),
            };
            *slot = Slot::Occupied(element);
            h
        } else {
            let h = Handle::try_from_index(self.slots.len())
                .expect("`Arena::alloc()` - arena is at maximum capacity!");
            self.slots.push(Slot::Occupied(element));
            h
        };
        self.len += 1;
        handle
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.to_index()].as_ref().expect("`Arena::get()` - `handle` is invalid!")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.to_index()].as_mut().expect("`Arena::get_mut()` - `handle` is invalid!")
    }

    /// Borrows two distinct elements mutably at once.
    pub(crate) fn get_pair_mut(&mut self, a: Handle, b: Handle) -> (&mut T, &mut T) {
        let (i, j) = (a.to_index(), b.to_index());
        assert_ne!(i, j, "`Arena::get_pair_mut()` - handles must differ!");
        let (first, second) = if i < j {
            let (lo, hi) = self.slots.split_at_mut(j);
            (&mut lo[i], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(i);
            (&mut hi[0], &mut lo[j])
        };
        (
            first.as_mut().expect("`Arena::get_pair_mut()` - `a` is invalid!"),
            second.as_mut().expect("`Arena::get_pair_mut()` - `b` is invalid!"),
        )
    }

    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let slot = core::mem::replace(
            &mut self.slots[handle.to_index()],
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        match slot {
            Slot::Occupied(element) => {
                self.free_head = Some(handle);
                self.len -= 1;
                element
            }
            Slot::Vacant { .. } => panic!("`Arena::take()` - `handle` is invalid!"),
        }
    }

    /// Drops every slot but keeps the table's capacity.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.len = 0;
    }

    pub(crate) fn allocator(&self) -> &A {
        self.slots.allocator()
    }
}
