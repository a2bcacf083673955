use allocator_api2::alloc::Allocator;

use super::RBTreeMap;
use crate::allocator::CanAllocate;
use crate::error::Result;
use crate::raw::{RawRBTreeMap, block_layout};

impl<C, A: Allocator> RBTreeMap<C, A> {
    /// Creates an empty map whose slot table already holds `capacity` nodes.
    ///
    /// Key and value blocks are still allocated per insert.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`](crate::Error::InvalidArgument) for a zero or oversized
    ///   key or value size, or a capacity beyond the maximum number of entries.
    /// - [`Error::NoMemory`](crate::Error::NoMemory) if the table cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Global, Lexicographic, RBTreeMap};
    ///
    /// let map = RBTreeMap::with_capacity_in(4, 4, 32, Lexicographic, Global)?;
    /// assert!(map.is_empty());
    /// assert!(map.capacity() >= 32);
    /// # Ok::<(), blob_tree::Error>(())
    /// ```
    ///
    /// # Complexity
    ///
    /// O(1), plus one allocation.
    pub fn with_capacity_in(key_size: usize, value_size: usize, capacity: usize, compare: C, alloc: A) -> Result<Self> {
        #[cfg(feature = "tracing")]
        tracing::debug!(key_size, value_size, capacity, "creating map");

        Ok(RBTreeMap {
            raw: RawRBTreeMap::with_capacity_in(key_size, value_size, capacity, compare, alloc)?,
        })
    }

    /// Returns how many entries the map can hold before its slot table grows.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Estimates the memory the map accounts for, in bytes: the map itself plus, for
    /// each entry, one node and its key and value blocks.
    ///
    /// Allocator bookkeeping and unused table capacity are not counted.
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Lexicographic, RBTreeMap};
    ///
    /// let mut map = RBTreeMap::new(8, 24, Lexicographic)?;
    /// let empty = map.memory_usage();
    /// map.insert(&[1; 8], &[2; 24])?;
    /// map.insert(&[3; 8], &[4; 24])?;
    ///
    /// let per_entry = (map.memory_usage() - empty) / 2;
    /// assert!(per_entry > 8 + 24);
    /// # Ok::<(), blob_tree::Error>(())
    /// ```
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub const fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>() + self.raw.len() * self.raw.entry_footprint()
    }
}

impl<C, A: Allocator + CanAllocate> RBTreeMap<C, A> {
    /// Asks the allocator whether an allocation of `required_bytes` would succeed right now.
    ///
    /// The request is never smaller than what the next insert needs: its key and value
    /// blocks plus its node, or the slot table's growth when the table is full. So `0` asks
    /// whether the next insert can succeed. The answer is a hint: it does not reserve anything.
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{BoundedAllocator, Lexicographic, RBTreeMap};
    ///
    /// let alloc = BoundedAllocator::new(4096);
    /// let mut map = RBTreeMap::new_in(16, 16, Lexicographic, &alloc)?;
    /// assert!(map.can_perform_operation(0));
    /// assert!(!map.can_perform_operation(4097));
    ///
    /// map.insert(&[1; 16], &[1; 16])?;
    /// alloc.set_limit(alloc.bytes_in_use() + 32);
    /// assert!(!map.can_perform_operation(0));
    /// # Ok::<(), blob_tree::Error>(())
    /// ```
    #[must_use]
    pub fn can_perform_operation(&self, required_bytes: usize) -> bool {
        self.raw
            .insert_footprint()
            .and_then(|needed| block_layout(needed.max(required_bytes)).ok())
            .is_some_and(|layout| self.raw.allocator().can_allocate(layout))
    }
}
