use core::fmt;
use core::iter::FusedIterator;

use allocator_api2::alloc::{Allocator, Global};

use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::raw::{Handle, RawRBTreeMap};

mod capacity;
mod cursor;

pub use cursor::{Cursor, CursorMut};

/// An ordered map from fixed-size byte keys to fixed-size byte values, based on a [red-black tree].
///
/// Every key is exactly [`key_size`](RBTreeMap::key_size) bytes and every value exactly
/// [`value_size`](RBTreeMap::value_size) bytes; both are fixed when the map is created.
/// Keys are ordered by a [`Comparator`] supplied at construction. The map copies key and
/// value bytes into blocks obtained from its [`Allocator`] and owns them until the entry
/// is removed or the map is dropped.
///
/// Iterators obtained from [`RBTreeMap::iter`], [`RBTreeMap::keys`] or
/// [`RBTreeMap::values`] and the cursors from [`RBTreeMap::cursor_front`] and
/// [`RBTreeMap::cursor_back`] produce entries in ascending key order.
///
/// Every fallible operation returns an [`Error`] and leaves the map exactly as it was,
/// including when the allocator runs out of memory halfway through an insert.
///
/// # Examples
///
/// ```
/// use blob_tree::{Error, Lexicographic, RBTreeMap};
///
/// let mut ports = RBTreeMap::new(4, 2, Lexicographic)?;
///
/// ports.insert(b"http", &80u16.to_be_bytes())?;
/// ports.insert(b"smtp", &25u16.to_be_bytes())?;
/// ports.insert(b"sshd", &22u16.to_be_bytes())?;
///
/// // keys are unique
/// assert_eq!(ports.insert(b"http", &8080u16.to_be_bytes()), Err(Error::KeyExists));
///
/// // wrongly sized buffers are rejected up front
/// assert_eq!(ports.get(b"ftp"), Err(Error::KeySize { expected: 4, got: 3 }));
///
/// let mut port = [0; 2];
/// ports.get_into(b"smtp", &mut port)?;
/// assert_eq!(u16::from_be_bytes(port), 25);
///
/// ports.remove(b"smtp")?;
/// assert!(!ports.contains_key(b"smtp"));
///
/// for (name, port) in &ports {
///     println!("{}: {:?}", core::str::from_utf8(name).unwrap(), port);
/// }
/// # Ok::<(), Error>(())
/// ```
///
/// # Background
///
/// A red-black tree is a binary search tree whose nodes are tagged red or black. The
/// root is black, a red node never has a red child, and every path from a node down to
/// an absent child crosses the same number of black nodes. Together these keep the
/// height below `2 * log2(n + 1)`, so lookups, inserts and removals are O(log n).
/// Inserts and removals restore the rules with recoloring and at most three rotations.
///
/// Nodes live in a slot table and refer to each other by index, so parent links need no
/// shared ownership. The table itself grows through the map's allocator.
///
/// [red-black tree]: https://en.wikipedia.org/wiki/Red%E2%80%93black_tree
pub struct RBTreeMap<C, A: Allocator = Global> {
    raw: RawRBTreeMap<C, A>,
}

/// An iterator over the entries of an `RBTreeMap`.
///
/// This `struct` is created by the [`iter`] method on [`RBTreeMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use blob_tree::{Lexicographic, RBTreeMap};
///
/// let mut map = RBTreeMap::new(1, 1, Lexicographic)?;
/// map.insert(b"b", b"2")?;
/// map.insert(b"a", b"1")?;
/// let mut iter = map.iter();
/// assert_eq!(iter.next(), Some((&b"a"[..], &b"1"[..])));
/// assert_eq!(iter.next_back(), Some((&b"b"[..], &b"2"[..])));
/// assert_eq!(iter.next(), None);
/// # Ok::<(), blob_tree::Error>(())
/// ```
///
/// [`iter`]: RBTreeMap::iter
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, C, A: Allocator = Global> {
    tree: &'a RawRBTreeMap<C, A>,
    front: Option<Handle>,
    back: Option<Handle>,
    remaining: usize,
}

/// An iterator over the keys of an `RBTreeMap`.
///
/// This `struct` is created by the [`keys`] method on [`RBTreeMap`].
///
/// [`keys`]: RBTreeMap::keys
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Keys<'a, C, A: Allocator = Global> {
    inner: Iter<'a, C, A>,
}

/// An iterator over the values of an `RBTreeMap`.
///
/// This `struct` is created by the [`values`] method on [`RBTreeMap`].
///
/// [`values`]: RBTreeMap::values
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Values<'a, C, A: Allocator = Global> {
    inner: Iter<'a, C, A>,
}

impl<C> RBTreeMap<C, Global> {
    /// Makes a new, empty `RBTreeMap` on the global allocator.
    ///
    /// Does not allocate anything on its own.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `key_size` or `value_size` is zero or too large to allocate.
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Error, Lexicographic, RBTreeMap};
    ///
    /// let mut map = RBTreeMap::new(8, 8, Lexicographic)?;
    /// map.insert(&1u64.to_be_bytes(), &2u64.to_be_bytes())?;
    ///
    /// assert!(matches!(RBTreeMap::new(0, 8, Lexicographic), Err(Error::InvalidArgument(_))));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn new(key_size: usize, value_size: usize, compare: C) -> Result<Self> {
        Self::new_in(key_size, value_size, compare, Global)
    }
}

impl<C, A: Allocator> RBTreeMap<C, A> {
    /// Makes a new, empty `RBTreeMap` whose nodes, keys and values come from `alloc`.
    ///
    /// Does not allocate anything on its own.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `key_size` or `value_size` is zero or too large to allocate.
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{BoundedAllocator, Error, Lexicographic, RBTreeMap};
    ///
    /// let alloc = BoundedAllocator::new(4096);
    /// let map = RBTreeMap::new_in(16, 64, Lexicographic, &alloc)?;
    /// assert!(map.is_empty());
    /// assert_eq!(alloc.total_allocations(), 0);
    /// # Ok::<(), Error>(())
    /// ```
    pub fn new_in(key_size: usize, value_size: usize, compare: C, alloc: A) -> Result<Self> {
        #[cfg(feature = "tracing")]
        tracing::debug!(key_size, value_size, "creating map");

        Ok(RBTreeMap {
            raw: RawRBTreeMap::new_in(key_size, value_size, compare, alloc)?,
        })
    }

    /// Clears the map, removing all entries. Sizes, comparator and allocator are kept.
    ///
    /// # Complexity
    ///
    /// O(n)
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Lexicographic, RBTreeMap};
    ///
    /// let mut a = RBTreeMap::new(1, 1, Lexicographic)?;
    /// a.insert(b"1", b"a")?;
    /// a.clear();
    /// assert!(a.is_empty());
    /// # Ok::<(), blob_tree::Error>(())
    /// ```
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The fixed length of every key, in bytes.
    #[must_use]
    pub const fn key_size(&self) -> usize {
        self.raw.key_size()
    }

    /// The fixed length of every value, in bytes.
    #[must_use]
    pub const fn value_size(&self) -> usize {
        self.raw.value_size()
    }

    /// Returns a reference to the map's comparator.
    #[must_use]
    pub const fn comparator(&self) -> &C {
        self.raw.comparator()
    }

    /// Returns a reference to the map's allocator.
    #[must_use]
    pub fn allocator(&self) -> &A {
        self.raw.allocator()
    }

    /// Returns the number of nodes on the longest path from the root to a leaf.
    ///
    /// Always at most `2 * log2(len + 1)`.
    ///
    /// # Complexity
    ///
    /// O(n)
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Lexicographic, RBTreeMap};
    ///
    /// let mut map = RBTreeMap::new(4, 1, Lexicographic)?;
    /// assert_eq!(map.height(), 0);
    /// for i in 0u32..1023 {
    ///     map.insert(&i.to_be_bytes(), b"x")?;
    /// }
    /// assert!(map.height() <= 20);
    /// # Ok::<(), blob_tree::Error>(())
    /// ```
    #[must_use]
    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// Returns the entry with the minimum key.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn first_key_value(&self) -> Option<(&[u8], &[u8])> {
        self.raw.first().map(|handle| self.entry(handle))
    }

    /// Returns the entry with the maximum key.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn last_key_value(&self) -> Option<(&[u8], &[u8])> {
        self.raw.last().map(|handle| self.entry(handle))
    }

    /// Gets an iterator over the entries of the map, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Lexicographic, RBTreeMap};
    ///
    /// let mut map = RBTreeMap::new(1, 1, Lexicographic)?;
    /// map.insert(b"3", b"c")?;
    /// map.insert(b"1", b"a")?;
    /// map.insert(b"2", b"b")?;
    ///
    /// let keys: Vec<_> = map.iter().map(|(k, _)| k[0]).collect();
    /// assert_eq!(keys, b"123");
    /// # Ok::<(), blob_tree::Error>(())
    /// ```
    pub fn iter(&self) -> Iter<'_, C, A> {
        Iter {
            tree: &self.raw,
            front: self.raw.first(),
            back: self.raw.last(),
            remaining: self.raw.len(),
        }
    }

    /// Gets an iterator over the keys of the map, in sorted order.
    pub fn keys(&self) -> Keys<'_, C, A> {
        Keys { inner: self.iter() }
    }

    /// Gets an iterator over the values of the map, in order by key.
    pub fn values(&self) -> Values<'_, C, A> {
        Values { inner: self.iter() }
    }

    /// Returns a cursor at the entry with the minimum key, or at the ghost position if the map is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Lexicographic, RBTreeMap};
    ///
    /// let mut map = RBTreeMap::new(1, 1, Lexicographic)?;
    /// map.insert(b"a", b"1")?;
    /// map.insert(b"b", b"2")?;
    ///
    /// let mut cursor = map.cursor_front();
    /// assert_eq!(cursor.key(), Some(&b"a"[..]));
    /// assert!(cursor.move_next());
    /// assert_eq!(cursor.key(), Some(&b"b"[..]));
    /// assert!(!cursor.move_next());
    /// assert_eq!(cursor.key(), None);
    /// # Ok::<(), blob_tree::Error>(())
    /// ```
    pub fn cursor_front(&self) -> Cursor<'_, C, A> {
        Cursor::new(&self.raw, self.raw.first())
    }

    /// Returns a cursor at the entry with the maximum key, or at the ghost position if the map is empty.
    pub fn cursor_back(&self) -> Cursor<'_, C, A> {
        Cursor::new(&self.raw, self.raw.last())
    }

    /// Returns a mutable cursor at the entry with the minimum key.
    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, C, A> {
        let first = self.raw.first();
        CursorMut::new(&mut self.raw, first)
    }

    /// Returns a mutable cursor at the entry with the maximum key.
    pub fn cursor_back_mut(&mut self) -> CursorMut<'_, C, A> {
        let last = self.raw.last();
        CursorMut::new(&mut self.raw, last)
    }

    fn entry(&self, handle: Handle) -> (&[u8], &[u8]) {
        let node = self.raw.node(handle);
        (node.key(), node.value())
    }
}

impl<C: Comparator, A: Allocator> RBTreeMap<C, A> {
    fn find(&self, key: &[u8]) -> Result<Handle> {
        self.raw.check_key(key)?;
        self.raw.search(key).ok_or(Error::KeyNotFound)
    }

    /// Inserts a copy of `key` and `value`.
    ///
    /// Keys are unique: if the map already holds an equal key, the map is left untouched and
    /// [`Error::KeyExists`] is returned. Use [`get_mut`](RBTreeMap::get_mut) to replace a value.
    ///
    /// # Errors
    ///
    /// - [`Error::KeySize`] / [`Error::ValueSize`] if a buffer has the wrong length.
    /// - [`Error::KeyExists`] if an equal key is present.
    /// - [`Error::NoMemory`] if the allocator refuses the node or either block.
    /// - [`Error::Overflow`] if the map already holds the maximum number of entries.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Error, Lexicographic, RBTreeMap};
    ///
    /// let mut map = RBTreeMap::new(2, 2, Lexicographic)?;
    /// map.insert(b"37", b"aa")?;
    /// assert_eq!(map.len(), 1);
    ///
    /// assert_eq!(map.insert(b"37", b"bb"), Err(Error::KeyExists));
    /// assert_eq!(map.get(b"37")?, b"aa");
    /// # Ok::<(), Error>(())
    /// ```
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.raw.insert(key, value).map(|_| ())
    }

    /// Removes the entry for `key`.
    ///
    /// # Errors
    ///
    /// - [`Error::KeySize`] if `key` has the wrong length.
    /// - [`Error::KeyNotFound`] if no entry matches.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Error, Lexicographic, RBTreeMap};
    ///
    /// let mut map = RBTreeMap::new(1, 1, Lexicographic)?;
    /// map.insert(b"1", b"a")?;
    /// map.remove(b"1")?;
    /// assert_eq!(map.remove(b"1"), Err(Error::KeyNotFound));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        let handle = self.find(key)?;
        self.raw.remove_at(handle, None);
        Ok(())
    }

    /// Removes the entry for `key`, copying its value into `out` first.
    ///
    /// # Errors
    ///
    /// - [`Error::KeySize`] if `key` has the wrong length.
    /// - [`Error::ValueSize`] if `out` has the wrong length.
    /// - [`Error::KeyNotFound`] if no entry matches.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove_into(&mut self, key: &[u8], out: &mut [u8]) -> Result<()> {
        self.raw.check_key(key)?;
        self.raw.check_value(out)?;
        let handle = self.find(key)?;
        self.raw.remove_at(handle, Some(out));
        Ok(())
    }

    /// Returns the value stored for `key`.
    ///
    /// # Errors
    ///
    /// - [`Error::KeySize`] if `key` has the wrong length.
    /// - [`Error::KeyNotFound`] if no entry matches.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn get(&self, key: &[u8]) -> Result<&[u8]> {
        let handle = self.find(key)?;
        Ok(self.raw.node(handle).value())
    }

    /// Copies the value stored for `key` into `out`.
    ///
    /// # Errors
    ///
    /// - [`Error::KeySize`] if `key` has the wrong length.
    /// - [`Error::ValueSize`] if `out` has the wrong length.
    /// - [`Error::KeyNotFound`] if no entry matches; `out` is left untouched.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn get_into(&self, key: &[u8], out: &mut [u8]) -> Result<()> {
        self.raw.check_key(key)?;
        self.raw.check_value(out)?;
        out.copy_from_slice(self.get(key)?);
        Ok(())
    }

    /// Returns the stored value for `key` for in-place modification. Keys are never mutable.
    ///
    /// # Errors
    ///
    /// - [`Error::KeySize`] if `key` has the wrong length.
    /// - [`Error::KeyNotFound`] if no entry matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use blob_tree::{Lexicographic, RBTreeMap};
    ///
    /// let mut map = RBTreeMap::new(1, 1, Lexicographic)?;
    /// map.insert(b"k", b"a")?;
    /// map.get_mut(b"k")?.copy_from_slice(b"b");
    /// assert_eq!(map.get(b"k")?, b"b");
    /// # Ok::<(), blob_tree::Error>(())
    /// ```
    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut [u8]> {
        let handle = self.find(key)?;
        Ok(self.raw.node_mut(handle).value_mut())
    }

    /// Returns the stored key and value for `key`.
    ///
    /// The stored key compares equal to `key` but, with a custom [`Comparator`], need not be
    /// byte-identical to it.
    ///
    /// # Errors
    ///
    /// - [`Error::KeySize`] if `key` has the wrong length.
    /// - [`Error::KeyNotFound`] if no entry matches.
    pub fn get_key_value(&self, key: &[u8]) -> Result<(&[u8], &[u8])> {
        let handle = self.find(key)?;
        Ok(self.entry(handle))
    }

    /// Returns `true` if the map contains an entry for `key`.
    ///
    /// A key of the wrong length can never be present, so this never fails.
    #[must_use]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find(key).is_ok()
    }

    /// Makes a deep copy of the map on a clone of its allocator.
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`] if the allocator cannot hold the copy. Whatever was copied so far is freed.
    pub fn try_clone(&self) -> Result<Self>
    where
        C: Clone,
        A: Clone,
    {
        Ok(RBTreeMap {
            raw: self
                .raw
                .try_clone_with(self.raw.comparator().clone(), self.raw.allocator().clone())?,
        })
    }
}

impl<C, A: Allocator> PartialEq for RBTreeMap<C, A> {
    /// Two maps are equal when they hold byte-identical entries in the same order.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<C, A: Allocator> Eq for RBTreeMap<C, A> {}

impl<C, A: Allocator> fmt::Debug for RBTreeMap<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, C, A: Allocator> IntoIterator for &'a RBTreeMap<C, A> {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a, C, A>;

    fn into_iter(self) -> Iter<'a, C, A> {
        self.iter()
    }
}

impl<'a, C, A: Allocator> Iterator for Iter<'a, C, A> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let handle = self.front?;
        let tree = self.tree;
        self.front = tree.successor(handle);
        self.remaining -= 1;
        let node = tree.node(handle);
        Some((node.key(), node.value()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }

    fn last(mut self) -> Option<Self::Item> {
        self.next_back()
    }
}

impl<C, A: Allocator> DoubleEndedIterator for Iter<'_, C, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let handle = self.back?;
        let tree = self.tree;
        self.back = tree.predecessor(handle);
        self.remaining -= 1;
        let node = tree.node(handle);
        Some((node.key(), node.value()))
    }
}

impl<C, A: Allocator> ExactSizeIterator for Iter<'_, C, A> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<C, A: Allocator> FusedIterator for Iter<'_, C, A> {}

impl<C, A: Allocator> Clone for Iter<'_, C, A> {
    fn clone(&self) -> Self {
        Iter {
            tree: self.tree,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<C, A: Allocator> fmt::Debug for Iter<'_, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, C, A: Allocator> Iterator for Keys<'a, C, A> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }

    fn last(mut self) -> Option<Self::Item> {
        self.next_back()
    }
}

impl<C, A: Allocator> DoubleEndedIterator for Keys<'_, C, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<C, A: Allocator> ExactSizeIterator for Keys<'_, C, A> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<C, A: Allocator> FusedIterator for Keys<'_, C, A> {}

impl<C, A: Allocator> Clone for Keys<'_, C, A> {
    fn clone(&self) -> Self {
        Keys {
            inner: self.inner.clone(),
        }
    }
}

impl<C, A: Allocator> fmt::Debug for Keys<'_, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, C, A: Allocator> Iterator for Values<'a, C, A> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }

    fn last(mut self) -> Option<Self::Item> {
        self.next_back()
    }
}

impl<C, A: Allocator> DoubleEndedIterator for Values<'_, C, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<C, A: Allocator> ExactSizeIterator for Values<'_, C, A> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<C, A: Allocator> FusedIterator for Values<'_, C, A> {}

impl<C, A: Allocator> Clone for Values<'_, C, A> {
    fn clone(&self) -> Self {
        Values {
            inner: self.inner.clone(),
        }
    }
}

impl<C, A: Allocator> fmt::Debug for Values<'_, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}
