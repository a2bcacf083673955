use core::fmt;

use allocator_api2::alloc::{Allocator, Global};

use crate::error::{Error, Result};
use crate::raw::{Handle, RawRBTreeMap};

/// A cursor over an `RBTreeMap`.
///
/// A cursor points either at an entry or at the "ghost" position, which sits between
/// the last and the first entry. Moving forward from the last entry reaches the ghost,
/// and moving forward again wraps around to the first entry. Moving backward mirrors this.
///
/// Cursors are created with [`RBTreeMap::cursor_front`] and [`RBTreeMap::cursor_back`].
/// While a cursor is alive the map is borrowed, so it cannot be modified underneath it.
///
/// [`RBTreeMap::cursor_front`]: super::RBTreeMap::cursor_front
/// [`RBTreeMap::cursor_back`]: super::RBTreeMap::cursor_back
pub struct Cursor<'a, C, A: Allocator = Global> {
    tree: &'a RawRBTreeMap<C, A>,
    current: Option<Handle>,
}

/// A cursor over an `RBTreeMap` that can change values and remove entries.
///
/// Follows the same ghost-position convention as [`Cursor`].
///
/// # Examples
///
/// ```
/// use blob_tree::{Lexicographic, RBTreeMap};
///
/// let mut map = RBTreeMap::new(1, 1, Lexicographic)?;
/// for k in *b"abcd" {
///     map.insert(&[k], b"0")?;
/// }
///
/// // Drop every other entry and mark the rest.
/// let mut cursor = map.cursor_front_mut();
/// while cursor.is_valid() {
///     cursor.remove_current()?;
///     if cursor.is_valid() {
///         cursor.set_value(b"1")?;
///         cursor.move_next();
///     }
/// }
/// drop(cursor);
///
/// assert_eq!(map.keys().collect::<Vec<_>>(), [b"b", b"d"]);
/// assert!(map.values().all(|v| v == b"1"));
/// # Ok::<(), blob_tree::Error>(())
/// ```
pub struct CursorMut<'a, C, A: Allocator = Global> {
    tree: &'a mut RawRBTreeMap<C, A>,
    current: Option<Handle>,
}

impl<'a, C, A: Allocator> Cursor<'a, C, A> {
    pub(super) fn new(tree: &'a RawRBTreeMap<C, A>, current: Option<Handle>) -> Self {
        Cursor { tree, current }
    }

    /// Returns `true` unless the cursor is at the ghost position.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    /// Moves to the next entry in key order, or from the last entry to the ghost, or from the
    /// ghost to the first entry. Returns whether the cursor now points at an entry.
    ///
    /// # Complexity
    ///
    /// O(log n) worst case, O(1) amortized over a full traversal.
    pub fn move_next(&mut self) -> bool {
        self.current = match self.current {
            Some(handle) => self.tree.successor(handle),
            None => self.tree.first(),
        };
        self.is_valid()
    }

    /// Moves to the previous entry in key order, or from the first entry to the ghost, or from
    /// the ghost to the last entry. Returns whether the cursor now points at an entry.
    pub fn move_prev(&mut self) -> bool {
        self.current = match self.current {
            Some(handle) => self.tree.predecessor(handle),
            None => self.tree.last(),
        };
        self.is_valid()
    }

    /// The key of the current entry.
    #[must_use]
    pub fn key(&self) -> Option<&'a [u8]> {
        let tree = self.tree;
        self.current.map(|handle| tree.node(handle).key())
    }

    /// The value of the current entry.
    #[must_use]
    pub fn value(&self) -> Option<&'a [u8]> {
        let tree = self.tree;
        self.current.map(|handle| tree.node(handle).value())
    }

    /// The key and value of the current entry.
    #[must_use]
    pub fn key_value(&self) -> Option<(&'a [u8], &'a [u8])> {
        let tree = self.tree;
        self.current.map(|handle| {
            let node = tree.node(handle);
            (node.key(), node.value())
        })
    }

    /// Copies the current key and value into `key` and `value`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCursor`] at the ghost position.
    /// - [`Error::KeySize`] / [`Error::ValueSize`] if a buffer has the wrong length.
    pub fn read_into(&self, key: &mut [u8], value: &mut [u8]) -> Result<()> {
        read_into(self.tree, self.current, key, value)
    }
}

impl<C, A: Allocator> Clone for Cursor<'_, C, A> {
    fn clone(&self) -> Self {
        Cursor {
            tree: self.tree,
            current: self.current,
        }
    }
}

impl<C, A: Allocator> fmt::Debug for Cursor<'_, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.key_value()).finish()
    }
}

impl<'a, C, A: Allocator> CursorMut<'a, C, A> {
    pub(super) fn new(tree: &'a mut RawRBTreeMap<C, A>, current: Option<Handle>) -> Self {
        CursorMut { tree, current }
    }

    /// Returns `true` unless the cursor is at the ghost position.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    /// See [`Cursor::move_next`].
    pub fn move_next(&mut self) -> bool {
        self.current = match self.current {
            Some(handle) => self.tree.successor(handle),
            None => self.tree.first(),
        };
        self.is_valid()
    }

    /// See [`Cursor::move_prev`].
    pub fn move_prev(&mut self) -> bool {
        self.current = match self.current {
            Some(handle) => self.tree.predecessor(handle),
            None => self.tree.last(),
        };
        self.is_valid()
    }

    /// The key of the current entry.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.current.map(|handle| self.tree.node(handle).key())
    }

    /// The value of the current entry.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.current.map(|handle| self.tree.node(handle).value())
    }

    /// The key and value of the current entry.
    #[must_use]
    pub fn key_value(&self) -> Option<(&[u8], &[u8])> {
        self.current.map(|handle| {
            let node = self.tree.node(handle);
            (node.key(), node.value())
        })
    }

    /// The value of the current entry, for in-place modification.
    pub fn value_mut(&mut self) -> Option<&mut [u8]> {
        let handle = self.current?;
        Some(self.tree.node_mut(handle).value_mut())
    }

    /// See [`Cursor::read_into`].
    ///
    /// # Errors
    ///
    /// As for [`Cursor::read_into`].
    pub fn read_into(&self, key: &mut [u8], value: &mut [u8]) -> Result<()> {
        read_into(self.tree, self.current, key, value)
    }

    /// Overwrites the current value with `value`. The key cannot be changed.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCursor`] at the ghost position.
    /// - [`Error::ValueSize`] if `value` has the wrong length.
    pub fn set_value(&mut self, value: &[u8]) -> Result<()> {
        let handle = self.current.ok_or(Error::InvalidCursor)?;
        self.tree.check_value(value)?;
        self.tree.node_mut(handle).value_mut().copy_from_slice(value);
        Ok(())
    }

    /// Removes the current entry and moves to the entry after it, or to the ghost
    /// position if it was the last one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCursor`] at the ghost position.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove_current(&mut self) -> Result<()> {
        let handle = self.current.ok_or(Error::InvalidCursor)?;
        self.current = self.tree.remove_at(handle, None);
        Ok(())
    }

    /// Returns a read-only cursor at the same position, borrowing this one.
    #[must_use]
    pub fn as_cursor(&self) -> Cursor<'_, C, A> {
        Cursor::new(self.tree, self.current)
    }
}

impl<C, A: Allocator> fmt::Debug for CursorMut<'_, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorMut").field(&self.key_value()).finish()
    }
}

fn read_into<C, A: Allocator>(
    tree: &RawRBTreeMap<C, A>,
    current: Option<Handle>,
    key: &mut [u8],
    value: &mut [u8],
) -> Result<()> {
    let handle = current.ok_or(Error::InvalidCursor)?;
    tree.check_key(key)?;
    tree.check_value(value)?;
    let node = tree.node(handle);
    key.copy_from_slice(node.key());
    value.copy_from_slice(node.value());
    Ok(())
}
