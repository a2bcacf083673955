use core::alloc::Layout;
use core::cmp::Ordering;

use allocator_api2::alloc::Allocator;
use smallvec::SmallVec;

use super::arena::Arena;
use super::block::{Block, block_layout};
use super::handle::Handle;
use super::node::{Color, Node};
use crate::comparator::Comparator;
use crate::error::{Error, Result};

/// Stack used by the iterative traversals. Heights stay below 64 for any tree the arena can hold.
type Stack<T> = SmallVec<[T; 64]>;

/// The red-black tree backing `RBTreeMap`.
pub(crate) struct RawRBTreeMap<C, A: Allocator> {
    /// Node slots. Its allocator is also the one every key and value block comes from.
    nodes: Arena<Node, A>,
    root: Option<Handle>,
    key_layout: Layout,
    value_layout: Layout,
    cmp: C,
}

impl<C, A: Allocator> RawRBTreeMap<C, A> {
    /// Creates an empty tree. Nothing is allocated until the first insert.
    pub(crate) fn new_in(key_size: usize, value_size: usize, cmp: C, alloc: A) -> Result<Self> {
        let (key_layout, value_layout) = Self::layouts(key_size, value_size)?;
        Ok(Self {
            nodes: Arena::new_in(alloc),
            root: None,
            key_layout,
            value_layout,
            cmp,
        })
    }

    /// Creates an empty tree with room for `capacity` nodes in the slot table.
    pub(crate) fn with_capacity_in(key_size: usize, value_size: usize, capacity: usize, cmp: C, alloc: A) -> Result<Self> {
        let (key_layout, value_layout) = Self::layouts(key_size, value_size)?;
        if capacity > Handle::MAX + 1 {
            return Err(Error::InvalidArgument("capacity exceeds the maximum number of entries"));
        }
        Ok(Self {
            nodes: Arena::try_with_capacity_in(capacity, alloc)?,
            root: None,
            key_layout,
            value_layout,
            cmp,
        })
    }

    fn layouts(key_size: usize, value_size: usize) -> Result<(Layout, Layout)> {
        if key_size == 0 {
            return Err(Error::InvalidArgument("key size must be non-zero"));
        }
        if value_size == 0 {
            return Err(Error::InvalidArgument("value size must be non-zero"));
        }
        Ok((block_layout(key_size)?, block_layout(value_size)?))
    }

    pub(crate) const fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    pub(crate) const fn key_size(&self) -> usize {
        self.key_layout.size()
    }

    pub(crate) const fn value_size(&self) -> usize {
        self.value_layout.size()
    }

    /// Bytes one entry accounts for: its node plus its key and value blocks.
    pub(crate) const fn entry_footprint(&self) -> usize {
        core::mem::size_of::<Node>() + self.key_size() + self.value_size()
    }

    /// Bytes the next insert asks the allocator for: both blocks plus either the slot
    /// table's growth or, when a slot is free, one node. `None` if the table cannot grow.
    pub(crate) fn insert_footprint(&self) -> Option<usize> {
        let node_bytes = match self.nodes.growth_bytes()? {
            0 => core::mem::size_of::<Node>(),
            growth => growth,
        };
        (self.key_size() + self.value_size()).checked_add(node_bytes)
    }

    pub(crate) const fn comparator(&self) -> &C {
        &self.cmp
    }

    pub(crate) fn allocator(&self) -> &A {
        self.nodes.allocator()
    }

    #[inline]
    pub(crate) fn node(&self, handle: Handle) -> &Node {
        self.nodes.get(handle)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, handle: Handle) -> &mut Node {
        self.nodes.get_mut(handle)
    }

    pub(crate) fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() == self.key_size() {
            Ok(())
        } else {
            Err(Error::KeySize {
                expected: self.key_size(),
                got: key.len(),
            })
        }
    }

    pub(crate) fn check_value(&self, value: &[u8]) -> Result<()> {
        if value.len() == self.value_size() {
            Ok(())
        } else {
            Err(Error::ValueSize {
                expected: self.value_size(),
                got: value.len(),
            })
        }
    }

    // ─── Navigation ──────────────────────────────────────────────────────────

    /// Color of a possibly absent node. Absent children count as black.
    #[inline]
    fn color(&self, handle: Option<Handle>) -> Color {
        handle.map_or(Color::Black, |h| self.node(h).color)
    }

    #[inline]
    fn set_color(&mut self, handle: Handle, color: Color) {
        self.node_mut(handle).color = color;
    }

    /// Leftmost node of the subtree rooted at `handle`.
    pub(crate) fn minimum(&self, mut handle: Handle) -> Handle {
        while let Some(left) = self.node(handle).left {
            handle = left;
        }
        handle
    }

    /// Rightmost node of the subtree rooted at `handle`.
    pub(crate) fn maximum(&self, mut handle: Handle) -> Handle {
        while let Some(right) = self.node(handle).right {
            handle = right;
        }
        handle
    }

    pub(crate) fn first(&self) -> Option<Handle> {
        self.root.map(|root| self.minimum(root))
    }

    pub(crate) fn last(&self) -> Option<Handle> {
        self.root.map(|root| self.maximum(root))
    }

    /// In-order successor, or `None` after the maximum.
    pub(crate) fn successor(&self, handle: Handle) -> Option<Handle> {
        if let Some(right) = self.node(handle).right {
            return Some(self.minimum(right));
        }
        let mut child = handle;
        let mut parent = self.node(handle).parent;
        while let Some(p) = parent {
            if self.node(p).left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.node(p).parent;
        }
        None
    }

    /// In-order predecessor, or `None` before the minimum.
    pub(crate) fn predecessor(&self, handle: Handle) -> Option<Handle> {
        if let Some(left) = self.node(handle).left {
            return Some(self.maximum(left));
        }
        let mut child = handle;
        let mut parent = self.node(handle).parent;
        while let Some(p) = parent {
            if self.node(p).right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.node(p).parent;
        }
        None
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub(crate) fn height(&self) -> usize {
        let mut height = 0;
        let mut stack: Stack<(Handle, usize)> = Stack::new();
        stack.extend(self.root.map(|root| (root, 1)));
        while let Some((handle, depth)) = stack.pop() {
            height = height.max(depth);
            let node = self.node(handle);
            stack.extend(node.left.map(|h| (h, depth + 1)));
            stack.extend(node.right.map(|h| (h, depth + 1)));
        }
        height
    }

    // ─── Structural primitives ───────────────────────────────────────────────

    /// Points `parent`'s link to `old` at `new` instead. A `None` parent means `old` is the root.
    fn replace_child(&mut self, parent: Option<Handle>, old: Handle, new: Option<Handle>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = self.node_mut(p);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    debug_assert_eq!(node.right, Some(old), "`replace_child()` - `old` is not a child of `parent`!");
                    node.right = new;
                }
            }
        }
    }

    fn rotate_left(&mut self, handle: Handle) {
        let pivot = self.node(handle).right.expect("`rotate_left()` - node has no right child!");
        let inner = self.node(pivot).left;

        self.node_mut(handle).right = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(handle);
        }

        let parent = self.node(handle).parent;
        self.node_mut(pivot).parent = parent;
        self.replace_child(parent, handle, Some(pivot));

        self.node_mut(pivot).left = Some(handle);
        self.node_mut(handle).parent = Some(pivot);
    }

    fn rotate_right(&mut self, handle: Handle) {
        let pivot = self.node(handle).left.expect("`rotate_right()` - node has no left child!");
        let inner = self.node(pivot).right;

        self.node_mut(handle).left = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(handle);
        }

        let parent = self.node(handle).parent;
        self.node_mut(pivot).parent = parent;
        self.replace_child(parent, handle, Some(pivot));

        self.node_mut(pivot).right = Some(handle);
        self.node_mut(handle).parent = Some(pivot);
    }

    // ─── Insert ──────────────────────────────────────────────────────────────

    /// Copies `key` and `value` into fresh blocks and links them under `parent`.
    ///
    /// `parent` and `side` must come from a failed search for `key`. Nothing is
    /// linked unless every allocation succeeded.
    fn link(&mut self, key: &[u8], value: &[u8], parent: Option<Handle>, side: Ordering) -> Result<Handle> {
        let key_block = Block::copy_in(self.nodes.allocator(), self.key_layout, key)?;
        let value_block = match Block::copy_in(self.nodes.allocator(), self.value_layout, value) {
            Ok(block) => block,
            Err(err) => {
                // SAFETY: `key_block` was just made by this allocator with `key_layout`.
                unsafe { key_block.release(self.nodes.allocator(), self.key_layout) };
                return Err(err);
            }
        };
        if let Err(err) = self.nodes.reserve() {
            // SAFETY: both blocks were just made by this allocator with these layouts.
            unsafe {
                key_block.release(self.nodes.allocator(), self.key_layout);
                value_block.release(self.nodes.allocator(), self.value_layout);
            }
            return Err(err);
        }

        let handle = self.nodes.alloc(Node::new(key_block, value_block, parent));
        match (parent, side) {
            (None, _) => self.root = Some(handle),
            (Some(p), Ordering::Less) => self.node_mut(p).left = Some(handle),
            (Some(p), _) => self.node_mut(p).right = Some(handle),
        }
        Ok(handle)
    }

    /// Restores the red-black rules after `handle` was linked as a red leaf.
    fn insert_fixup(&mut self, mut handle: Handle) {
        while let Some(mut parent) = self.node(handle).parent {
            if !self.node(parent).is_red() {
                break;
            }
            let grandparent = self.node(parent).parent.expect("`insert_fixup()` - a red node cannot be the root!");
            let parent_is_left = self.node(grandparent).left == Some(parent);
            let uncle = if parent_is_left {
                self.node(grandparent).right
            } else {
                self.node(grandparent).left
            };

            if let Some(uncle) = uncle.filter(|&u| self.node(u).is_red()) {
                self.set_color(parent, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(grandparent, Color::Red);
                handle = grandparent;
                continue;
            }

            if parent_is_left {
                if self.node(parent).right == Some(handle) {
                    self.rotate_left(parent);
                    core::mem::swap(&mut handle, &mut parent);
                }
                self.rotate_right(grandparent);
            } else {
                if self.node(parent).left == Some(handle) {
                    self.rotate_right(parent);
                    core::mem::swap(&mut handle, &mut parent);
                }
                self.rotate_left(grandparent);
            }
            self.set_color(parent, Color::Black);
            self.set_color(grandparent, Color::Red);
            break;
        }

        if let Some(root) = self.root {
            self.set_color(root, Color::Black);
        }
    }

    // ─── Remove ──────────────────────────────────────────────────────────────

    /// Removes the entry at `handle`, copying its value into `out` first.
    ///
    /// Returns the handle that now holds the entry following the removed one.
    pub(crate) fn remove_at(&mut self, handle: Handle, out: Option<&mut [u8]>) -> Option<Handle> {
        let node = self.node(handle);
        let (target, next) = match (node.left, node.right) {
            (Some(_), Some(right)) => {
                // The successor's payload moves into `handle`; its node is the one unlinked.
                let successor = self.minimum(right);
                let (node, successor_node) = self.nodes.get_pair_mut(handle, successor);
                node.swap_payload(successor_node);
                (successor, Some(handle))
            }
            _ => (handle, self.successor(handle)),
        };

        let node = self.node(target);
        let child = node.left.or(node.right);
        let parent = node.parent;
        let color = node.color;

        if let Some(child) = child {
            self.node_mut(child).parent = parent;
        }
        self.replace_child(parent, target, child);
        let removed = self.nodes.take(target);

        if color == Color::Black {
            self.remove_fixup(child, parent);
        }

        if let Some(out) = out {
            out.copy_from_slice(removed.value());
        }
        self.release(removed);
        next
    }

    /// Restores equal black heights after a black node was unlinked above `handle`.
    ///
    /// `handle` may be absent, so its parent is tracked separately.
    fn remove_fixup(&mut self, mut handle: Option<Handle>, mut parent: Option<Handle>) {
        while handle != self.root && self.color(handle) == Color::Black {
            let Some(p) = parent else { break };

            if self.node(p).left == handle {
                let mut sibling = self.node(p).right.expect("`remove_fixup()` - a double-black node must have a sibling!");
                if self.node(sibling).is_red() {
                    self.set_color(sibling, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_left(p);
                    sibling = self.node(p).right.expect("`remove_fixup()` - a double-black node must have a sibling!");
                }

                let (near, far) = (self.node(sibling).left, self.node(sibling).right);
                if self.color(near) == Color::Black && self.color(far) == Color::Black {
                    self.set_color(sibling, Color::Red);
                    handle = Some(p);
                    parent = self.node(p).parent;
                    continue;
                }

                if self.color(far) == Color::Black {
                    let near = near.expect("`remove_fixup()` - near nephew must be red!");
                    self.set_color(near, Color::Black);
                    self.set_color(sibling, Color::Red);
                    self.rotate_right(sibling);
                    sibling = self.node(p).right.expect("`remove_fixup()` - a double-black node must have a sibling!");
                }

                let far = self.node(sibling).right.expect("`remove_fixup()` - far nephew must be red!");
                self.set_color(sibling, self.node(p).color);
                self.set_color(p, Color::Black);
                self.set_color(far, Color::Black);
                self.rotate_left(p);
            } else {
                let mut sibling = self.node(p).left.expect("`remove_fixup()` - a double-black node must have a sibling!");
                if self.node(sibling).is_red() {
                    self.set_color(sibling, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_right(p);
                    sibling = self.node(p).left.expect("`remove_fixup()` - a double-black node must have a sibling!");
                }

                let (near, far) = (self.node(sibling).right, self.node(sibling).left);
                if self.color(near) == Color::Black && self.color(far) == Color::Black {
                    self.set_color(sibling, Color::Red);
                    handle = Some(p);
                    parent = self.node(p).parent;
                    continue;
                }

                if self.color(far) == Color::Black {
                    let near = near.expect("`remove_fixup()` - near nephew must be red!");
                    self.set_color(near, Color::Black);
                    self.set_color(sibling, Color::Red);
                    self.rotate_left(sibling);
                    sibling = self.node(p).left.expect("`remove_fixup()` - a double-black node must have a sibling!");
                }

                let far = self.node(sibling).left.expect("`remove_fixup()` - far nephew must be red!");
                self.set_color(sibling, self.node(p).color);
                self.set_color(p, Color::Black);
                self.set_color(far, Color::Black);
                self.rotate_right(p);
            }
            handle = self.root;
            break;
        }

        if let Some(handle) = handle {
            self.set_color(handle, Color::Black);
        }
    }

    /// Hands a detached node's blocks back to the allocator.
    fn release(&self, node: Node) {
        let (key, value) = node.into_blocks();
        // SAFETY: every block in the tree was made by this allocator with these layouts.
        unsafe {
            key.release(self.nodes.allocator(), self.key_layout);
            value.release(self.nodes.allocator(), self.value_layout);
        }
    }

    /// Frees every entry, children before parents, keeping the slot table.
    pub(crate) fn clear(&mut self) {
        #[cfg(feature = "tracing")]
        let len = self.len();

        let mut stack: Stack<Handle> = Stack::new();
        stack.extend(self.root.take());
        while let Some(&handle) = stack.last() {
            let node = self.nodes.get_mut(handle);
            let child = match node.left.take() {
                Some(left) => Some(left),
                None => node.right.take(),
            };
            if let Some(child) = child {
                stack.push(child);
                continue;
            }
            stack.pop();
            let node = self.nodes.take(handle);
            self.release(node);
        }
        self.nodes.clear();

        #[cfg(feature = "tracing")]
        tracing::trace!(len, "cleared map");
    }
}

impl<C: Comparator, A: Allocator> RawRBTreeMap<C, A> {
    /// Finds the node whose key compares equal to `key`.
    pub(crate) fn search(&self, key: &[u8]) -> Option<Handle> {
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.node(handle);
            current = match self.cmp.compare(key, node.key()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(handle),
            };
        }
        None
    }

    /// Inserts a new entry. Fails with `KeyExists` and leaves the tree untouched if `key` is present.
    pub(crate) fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<Handle> {
        self.check_key(key)?;
        self.check_value(value)?;

        let mut parent = None;
        let mut side = Ordering::Equal;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.node(handle);
            side = self.cmp.compare(key, node.key());
            parent = Some(handle);
            current = match side {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Err(Error::KeyExists),
            };
        }

        let handle = self.link(key, value, parent, side).inspect_err(|_err| {
            #[cfg(feature = "tracing")]
            tracing::warn!(err = %_err, len = self.len(), "insert failed to allocate");
        })?;
        self.insert_fixup(handle);
        Ok(handle)
    }

    /// Copies the tree into a new one using `cmp` and `alloc`.
    pub(crate) fn try_clone_with(&self, cmp: C, alloc: A) -> Result<Self> {
        let mut clone = Self::with_capacity_in(self.key_size(), self.value_size(), self.len(), cmp, alloc)?;
        let mut current = self.first();
        while let Some(handle) = current {
            let node = self.node(handle);
            clone.insert(node.key(), node.value())?;
            current = self.successor(handle);
        }
        Ok(clone)
    }
}

impl<C, A: Allocator> Drop for RawRBTreeMap<C, A> {
    fn drop(&mut self) {
        self.clear();
    }
}
