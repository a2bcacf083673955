use super::block::Block;
use super::handle::Handle;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// A single entry: owned key and value blocks plus its tree links.
pub(crate) struct Node {
    key: Block,
    value: Block,
    pub(crate) parent: Option<Handle>,
    pub(crate) left: Option<Handle>,
    pub(crate) right: Option<Handle>,
    pub(crate) color: Color,
}

impl Node {
    /// New nodes enter the tree as red leaves.
    pub(crate) fn new(key: Block, value: Block, parent: Option<Handle>) -> Self {
        Self {
            key,
            value,
            parent,
            left: None,
            right: None,
            color: Color::Red,
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &[u8] {
        self.key.as_slice()
    }

    #[inline]
    pub(crate) fn value(&self) -> &[u8] {
        self.value.as_slice()
    }

    #[inline]
    pub(crate) fn value_mut(&mut self) -> &mut [u8] {
        self.value.as_mut_slice()
    }

    #[inline]
    pub(crate) fn is_red(&self) -> bool {
        self.color == Color::Red
    }

    /// Exchanges key and value blocks with `other`. Links and colors stay put.
    pub(crate) fn swap_payload(&mut self, other: &mut Node) {
        core::mem::swap(&mut self.key, &mut other.key);
        core::mem::swap(&mut self.value, &mut other.value);
    }

    pub(crate) fn into_blocks(self) -> (Block, Block) {
        (self.key, self.value)
    }
}
