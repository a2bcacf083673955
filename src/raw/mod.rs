mod arena;
mod block;
mod handle;
mod node;
mod raw_rbtree_map;

pub(crate) use block::block_layout;
pub(crate) use handle::Handle;
pub(crate) use raw_rbtree_map::RawRBTreeMap;
