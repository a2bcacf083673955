//! Error type shared by every fallible map operation.

use allocator_api2::alloc::AllocError;
use thiserror::Error;

/// Result type alias for map operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by [`RBTreeMap`](crate::RBTreeMap) and its cursors.
///
/// Every failure leaves the map exactly as it was before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The allocator refused a node, key or value allocation.
    #[error("out of memory")]
    NoMemory,

    /// A constructor argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A key buffer does not match the map's fixed key size.
    #[error("key is {got} bytes, expected {expected}")]
    KeySize { expected: usize, got: usize },

    /// A value buffer does not match the map's fixed value size.
    #[error("value is {got} bytes, expected {expected}")]
    ValueSize { expected: usize, got: usize },

    /// An entry with an equal key is already present.
    #[error("key already exists")]
    KeyExists,

    /// No entry compares equal to the key.
    #[error("key not found")]
    KeyNotFound,

    /// The cursor is at the ghost position and has no current entry.
    #[error("cursor does not point at an entry")]
    InvalidCursor,

    /// The node arena ran out of handles.
    #[error("node capacity exceeded")]
    Overflow,
}

impl From<AllocError> for Error {
    fn from(_: AllocError) -> Self {
        Error::NoMemory
    }
}
