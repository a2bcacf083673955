//! An ordered map over opaque, fixed-size byte keys and values.
//!
//! [`RBTreeMap`] is a red-black tree that stores copies of caller-provided byte blocks.
//! Keys and values have sizes fixed at construction, keys are ordered by a
//! [`Comparator`], and every node, key and value is allocated from an [`Allocator`]
//! chosen by the caller:
//!
//! - [`insert`](RBTreeMap::insert), [`get`](RBTreeMap::get) and [`remove`](RBTreeMap::remove)
//!   in O(log n), with the tree rebalanced after every insert and removal
//! - ordered iteration with [`iter`](RBTreeMap::iter) and with cursors that can move in
//!   both directions, update values and remove entries
//! - fallible allocation everywhere: running out of memory is an [`Error`], never an abort,
//!   and a failed call leaves the map as it was
//!
//! # Example
//!
//! ```
//! use blob_tree::{BoundedAllocator, Error, Lexicographic, RBTreeMap};
//!
//! // A 1 KiB budget for everything the map allocates.
//! let alloc = BoundedAllocator::new(1024);
//! let mut scores = RBTreeMap::new_in(5, 4, Lexicographic, &alloc)?;
//!
//! scores.insert(b"alice", &100u32.to_le_bytes())?;
//! scores.insert(b"bobby", &85u32.to_le_bytes())?;
//! scores.insert(b"carol", &92u32.to_le_bytes())?;
//!
//! assert_eq!(scores.get(b"bobby")?, 85u32.to_le_bytes());
//! assert_eq!(scores.insert(b"alice", &0u32.to_le_bytes()), Err(Error::KeyExists));
//!
//! let names: Vec<_> = scores.keys().collect();
//! assert_eq!(names, [b"alice", b"bobby", b"carol"]);
//!
//! // Fill the budget until the allocator says no.
//! let mut n = 0u32;
//! let err = loop {
//!     let mut key = *b"z0000";
//!     key[1..].copy_from_slice(&n.to_be_bytes());
//!     match scores.insert(&key, &n.to_le_bytes()) {
//!         Ok(()) => n += 1,
//!         Err(err) => break err,
//!     }
//! };
//! assert_eq!(err, Error::NoMemory);
//! assert_eq!(scores.len(), 3 + n as usize);
//! assert!(alloc.bytes_in_use() <= 1024);
//! # Ok::<(), Error>(())
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`
//! - **Allocator-aware** - Any [`Allocator`]; [`BoundedAllocator`] adds a byte budget and counters
//! - **`tracing`** - Optional feature that emits `tracing` events for construction,
//!   allocation failures and clears
//!
//! # Implementation
//!
//! Nodes live in a slot table and link to their parent and children by index. Free slots
//! are chained into a list, so removing an entry never allocates. Key and value blocks
//! are separate allocations owned by their node.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
// NOTE: Unsafe code is confined to the byte blocks handed out by the allocator.
// #![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod error;
mod raw;

pub mod allocator;
pub mod comparator;
pub mod rbtree_map;

pub use allocator::{BoundedAllocator, CanAllocate};
pub use allocator_api2::alloc::{AllocError, Allocator, Global};
pub use comparator::{Comparator, Lexicographic};
pub use error::{Error, Result};
pub use rbtree_map::RBTreeMap;
