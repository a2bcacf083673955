//! Ordering of opaque key bytes.

use core::cmp::Ordering;

/// A total order over keys of the map's fixed key size.
///
/// Both slices passed to [`compare`](Comparator::compare) are exactly
/// `key_size` bytes long. [`Ordering::Equal`] means the keys are the same
/// key: inserting a second one fails with
/// [`Error::KeyExists`](crate::Error::KeyExists).
///
/// Any `Fn(&[u8], &[u8]) -> Ordering` is a comparator:
///
/// ```
/// use blob_tree::RBTreeMap;
///
/// // Order 4-byte little-endian integers numerically.
/// let by_value = |a: &[u8], b: &[u8]| {
///     let a = u32::from_le_bytes(a.try_into().unwrap());
///     let b = u32::from_le_bytes(b.try_into().unwrap());
///     a.cmp(&b)
/// };
/// let mut map = RBTreeMap::new(4, 1, by_value)?;
/// map.insert(&256u32.to_le_bytes(), b"b")?;
/// map.insert(&1u32.to_le_bytes(), b"a")?;
/// assert_eq!(map.values().collect::<Vec<_>>(), [b"a", b"b"]);
/// # Ok::<(), blob_tree::Error>(())
/// ```
pub trait Comparator {
    /// Compares two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

impl<F> Comparator for F
where
    F: Fn(&[u8], &[u8]) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self(a, b)
    }
}

/// Byte-wise lexicographic order, the same order as `memcmp`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lexicographic;

impl Comparator for Lexicographic {
    #[inline]
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
