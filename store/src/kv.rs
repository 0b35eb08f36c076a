//! Key-value store abstraction shared by every layer of the multistore.
//!
//! `KvStore` is the read side: point reads and ordered range iteration.
//! `KvStoreMut` adds writes. Committed stores, cache layers, tracing and gas
//! wrappers all implement the same pair of traits, so a cache can be stacked
//! on any of them.
//!
//! Implementations must be deterministic: iteration is always in byte-wise
//! lexicographic key order, ascending or descending.

use std::collections::BTreeMap;
use std::ops::Bound;

/// An owned key/value pair yielded by iteration.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Ordered iterator over a key range.
pub type KvIter<'a> = Box<dyn Iterator<Item = KvPair> + 'a>;

/// Read access to a key-value store.
pub trait KvStore {
    /// Get the value for a key. Returns `None` if the key does not exist.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Check if a key exists.
    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Iterate `[start, end)` in ascending key order. `None` bounds are open.
    fn iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_>;

    /// Iterate `[start, end)` in descending key order.
    fn reverse_iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_>;
}

/// Write access to a key-value store.
pub trait KvStoreMut: KvStore {
    /// Set a key to a value, replacing any previous value.
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&mut self, key: &[u8]);
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> bool {
        (**self).has(key)
    }

    fn iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        (**self).iter(start, end)
    }

    fn reverse_iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        (**self).reverse_iter(start, end)
    }
}

impl<T: KvStore + ?Sized> KvStore for &mut T {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> bool {
        (**self).has(key)
    }

    fn iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        (**self).iter(start, end)
    }

    fn reverse_iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        (**self).reverse_iter(start, end)
    }
}

impl<T: KvStoreMut + ?Sized> KvStoreMut for &mut T {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) {
        (**self).delete(key)
    }
}

impl<T: KvStore + ?Sized> KvStore for Box<T> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> bool {
        (**self).has(key)
    }

    fn iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        (**self).iter(start, end)
    }

    fn reverse_iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        (**self).reverse_iter(start, end)
    }
}

impl<T: KvStoreMut + ?Sized> KvStoreMut for Box<T> {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) {
        (**self).delete(key)
    }
}

/// Range bounds for `BTreeMap::range`, or `None` when the range is empty.
///
/// `BTreeMap::range` panics on inverted bounds, so callers check this first.
pub(crate) fn range_bounds<'k>(
    start: Option<&'k [u8]>,
    end: Option<&'k [u8]>,
) -> Option<(Bound<&'k [u8]>, Bound<&'k [u8]>)> {
    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            return None;
        }
    }
    Some((
        start.map_or(Bound::Unbounded, Bound::Included),
        end.map_or(Bound::Unbounded, Bound::Excluded),
    ))
}

/// Iterate a committed map over `[start, end)`.
pub(crate) fn map_range<'a>(
    map: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    start: Option<&[u8]>,
    end: Option<&[u8]>,
    ascending: bool,
) -> KvIter<'a> {
    let Some(bounds) = range_bounds(start, end) else {
        return Box::new(std::iter::empty());
    };
    let range = map
        .range::<[u8], _>(bounds)
        .map(|(k, v)| (k.clone(), v.clone()));
    if ascending {
        Box::new(range)
    } else {
        Box::new(range.rev())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<Vec<u8>, Vec<u8>> {
        [(b"a", b"1"), (b"b", b"2"), (b"c", b"3"), (b"d", b"4")]
            .into_iter()
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect()
    }

    fn keys(iter: KvIter<'_>) -> Vec<Vec<u8>> {
        iter.map(|(k, _)| k).collect()
    }

    #[test]
    fn test_map_range_bounds() {
        let map = sample();
        assert_eq!(
            keys(map_range(&map, Some(b"b"), Some(b"d"), true)),
            vec![b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(keys(map_range(&map, None, None, true)).len(), 4);
        assert_eq!(
            keys(map_range(&map, Some(b"b"), None, false)),
            vec![b"d".to_vec(), b"c".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn test_inverted_or_empty_range_is_empty() {
        let map = sample();
        assert!(keys(map_range(&map, Some(b"d"), Some(b"a"), true)).is_empty());
        assert!(keys(map_range(&map, Some(b"b"), Some(b"b"), false)).is_empty());
    }
}
