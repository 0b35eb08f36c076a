//! Copy-on-write cache layer.
//!
//! A `CacheStore` buffers writes over a parent store and makes them visible
//! to subsequent reads through the same cache. `write()` flushes the buffer
//! into the parent in one step; `discard()` (or dropping the cache) throws
//! it away. Caches nest: `cache_wrap()` layers a child over this cache, so
//! a child's flush lands in this cache, not in the committed state.
//!
//! The parent is held by value, which for nested caches is a `&mut`
//! borrow. The borrow checker therefore rules out writing to a parent while
//! a child derived from it is alive.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;

use crate::kv::{range_bounds, KvIter, KvPair, KvStore, KvStoreMut};

/// Buffered writes: key → Some(value) for sets, key → None for deletions.
pub type PendingWrites = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Write buffer overlaying a parent store.
#[derive(Debug, Clone)]
pub struct CacheStore<P> {
    parent: P,
    pending: PendingWrites,
}

impl<P: KvStore> CacheStore<P> {
    /// Create an empty cache over `parent`.
    pub fn new(parent: P) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }

    /// The store this cache reads through to.
    pub fn parent(&self) -> &P {
        &self.parent
    }

    /// Derive a child cache whose flush lands in this cache.
    pub fn cache_wrap(&mut self) -> CacheStore<&mut Self> {
        CacheStore::new(self)
    }

    /// Drop every buffered write.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    /// Buffered writes in key order.
    pub fn writes(&self) -> &PendingWrites {
        &self.pending
    }

    /// Consume the cache and return its buffered writes.
    pub fn into_writes(self) -> PendingWrites {
        self.pending
    }

    /// Number of keys touched (set or deleted).
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn merged(&self, start: Option<&[u8]>, end: Option<&[u8]>, ascending: bool) -> KvIter<'_> {
        let Some(bounds) = range_bounds(start, end) else {
            return Box::new(std::iter::empty());
        };
        let (parent, pending): (KvIter<'_>, PendingIter<'_>) = if ascending {
            (
                self.parent.iter(start, end),
                Box::new(self.pending.range::<[u8], _>(bounds)),
            )
        } else {
            (
                self.parent.reverse_iter(start, end),
                Box::new(self.pending.range::<[u8], _>(bounds).rev()),
            )
        };
        Box::new(MergeIter {
            parent: parent.peekable(),
            pending: pending.peekable(),
            ascending,
        })
    }
}

impl<P: KvStoreMut> CacheStore<P> {
    /// Flush buffered writes into the parent, in key order, and clear the
    /// buffer.
    pub fn write(&mut self) {
        for (key, value) in std::mem::take(&mut self.pending) {
            match value {
                Some(v) => self.parent.set(&key, &v),
                None => self.parent.delete(&key),
            }
        }
    }
}

impl<P: KvStore> KvStore for CacheStore<P> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.get(key) {
            Some(entry) => entry.clone(),
            None => self.parent.get(key),
        }
    }

    fn has(&self, key: &[u8]) -> bool {
        match self.pending.get(key) {
            Some(entry) => entry.is_some(),
            None => self.parent.has(key),
        }
    }

    fn iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        self.merged(start, end, true)
    }

    fn reverse_iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        self.merged(start, end, false)
    }
}

impl<P: KvStore> KvStoreMut for CacheStore<P> {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }
}

type PendingIter<'a> = Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Option<Vec<u8>>)> + 'a>;

/// Merges the parent's range with the buffered range. Buffered entries
/// shadow the parent; tombstones hide the key entirely.
struct MergeIter<'a> {
    parent: Peekable<KvIter<'a>>,
    pending: Peekable<PendingIter<'a>>,
    ascending: bool,
}

impl Iterator for MergeIter<'_> {
    type Item = KvPair;

    fn next(&mut self) -> Option<KvPair> {
        loop {
            let order = match (self.parent.peek(), self.pending.peek()) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((pk, _)), Some((ck, _))) => {
                    let ord = pk.as_slice().cmp(ck.as_slice());
                    if self.ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                }
            };
            match order {
                Ordering::Less => return self.parent.next(),
                Ordering::Equal => {
                    // shadowed
                    self.parent.next();
                }
                Ordering::Greater => {}
            }
            if let Some((key, Some(value))) = self.pending.next() {
                return Some((key.clone(), value.clone()));
            }
        }
    }
}
