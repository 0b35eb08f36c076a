//! In-memory committed store.
//!
//! `MemStore` keeps its data in an `Arc<BTreeMap>`. Taking a snapshot is an
//! `Arc` clone; the first write after a snapshot copies the map, so every
//! snapshot stays frozen at the moment it was taken. The root multistore
//! keeps one `StoreSnapshot` per retained version.

use std::collections::BTreeMap;
use std::sync::Arc;

use basalt_primitives::{Hash, MerkleTree};

use crate::kv::{map_range, KvIter, KvStore, KvStoreMut};

/// In-memory key-value store backed by `BTreeMap`.
///
/// BTreeMap gives the lexicographic iteration order the commitment and the
/// iterators rely on.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    data: Arc<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with data.
    pub fn with_data(data: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    /// Freeze the current contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            data: Arc::clone(&self.data),
        }
    }

    /// Apply a batch of buffered writes (`None` = delete).
    pub fn apply(&mut self, writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>) {
        if writes.is_empty() {
            return;
        }
        let data = Arc::make_mut(&mut self.data);
        for (key, value) in writes {
            match value {
                Some(v) => {
                    data.insert(key, v);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.data = Arc::default();
        }
    }

    /// Returns the number of entries in the store.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Merkle root over the current contents.
    pub fn root_hash(&self) -> Hash {
        MerkleTree::from_map(&self.data).root()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn has(&self, key: &[u8]) -> bool {
        self.data.contains_key(key)
    }

    fn iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        map_range(&self.data, start, end, true)
    }

    fn reverse_iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        map_range(&self.data, start, end, false)
    }
}

impl KvStoreMut for MemStore {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        Arc::make_mut(&mut self.data).insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        if self.data.contains_key(key) {
            Arc::make_mut(&mut self.data).remove(key);
        }
    }
}

/// Read-only view of a `MemStore` frozen at one point in time.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    data: Arc<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl StoreSnapshot {
    pub fn as_map(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if both snapshots share the same underlying map.
    pub fn ptr_eq(&self, other: &StoreSnapshot) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Merkle tree over the frozen contents.
    pub fn merkle_tree(&self) -> MerkleTree {
        MerkleTree::from_map(&self.data)
    }
}

impl KvStore for StoreSnapshot {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn has(&self, key: &[u8]) -> bool {
        self.data.contains_key(key)
    }

    fn iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        map_range(&self.data, start, end, true)
    }

    fn reverse_iter(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> KvIter<'_> {
        map_range(&self.data, start, end, false)
    }
}
