//! Capability tokens for sub-stores.
//!
//! A `StoreKey` is the only way to reach a mounted sub-store. Two keys are
//! equal only if one was cloned from the other; creating a new key with the
//! same name yields a different capability. Keys cannot be built from an
//! identifier and the multistore never lists them, so a module can only
//! reach the stores whose keys it was handed at wiring time.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct KeyInner {
    id: u64,
    name: String,
}

/// Unforgeable handle to one sub-store.
#[derive(Clone)]
pub struct StoreKey(Arc<KeyInner>);

impl StoreKey {
    /// Create a fresh capability. `name` is used for commitment ordering,
    /// queries, and diagnostics.
    pub fn new(name: impl Into<String>) -> Self {
        let id = NEXT_KEY_ID.fetch_add(1, AtomicOrdering::Relaxed);
        Self(Arc::new(KeyInner {
            id,
            name: name.into(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl PartialEq for StoreKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for StoreKey {}

impl PartialOrd for StoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for StoreKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({})", self.0.name)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// How a mounted sub-store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Versioned, committed into the app hash, queryable.
    Merkle,
    /// Cleared at every commit; excluded from the app hash.
    Transient,
}
