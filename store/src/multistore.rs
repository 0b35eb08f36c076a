//! Versioned root multistore.
//!
//! The root holds every mounted sub-store. Merkle stores keep one frozen
//! snapshot per retained version and contribute a root hash to the app hash;
//! transient stores are cleared at each commit and contribute nothing.
//!
//! `commit` stages every snapshot and the new commit info before touching
//! any state, then swaps them in, so a reader never observes a partially
//! committed version.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use basalt_primitives::{CommitId, CommitmentProof, ExistenceProof, Hash, MerkleTree, Version};

use crate::cache::{CacheStore, PendingWrites};
use crate::cachemulti::CacheMultiStore;
use crate::error::StoreError;
use crate::key::{StoreKey, StoreKind};
use crate::kv::{KvStore, KvStoreMut};
use crate::mem_store::{MemStore, StoreSnapshot};
use crate::pruning::PruningOptions;
use crate::trace::{TraceContext, TraceSink, TraceStore, Tracer};

/// Access to sub-stores by capability.
///
/// Implemented by the root and by every cache layer; the transaction context
/// only sees this trait.
pub trait MultiStore {
    /// Read access to the sub-store behind `key`.
    fn get_store(&self, key: &StoreKey) -> Result<Box<dyn KvStore + '_>, StoreError>;

    /// Write access to the sub-store behind `key`.
    fn get_kv_store(&mut self, key: &StoreKey) -> Result<Box<dyn KvStoreMut + '_>, StoreError>;
}

/// Root hash of one Merkle sub-store at a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: String,
    pub root: Hash,
}

/// Per-version record of sub-store roots. Its hash is the app hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub version: Version,
    /// Sorted by name.
    pub store_infos: Vec<StoreInfo>,
}

impl CommitInfo {
    fn tree(&self) -> MerkleTree {
        MerkleTree::from_sorted(
            self.store_infos
                .iter()
                .map(|s| (s.name.as_bytes().to_vec(), s.root.to_vec())),
        )
    }

    /// Merkle root over `(name, root)` pairs ordered by name.
    pub fn hash(&self) -> Hash {
        self.tree().root()
    }

    pub fn commit_id(&self) -> CommitId {
        CommitId::new(self.version, self.hash())
    }

    /// Proof that the named store had its recorded root at this version.
    pub fn prove_store(&self, name: &str) -> Option<ExistenceProof> {
        match self.tree().prove(name.as_bytes()) {
            CommitmentProof::Exist(proof) => Some(proof),
            CommitmentProof::Absent(_) => None,
        }
    }
}

/// Two-level proof: key within a sub-store, then the sub-store root within
/// the app hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiStoreProof {
    pub store_proof: CommitmentProof,
    pub root_proof: ExistenceProof,
}

impl MultiStoreProof {
    /// Verify that in store `store_name` under `app_hash`, `key` maps to
    /// `value` (`None` = absent).
    pub fn verify(
        &self,
        app_hash: &Hash,
        store_name: &str,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> bool {
        let Some(store_root) = self.store_proof.compute_root() else {
            return false;
        };
        self.store_proof.verify(&store_root, key, value)
            && self.root_proof.key == store_name.as_bytes()
            && self.root_proof.value == store_root
            && self.root_proof.verify(app_hash)
    }
}

/// Result of a historical query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    /// The version actually read.
    pub height: Version,
    pub proof: Option<MultiStoreProof>,
}

#[derive(Debug)]
struct Mounted {
    kind: StoreKind,
    working: MemStore,
    history: BTreeMap<Version, StoreSnapshot>,
    /// Snapshot and root of the last commit, reused when nothing changed.
    last_root: Option<(StoreSnapshot, Hash)>,
}

impl Mounted {
    fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            working: MemStore::new(),
            history: BTreeMap::new(),
            last_root: None,
        }
    }
}

/// The committed, versioned multistore.
#[derive(Debug)]
pub struct RootMultiStore {
    stores: BTreeMap<StoreKey, Mounted>,
    last_commit: CommitId,
    commit_infos: BTreeMap<Version, CommitInfo>,
    pruning: PruningOptions,
    tracer: Option<Tracer>,
}

impl RootMultiStore {
    pub fn new(pruning: PruningOptions) -> Self {
        Self {
            stores: BTreeMap::new(),
            last_commit: CommitId::default(),
            commit_infos: BTreeMap::new(),
            pruning,
            tracer: None,
        }
    }

    /// Register a sub-store. Only allowed before the first commit.
    pub fn mount(&mut self, key: StoreKey, kind: StoreKind) -> Result<(), StoreError> {
        if self.last_commit.version > 0 {
            return Err(StoreError::MountAfterCommit {
                name: key.name().to_string(),
                version: self.last_commit.version,
            });
        }
        if self.stores.keys().any(|k| k == &key || k.name() == key.name()) {
            return Err(StoreError::DuplicateMount(key.name().to_string()));
        }
        debug!(store = key.name(), ?kind, "mounted store");
        self.stores.insert(key, Mounted::new(kind));
        Ok(())
    }

    pub fn last_commit_id(&self) -> CommitId {
        self.last_commit
    }

    pub fn pruning(&self) -> PruningOptions {
        self.pruning
    }

    /// Commit info for a retained version.
    pub fn commit_info(&self, version: Version) -> Option<&CommitInfo> {
        self.commit_infos.get(&version)
    }

    /// True if `version` is committed and not pruned.
    pub fn has_version(&self, version: Version) -> bool {
        self.commit_infos.contains_key(&version)
    }

    /// Attach a trace sink. Stores handed out afterwards report every
    /// operation to it.
    pub fn set_tracer(&mut self, sink: Arc<dyn TraceSink>) {
        self.tracer = Some(Tracer::new(sink));
    }

    /// Replace the tracing context. A no-op without a tracer.
    pub fn set_tracing_context(&self, context: TraceContext) {
        if let Some(tracer) = &self.tracer {
            tracer.set_context(context);
        }
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracer.is_some()
    }

    /// Derive a cache layer over the current working state.
    ///
    /// The layer reads from snapshots taken now; later writes to the root
    /// are not visible through it.
    pub fn cache_multi_store(&self) -> CacheMultiStore<StoreSnapshot> {
        let stores = self
            .stores
            .iter()
            .map(|(key, m)| (key.clone(), CacheStore::new(m.working.snapshot())))
            .collect();
        CacheMultiStore::new(stores, self.tracer.clone())
    }

    /// Apply the buffered writes of a cache layer derived from this root.
    pub fn write_cache(&mut self, cache: CacheMultiStore<StoreSnapshot>) -> Result<(), StoreError> {
        let writes = cache.into_writes();
        for (key, _) in &writes {
            if !self.stores.contains_key(key) {
                return Err(StoreError::UnknownStore(key.name().to_string()));
            }
        }
        for (key, batch) in writes {
            self.apply(&key, batch);
        }
        Ok(())
    }

    fn apply(&mut self, key: &StoreKey, batch: PendingWrites) {
        if let Some(m) = self.stores.get_mut(key) {
            m.working.apply(batch);
        }
    }

    /// Persist the working state as a new version and return its id.
    ///
    /// The version always advances; the hash is unchanged when no Merkle
    /// store changed.
    pub fn commit(&mut self) -> CommitId {
        let version = self.last_commit.version + 1;

        let mut staged = Vec::with_capacity(self.stores.len());
        let mut store_infos = Vec::new();
        for (key, m) in &self.stores {
            if m.kind == StoreKind::Transient {
                continue;
            }
            let snapshot = m.working.snapshot();
            let root = match &m.last_root {
                Some((prev, root)) if prev.ptr_eq(&snapshot) => *root,
                _ => snapshot.merkle_tree().root(),
            };
            store_infos.push(StoreInfo {
                name: key.name().to_string(),
                root,
            });
            staged.push((key.clone(), snapshot, root));
        }
        store_infos.sort_by(|a, b| a.name.cmp(&b.name));
        let commit_info = CommitInfo {
            version,
            store_infos,
        };
        let commit_id = commit_info.commit_id();

        for (key, snapshot, root) in staged {
            if let Some(m) = self.stores.get_mut(&key) {
                m.history.insert(version, snapshot.clone());
                m.last_root = Some((snapshot, root));
            }
        }
        for m in self.stores.values_mut() {
            if m.kind == StoreKind::Transient {
                m.working.clear();
            }
        }
        self.commit_infos.insert(version, commit_info);
        self.last_commit = commit_id;

        if let Some(old) = self.pruning.version_to_prune(version) {
            self.prune(old);
        }
        info!(version, hash = %commit_id, "committed multistore");
        commit_id
    }

    fn prune(&mut self, version: Version) {
        for m in self.stores.values_mut() {
            m.history.remove(&version);
        }
        if self.commit_infos.remove(&version).is_some() {
            debug!(version, "pruned version");
        }
    }

    /// Read `data` from store `key` at `height` (0 = latest committed),
    /// optionally with a proof against that version's app hash.
    pub fn query(
        &self,
        key: &StoreKey,
        data: &[u8],
        height: Version,
        prove: bool,
    ) -> Result<QueryResponse, StoreError> {
        let m = self
            .stores
            .get(key)
            .ok_or_else(|| StoreError::UnknownStore(key.name().to_string()))?;
        if m.kind == StoreKind::Transient {
            return Err(StoreError::NotQueryable(key.name().to_string()));
        }
        let latest = self.last_commit.version;
        let height = if height == 0 { latest } else { height };
        if height == 0 || height > latest {
            return Err(StoreError::VersionNotFound {
                requested: height,
                latest,
            });
        }
        let snapshot = m
            .history
            .get(&height)
            .ok_or(StoreError::VersionPruned(height))?;

        let value = snapshot.get(data);
        let proof = if prove {
            let info = self
                .commit_infos
                .get(&height)
                .ok_or(StoreError::VersionPruned(height))?;
            let root_proof = info
                .prove_store(key.name())
                .ok_or_else(|| StoreError::UnknownStore(key.name().to_string()))?;
            Some(MultiStoreProof {
                store_proof: snapshot.merkle_tree().prove(data),
                root_proof,
            })
        } else {
            None
        };

        Ok(QueryResponse {
            key: data.to_vec(),
            value,
            height,
            proof,
        })
    }
}

impl MultiStore for RootMultiStore {
    fn get_store(&self, key: &StoreKey) -> Result<Box<dyn KvStore + '_>, StoreError> {
        let m = self
            .stores
            .get(key)
            .ok_or_else(|| StoreError::UnknownStore(key.name().to_string()))?;
        let boxed: Box<dyn KvStore + '_> = match &self.tracer {
            Some(tracer) => Box::new(TraceStore::new(&m.working, key.name(), tracer.clone())),
            None => Box::new(&m.working),
        };
        Ok(boxed)
    }

    fn get_kv_store(&mut self, key: &StoreKey) -> Result<Box<dyn KvStoreMut + '_>, StoreError> {
        let m = self
            .stores
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownStore(key.name().to_string()))?;
        let boxed: Box<dyn KvStoreMut + '_> = match &self.tracer {
            Some(tracer) => Box::new(TraceStore::new(&mut m.working, key.name(), tracer.clone())),
            None => Box::new(&mut m.working),
        };
        Ok(boxed)
    }
}
