//! `basalt-store`: versioned multi-store with copy-on-write cache layers.
//!
//! This crate provides:
//!
//! - `KvStore` / `KvStoreMut`: the store traits every layer implements
//! - `MemStore`: in-memory committed store with cheap snapshots
//! - `CacheStore`: nested write buffer with merged range iteration
//! - `RootMultiStore`: mounted sub-stores, commit, pruning, proofs, queries
//! - `CacheMultiStore`: a cache layer across every mounted sub-store
//! - `StoreKey`: unforgeable capability token for one sub-store
//! - `GasKvStore`: gas-metered store access for transaction code
//! - `TraceStore` / `TraceSink`: per-operation tracing

pub mod error;
pub mod kv;
pub mod mem_store;
pub mod cache;
pub mod key;
pub mod pruning;
pub mod trace;
pub mod gaskv;
pub mod multistore;
pub mod cachemulti;

// Re-export commonly used types at the crate root.
pub use error::StoreError;
pub use kv::{KvIter, KvPair, KvStore, KvStoreMut};
pub use mem_store::{MemStore, StoreSnapshot};
pub use cache::{CacheStore, PendingWrites};
pub use key::{StoreKey, StoreKind};
pub use pruning::PruningOptions;
pub use trace::{
    BufferSink, TraceContext, TraceOperation, TraceRecord, TraceSink, TraceStore, Tracer,
    WriterSink,
};
pub use gaskv::{GasIter, GasKvStore};
pub use multistore::{
    CommitInfo, MultiStore, MultiStoreProof, QueryResponse, RootMultiStore, StoreInfo,
};
pub use cachemulti::CacheMultiStore;

/// The cache layer derived from the root, as used for per-block state.
pub type BranchStore = CacheMultiStore<StoreSnapshot>;
