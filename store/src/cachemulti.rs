//! Cache layer over a whole multistore.
//!
//! A `CacheMultiStore` holds one `CacheStore` per mounted sub-store. The
//! block pipeline derives one from the root for each state (check, deliver)
//! and nests further layers per transaction phase with `cache_wrap()`.

use std::collections::BTreeMap;

use crate::cache::{CacheStore, PendingWrites};
use crate::error::StoreError;
use crate::key::StoreKey;
use crate::kv::{KvStore, KvStoreMut};
use crate::multistore::MultiStore;
use crate::trace::{TraceContext, TraceStore, Tracer};

pub struct CacheMultiStore<P> {
    stores: BTreeMap<StoreKey, CacheStore<P>>,
    tracer: Option<Tracer>,
}

impl<P: KvStore> CacheMultiStore<P> {
    pub(crate) fn new(stores: BTreeMap<StoreKey, CacheStore<P>>, tracer: Option<Tracer>) -> Self {
        Self { stores, tracer }
    }

    /// Derive a child layer. Writing the child flushes into this layer.
    pub fn cache_wrap(&mut self) -> CacheMultiStore<&mut CacheStore<P>> {
        let stores = self
            .stores
            .iter_mut()
            .map(|(key, store)| (key.clone(), CacheStore::new(store)))
            .collect();
        CacheMultiStore::new(stores, self.tracer.clone())
    }

    /// Drop every buffered write in every sub-store.
    pub fn discard(&mut self) {
        for store in self.stores.values_mut() {
            store.discard();
        }
    }

    /// Tag records from this layer, and layers wrapped from it afterwards,
    /// with `context` instead of the root's context. A no-op without a
    /// tracer.
    pub fn set_tracing_context(&mut self, context: TraceContext) {
        if let Some(tracer) = &mut self.tracer {
            *tracer = tracer.detached(context);
        }
    }

    /// True if any sub-store has buffered writes.
    pub fn is_dirty(&self) -> bool {
        self.stores.values().any(|s| !s.is_empty())
    }

    /// Consume the layer, returning the buffered writes of every sub-store.
    pub fn into_writes(self) -> Vec<(StoreKey, PendingWrites)> {
        self.stores
            .into_iter()
            .map(|(key, store)| (key, store.into_writes()))
            .collect()
    }
}

impl<P: KvStoreMut> CacheMultiStore<P> {
    /// Flush every sub-store's buffer into its parent.
    pub fn write(&mut self) {
        for store in self.stores.values_mut() {
            store.write();
        }
    }
}

impl<P: KvStore> MultiStore for CacheMultiStore<P> {
    fn get_store(&self, key: &StoreKey) -> Result<Box<dyn KvStore + '_>, StoreError> {
        let store = self
            .stores
            .get(key)
            .ok_or_else(|| StoreError::UnknownStore(key.name().to_string()))?;
        let boxed: Box<dyn KvStore + '_> = match &self.tracer {
            Some(tracer) => Box::new(TraceStore::new(store, key.name(), tracer.clone())),
            None => Box::new(store),
        };
        Ok(boxed)
    }

    fn get_kv_store(&mut self, key: &StoreKey) -> Result<Box<dyn KvStoreMut + '_>, StoreError> {
        let store = self
            .stores
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownStore(key.name().to_string()))?;
        let boxed: Box<dyn KvStoreMut + '_> = match &self.tracer {
            Some(tracer) => Box::new(TraceStore::new(store, key.name(), tracer.clone())),
            None => Box::new(store),
        };
        Ok(boxed)
    }
}
