//! Shared helpers for store integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use basalt_store::{KvStore, MemStore, PruningOptions, RootMultiStore, StoreKey, StoreKind};

/// A write applied in tests and mirrored into a plain map model.
#[derive(Debug, Clone)]
pub enum Op {
    Set(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Apply `ops` to a model map.
pub fn apply_model(model: &mut BTreeMap<Vec<u8>, Vec<u8>>, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Set(k, v) => {
                model.insert(k.clone(), v.clone());
            }
            Op::Delete(k) => {
                model.remove(k);
            }
        }
    }
}

/// Store pre-populated from a map.
pub fn store_from(map: &BTreeMap<Vec<u8>, Vec<u8>>) -> MemStore {
    MemStore::with_data(map.clone())
}

/// Every entry of a store, ascending.
pub fn dump<S: KvStore>(store: &S) -> Vec<(Vec<u8>, Vec<u8>)> {
    store.iter(None, None).collect()
}

/// Root with Merkle stores `bank` and `acc` and a transient store `tmp`.
pub fn standard_root(pruning: PruningOptions) -> (RootMultiStore, StoreKey, StoreKey, StoreKey) {
    let bank = StoreKey::new("bank");
    let acc = StoreKey::new("acc");
    let tmp = StoreKey::new("tmp");
    let mut root = RootMultiStore::new(pruning);
    root.mount(bank.clone(), StoreKind::Merkle).unwrap();
    root.mount(acc.clone(), StoreKind::Merkle).unwrap();
    root.mount(tmp.clone(), StoreKind::Transient).unwrap();
    (root, bank, acc, tmp)
}
