//! Merkle tree over sorted key-value pairs, with existence and absence proofs.
//!
//! Leaves are ordered by key. Level by level, adjacent nodes are hashed
//! pairwise; an odd trailing node is promoted unchanged. The empty tree has
//! root `ZERO_HASH`, a single leaf is its own root.
//!
//! The same construction is used twice: once per sub-store over its entries,
//! and once over `(store name, store root)` pairs to produce the commit hash.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::hash_blake3;
use crate::types::{Hash, ZERO_HASH};

/// Domain separator for leaf nodes (prevents second-preimage attacks).
const LEAF_PREFIX: u8 = 0x00;
/// Domain separator for internal nodes.
const INTERNAL_PREFIX: u8 = 0x01;

/// Hash a leaf node: H(LEAF_PREFIX || key_len_le32 || key || value)
pub fn leaf_hash(key: &[u8], value: &[u8]) -> Hash {
    let key_len = (key.len() as u32).to_le_bytes();
    let mut data = Vec::with_capacity(1 + 4 + key.len() + value.len());
    data.push(LEAF_PREFIX);
    data.extend_from_slice(&key_len);
    data.extend_from_slice(key);
    data.extend_from_slice(value);
    hash_blake3(&data)
}

/// Hash an internal node: H(INTERNAL_PREFIX || left || right)
fn inner_hash(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 1 + 32 + 32];
    data[0] = INTERNAL_PREFIX;
    data[1..33].copy_from_slice(left);
    data[33..65].copy_from_slice(right);
    hash_blake3(&data)
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => inner_hash(left, right),
            [odd] => *odd,
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Immutable Merkle tree built from key-ordered entries.
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    leaves: Vec<Hash>,
}

impl MerkleTree {
    /// Build from a map; `BTreeMap` iteration gives the required key order.
    pub fn from_map(map: &BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self::from_sorted(map.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Build from entries already sorted by key with no duplicates.
    pub fn from_sorted<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = entries.into_iter().collect();
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        let leaves = entries.iter().map(|(k, v)| leaf_hash(k, v)).collect();
        Self { entries, leaves }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute the root. Insertion order never matters, only the key set.
    pub fn root(&self) -> Hash {
        if self.leaves.is_empty() {
            return ZERO_HASH;
        }
        let mut level = self.leaves.clone();
        while level.len() > 1 {
            level = next_level(&level);
        }
        level[0]
    }

    /// Prove that `key` is present (with its value) or absent.
    pub fn prove(&self, key: &[u8]) -> CommitmentProof {
        match self.entries.binary_search_by(|(k, _)| k.as_slice().cmp(key)) {
            Ok(idx) => CommitmentProof::Exist(self.prove_index(idx)),
            Err(insert_at) => {
                let left = insert_at.checked_sub(1).map(|i| self.prove_index(i));
                let right = (insert_at < self.entries.len()).then(|| self.prove_index(insert_at));
                CommitmentProof::Absent(AbsenceProof {
                    key: key.to_vec(),
                    total: self.entries.len() as u64,
                    left,
                    right,
                })
            }
        }
    }

    fn prove_index(&self, index: usize) -> ExistenceProof {
        let mut aunts = Vec::new();
        let mut level = self.leaves.clone();
        let mut idx = index;
        while level.len() > 1 {
            if idx % 2 == 1 {
                aunts.push(level[idx - 1]);
            } else if idx + 1 < level.len() {
                aunts.push(level[idx + 1]);
            }
            level = next_level(&level);
            idx /= 2;
        }
        let (key, value) = self.entries[index].clone();
        ExistenceProof {
            key,
            value,
            index: index as u64,
            total: self.entries.len() as u64,
            aunts,
        }
    }
}

/// Proof that `key` maps to `value` at position `index` of `total` leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceProof {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub index: u64,
    pub total: u64,
    pub aunts: Vec<Hash>,
}

impl ExistenceProof {
    /// Recompute the root implied by this proof. `None` if the path shape
    /// does not match `index` and `total`.
    pub fn compute_root(&self) -> Option<Hash> {
        if self.index >= self.total {
            return None;
        }
        let mut current = leaf_hash(&self.key, &self.value);
        let mut idx = self.index;
        let mut len = self.total;
        let mut aunts = self.aunts.iter();
        while len > 1 {
            if idx % 2 == 1 {
                current = inner_hash(aunts.next()?, &current);
            } else if idx + 1 < len {
                current = inner_hash(&current, aunts.next()?);
            }
            idx /= 2;
            len = len.div_ceil(2);
        }
        if aunts.next().is_some() {
            return None;
        }
        Some(current)
    }

    pub fn verify(&self, root: &Hash) -> bool {
        self.compute_root().as_ref() == Some(root)
    }
}

/// Proof that `key` is absent: the adjacent leaves bracketing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceProof {
    pub key: Vec<u8>,
    pub total: u64,
    pub left: Option<ExistenceProof>,
    pub right: Option<ExistenceProof>,
}

impl AbsenceProof {
    pub fn verify(&self, root: &Hash) -> bool {
        let neighbour_ok = |p: &ExistenceProof| p.total == self.total && p.verify(root);
        match (&self.left, &self.right) {
            (None, None) => self.total == 0 && *root == ZERO_HASH,
            (Some(l), None) => {
                neighbour_ok(l) && l.key < self.key && l.index + 1 == self.total
            }
            (None, Some(r)) => neighbour_ok(r) && r.key > self.key && r.index == 0,
            (Some(l), Some(r)) => {
                neighbour_ok(l)
                    && neighbour_ok(r)
                    && l.key < self.key
                    && self.key < r.key
                    && l.index + 1 == r.index
            }
        }
    }
}

/// Existence or absence proof for a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentProof {
    Exist(ExistenceProof),
    Absent(AbsenceProof),
}

impl CommitmentProof {
    /// Verify against `root` that `key` maps to `value` (`None` = absent).
    pub fn verify(&self, root: &Hash, key: &[u8], value: Option<&[u8]>) -> bool {
        match (self, value) {
            (Self::Exist(p), Some(v)) => p.key == key && p.value == v && p.verify(root),
            (Self::Absent(p), None) => p.key == key && p.verify(root),
            _ => false,
        }
    }

    /// Root implied by the proof, when it can be derived.
    pub fn compute_root(&self) -> Option<Hash> {
        match self {
            Self::Exist(p) => p.compute_root(),
            Self::Absent(p) => p
                .left
                .as_ref()
                .or(p.right.as_ref())
                .map_or(Some(ZERO_HASH), |n| n.compute_root()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(pairs: &[(&str, &str)]) -> MerkleTree {
        let map: BTreeMap<Vec<u8>, Vec<u8>> = pairs
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        MerkleTree::from_map(&map)
    }

    #[test]
    fn test_empty_tree_root() {
        assert_eq!(MerkleTree::default().root(), ZERO_HASH);
    }

    #[test]
    fn test_single_entry_root_is_leaf() {
        let tree = tree_of(&[("key", "value")]);
        assert_eq!(tree.root(), leaf_hash(b"key", b"value"));
    }

    #[test]
    fn test_insertion_order_independence() {
        let mut m1 = BTreeMap::new();
        m1.insert(b"apple".to_vec(), b"1".to_vec());
        m1.insert(b"banana".to_vec(), b"2".to_vec());
        m1.insert(b"cherry".to_vec(), b"3".to_vec());

        let mut m2 = BTreeMap::new();
        m2.insert(b"cherry".to_vec(), b"3".to_vec());
        m2.insert(b"apple".to_vec(), b"1".to_vec());
        m2.insert(b"banana".to_vec(), b"2".to_vec());

        assert_eq!(MerkleTree::from_map(&m1).root(), MerkleTree::from_map(&m2).root());
    }

    #[test]
    fn test_different_values_different_roots() {
        assert_ne!(
            tree_of(&[("key", "value1")]).root(),
            tree_of(&[("key", "value2")]).root()
        );
    }

    #[test]
    fn test_existence_proofs_all_positions() {
        // 5 leaves exercises the odd-promotion path at two levels
        let tree = tree_of(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")]);
        let root = tree.root();
        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")] {
            let proof = tree.prove(k.as_bytes());
            assert!(proof.verify(&root, k.as_bytes(), Some(v.as_bytes())), "key {k}");
            assert!(!proof.verify(&root, k.as_bytes(), Some(b"wrong")));
            assert!(!proof.verify(&root, k.as_bytes(), None));
        }
    }

    #[test]
    fn test_absence_proof_middle_and_edges() {
        let tree = tree_of(&[("b", "1"), ("d", "2"), ("f", "3")]);
        let root = tree.root();
        for missing in ["a", "c", "e", "g"] {
            let proof = tree.prove(missing.as_bytes());
            assert!(matches!(proof, CommitmentProof::Absent(_)));
            assert!(proof.verify(&root, missing.as_bytes(), None), "key {missing}");
            assert!(!proof.verify(&root, missing.as_bytes(), Some(b"1")));
        }
    }

    #[test]
    fn test_absence_proof_empty_tree() {
        let tree = MerkleTree::default();
        let proof = tree.prove(b"anything");
        assert!(proof.verify(&ZERO_HASH, b"anything", None));
        assert!(!proof.verify(&[1u8; 32], b"anything", None));
    }

    #[test]
    fn test_absence_proof_rejects_non_adjacent_neighbours() {
        let tree = tree_of(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let root = tree.root();
        let CommitmentProof::Exist(left) = tree.prove(b"a") else {
            panic!("expected existence proof");
        };
        let CommitmentProof::Exist(right) = tree.prove(b"c") else {
            panic!("expected existence proof");
        };
        // "b" exists, so skipping over it must not prove absence
        let forged = AbsenceProof {
            key: b"b".to_vec(),
            total: 3,
            left: Some(left),
            right: Some(right),
        };
        assert!(!forged.verify(&root));
    }

    #[test]
    fn test_proof_against_wrong_root_fails() {
        let tree = tree_of(&[("alice", "100"), ("bob", "200")]);
        let other = tree_of(&[("alice", "100"), ("bob", "201")]);
        let proof = tree.prove(b"alice");
        assert!(proof.verify(&tree.root(), b"alice", Some(b"100")));
        assert!(!proof.verify(&other.root(), b"alice", Some(b"100")));
    }

    #[test]
    fn test_tampered_index_fails() {
        let tree = tree_of(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
        let CommitmentProof::Exist(mut proof) = tree.prove(b"b") else {
            panic!("expected existence proof");
        };
        proof.index = 0;
        assert!(!proof.verify(&tree.root()));
    }

    #[test]
    fn test_large_tree_proofs() {
        let map: BTreeMap<Vec<u8>, Vec<u8>> = (0..100u32)
            .map(|i| (format!("key_{i:05}").into_bytes(), format!("val_{i}").into_bytes()))
            .collect();
        let tree = MerkleTree::from_map(&map);
        let root = tree.root();
        for (k, v) in map.iter().step_by(7) {
            assert!(tree.prove(k).verify(&root, k, Some(v)));
        }
        assert!(tree.prove(b"key_00050x").verify(&root, b"key_00050x", None));
    }

    #[test]
    fn test_leaf_hash_domain_separation() {
        let leaf = leaf_hash(b"key", b"value");
        assert_ne!(leaf, inner_hash(&leaf, &leaf));
    }
}
