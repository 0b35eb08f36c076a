//! Core type aliases and constants shared by the store and the engine.

use serde::{Deserialize, Serialize};

/// 32-byte digest used for store roots, commit hashes, and transaction hashes.
pub type Hash = [u8; 32];

/// 20-byte account address derived from a public key.
pub type Address = [u8; 20];

/// Block height as delivered by consensus.
pub type Height = u64;

/// Store version produced by a commit. Version `n` holds the state after height `n`.
pub type Version = u64;

/// Maximum key length accepted by gas-metered store access.
pub const MAX_KEY_LEN: usize = 256;

/// Maximum value length accepted by gas-metered store access.
pub const MAX_VALUE_LEN: usize = 65_536; // 64 KiB

/// A zero-valued hash (32 zero bytes). Root of an empty tree.
pub const ZERO_HASH: Hash = [0u8; 32];

/// A zero-valued address.
pub const ZERO_ADDRESS: Address = [0u8; 20];

/// Identifies a committed snapshot of every sub-store.
///
/// Produced only by a multistore commit and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CommitId {
    pub version: Version,
    pub hash: Hash,
}

impl CommitId {
    pub fn new(version: Version, hash: Hash) -> Self {
        Self { version, hash }
    }

    /// True for the id of a store that has never been committed.
    pub fn is_zero(&self) -> bool {
        self.version == 0 && self.hash == ZERO_HASH
    }
}

impl core::fmt::Display for CommitId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", hash_to_hex(&self.hash), self.version)
    }
}

/// Convert a `Hash` to a `0x`-prefixed hex string for display purposes.
pub fn hash_to_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}
