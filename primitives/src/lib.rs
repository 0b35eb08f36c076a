//! `basalt-primitives`: foundational types for the Basalt state machine.
//!
//! This crate provides the hash and commit identifiers, result codes, the
//! transaction error type, gas accounting, cryptographic helpers, the Merkle
//! tree with existence/absence proofs, and the deterministic record codec
//! shared by the store and the execution engine.

pub mod types;
pub mod error;
pub mod gas;
pub mod block;
pub mod crypto;
pub mod merkle;
pub mod codec;

// Re-export commonly used types at the crate root for convenience.
pub use types::{Address, CommitId, Hash, Height, Version, MAX_KEY_LEN, MAX_VALUE_LEN, ZERO_HASH};
pub use error::{ErrorCode, ExecError, ExecResult};
pub use gas::{GasMeter, KvGasConfig};
pub use block::{BlockHeader, LastCommitInfo, Misbehavior, Validator, ValidatorUpdate, VoteInfo};
pub use merkle::{AbsenceProof, CommitmentProof, ExistenceProof, MerkleTree};
