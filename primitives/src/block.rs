//! Block-level types delivered by the consensus driver.
//!
//! The core never initiates block boundaries; these values arrive with
//! `begin_block` and are carried in every transaction context.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Hash, Height, ZERO_ADDRESS, ZERO_HASH};

/// Block header as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain identifier, part of every sign doc.
    pub chain_id: String,
    pub height: Height,
    /// Logical time from the consensus header, unix seconds.
    pub time: u64,
    /// App hash produced by the previous commit.
    pub app_hash: Hash,
    pub proposer_address: Address,
}

impl BlockHeader {
    /// Header used by `init_chain` before the first block.
    pub fn genesis(chain_id: impl Into<String>, time: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            height: 0,
            time,
            app_hash: ZERO_HASH,
            proposer_address: ZERO_ADDRESS,
        }
    }
}

/// A validator with its voting power.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub power: i64,
}

/// Whether a validator signed the previous block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub validator: Validator,
    pub signed_last_block: bool,
}

/// Votes for the previous block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LastCommitInfo {
    pub round: u32,
    pub votes: Vec<VoteInfo>,
}

/// Evidence that a validator misbehaved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misbehavior {
    pub validator: Validator,
    pub height: Height,
    pub time: u64,
}

/// Validator power change reported by the end-block hook. Power 0 removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: [u8; 32],
    pub power: i64,
}
