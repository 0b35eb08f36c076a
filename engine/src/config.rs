//! Application configuration.

use serde::{Deserialize, Serialize};

use basalt_primitives::gas::{G_TX_SIZE_PER_BYTE, G_VERIFY_ED25519};
use basalt_primitives::KvGasConfig;
use basalt_store::PruningOptions;

use crate::error::EngineError;

/// Configuration for the block coordinator and the reference ante stage.
///
/// Every field has a default, so a JSON document only needs to name what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chain identifier, part of every sign doc.
    pub chain_id: String,

    /// Gas limit per block. `None` = unbounded. Consensus-parameter updates
    /// from the end-block hook override it from the next block on.
    pub max_block_gas: Option<u64>,

    /// History retention for the root multistore.
    pub pruning: PruningOptions,

    /// Gas prices for store access.
    pub kv_gas: KvGasConfig,

    /// Gas per byte of raw transaction.
    pub tx_size_cost_per_byte: u64,

    /// Gas per ed25519 signature verification.
    pub sig_verify_cost: u64,

    /// Maximum memo length in characters.
    pub max_memo_chars: usize,

    /// Minimum fee per unit of gas wanted, enforced in check mode only.
    pub min_gas_price: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain_id: "basalt".into(),
            max_block_gas: None,
            pruning: PruningOptions::default(),
            kv_gas: KvGasConfig::default(),
            tx_size_cost_per_byte: G_TX_SIZE_PER_BYTE,
            sig_verify_cost: G_VERIFY_ED25519,
            max_memo_chars: 256,
            min_gas_price: 0,
        }
    }
}

impl AppConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.chain_id.is_empty() {
            return Err(EngineError::Config("chain_id must be non-empty".into()));
        }
        if self.max_block_gas == Some(0) {
            return Err(EngineError::Config("max_block_gas must be > 0 when set".into()));
        }
        Ok(())
    }
}
