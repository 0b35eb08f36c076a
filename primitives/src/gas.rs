//! Gas accounting.
//!
//! Gas is charged for every store access made through a transaction context,
//! for signature verification, and per byte of transaction size. A meter is
//! created per transaction (limit = gas wanted) and per block (limit = the
//! configured block gas, or unbounded).

use serde::{Deserialize, Serialize};

use crate::error::{ExecError, ExecResult};

// ── Gas cost constants ──

/// Base cost for a store read.
pub const G_STATE_GET: u64 = 200;

/// Base cost for a store existence check.
pub const G_STATE_HAS: u64 = 150;

/// Base cost for a store write.
pub const G_STATE_SET: u64 = 500;

/// Base cost for a store delete.
pub const G_STATE_DEL: u64 = 300;

/// Cost for each step of a store iterator.
pub const G_ITER_NEXT: u64 = 30;

/// Per-byte cost added to reads and writes.
pub const G_PER_BYTE: u64 = 3;

/// Cost for verifying one ed25519 signature.
pub const G_VERIFY_ED25519: u64 = 2000;

/// Per-byte cost of the raw transaction, charged by the ante stage.
pub const G_TX_SIZE_PER_BYTE: u64 = 10;

/// Gas prices for metered store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvGasConfig {
    pub has_cost: u64,
    pub delete_cost: u64,
    pub read_cost_flat: u64,
    pub read_cost_per_byte: u64,
    pub write_cost_flat: u64,
    pub write_cost_per_byte: u64,
    pub iter_next_cost_flat: u64,
}

impl Default for KvGasConfig {
    fn default() -> Self {
        Self {
            has_cost: G_STATE_HAS,
            delete_cost: G_STATE_DEL,
            read_cost_flat: G_STATE_GET,
            read_cost_per_byte: G_PER_BYTE,
            write_cost_flat: G_STATE_SET,
            write_cost_per_byte: G_PER_BYTE,
            iter_next_cost_flat: G_ITER_NEXT,
        }
    }
}

impl KvGasConfig {
    /// Cost of a read that touched `byte_count` bytes of key and value.
    pub fn read_cost(&self, byte_count: usize) -> u64 {
        per_byte(self.read_cost_flat, self.read_cost_per_byte, byte_count)
    }

    /// Cost of a write of `byte_count` bytes of key and value.
    pub fn write_cost(&self, byte_count: usize) -> u64 {
        per_byte(self.write_cost_flat, self.write_cost_per_byte, byte_count)
    }

    /// Cost of one iterator step yielding `byte_count` bytes.
    pub fn iter_cost(&self, byte_count: usize) -> u64 {
        per_byte(self.iter_next_cost_flat, self.read_cost_per_byte, byte_count)
    }
}

fn per_byte(base: u64, rate: u64, byte_count: usize) -> u64 {
    base.saturating_add((byte_count as u64).saturating_mul(rate))
}

/// Bounded gas counter.
///
/// Charges are checked before they are applied, so a failed charge leaves
/// `consumed` untouched. After the first failed charge the meter is halted:
/// every further charge fails, including zero-cost ones.
#[derive(Debug, Clone)]
pub struct GasMeter {
    limit: Option<u64>,
    consumed: u64,
    halted: bool,
}

impl GasMeter {
    /// Create a new gas meter with the given limit.
    pub fn new(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            consumed: 0,
            halted: false,
        }
    }

    /// Create a meter with no limit. Simulation and unbounded blocks use this.
    pub fn unlimited() -> Self {
        Self {
            limit: None,
            consumed: 0,
            halted: false,
        }
    }

    /// Consume gas. Returns `OutOfGas` if the limit would be exceeded.
    pub fn consume(&mut self, amount: u64) -> ExecResult<()> {
        let limit = self.limit.unwrap_or(u64::MAX);
        if self.halted {
            return Err(ExecError::OutOfGas {
                limit,
                used: self.consumed.saturating_add(amount),
            });
        }
        match self.consumed.checked_add(amount) {
            Some(v) if v <= limit => {
                self.consumed = v;
                Ok(())
            }
            _ => {
                self.halted = true;
                Err(ExecError::OutOfGas {
                    limit,
                    used: self.consumed.saturating_add(amount),
                })
            }
        }
    }

    /// Consume gas for a base cost plus a per-byte charge.
    pub fn consume_with_bytes(&mut self, base: u64, byte_count: usize) -> ExecResult<()> {
        self.consume(per_byte(base, G_PER_BYTE, byte_count))
    }

    /// Mark the meter as fully spent. Used on the block meter when a
    /// transaction overflows it.
    pub fn exhaust(&mut self) {
        if let Some(limit) = self.limit {
            self.consumed = limit;
        }
        self.halted = true;
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Remaining gas; `u64::MAX` minus consumption for an unbounded meter.
    pub fn remaining(&self) -> u64 {
        self.limit
            .unwrap_or(u64::MAX)
            .saturating_sub(self.consumed)
    }

    /// The limit, or `None` when unbounded.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// True once the limit is reached or a charge has failed.
    pub fn is_exhausted(&self) -> bool {
        self.halted || self.limit.is_some_and(|l| self.consumed >= l)
    }

    /// True if a charge has already failed on this meter.
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}
