//! Forge Configuration
//!
//! Protocol constants and node-local options for the forger.

use serde::{Deserialize, Serialize};

use lib_types::Amount;

/// Minimal unspent-output count before an address is collapsed
pub const COLLAPSE_THRESHOLD: usize = 100;

/// Upper bound on inputs of a single collapse transaction
pub const INPUTS_PER_TX_LIMIT: usize = 2000;

/// Hard upper bound on transactions per block
pub const TX_BATCH_LIMIT: usize = 1000;

/// Configuration for the block forger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Hard upper bound on total serialized bytes of a block's batch
    pub block_size: usize,
    /// Gates per-forge timing output
    pub enable_metrics: bool,
    /// Reward pool distributed across validator slots each block
    pub reward_base: Amount,
    /// Validator slot capacity
    pub slots_limit: usize,
    /// Stake amount occupying one validator slot
    pub slot_unit: Amount,
    /// Minimal unspent-output count before an address is collapsed
    pub collapse_threshold: usize,
    /// Upper bound on inputs of a single collapse transaction
    pub inputs_per_tx_limit: usize,
    /// Hard upper bound on transactions per block
    pub batch_limit: usize,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            block_size: 4 * 1024 * 1024, // 4 MB
            enable_metrics: false,
            reward_base: 4_000_000,
            slots_limit: 64,
            slot_unit: 1_000_000,
            collapse_threshold: COLLAPSE_THRESHOLD,
            inputs_per_tx_limit: INPUTS_PER_TX_LIMIT,
            batch_limit: TX_BATCH_LIMIT,
        }
    }
}

impl ForgeConfig {
    /// Small protocol numbers for tests
    pub fn for_testing() -> Self {
        Self {
            block_size: 1024 * 1024,
            enable_metrics: false,
            reward_base: 100,
            slots_limit: 16,
            slot_unit: 100,
            collapse_threshold: COLLAPSE_THRESHOLD,
            inputs_per_tx_limit: INPUTS_PER_TX_LIMIT,
            batch_limit: TX_BATCH_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_carries_protocol_constants() {
        let cfg = ForgeConfig::default();
        assert_eq!(cfg.collapse_threshold, 100);
        assert_eq!(cfg.inputs_per_tx_limit, 2000);
        assert_eq!(cfg.batch_limit, 1000);
        assert!(cfg.slot_unit > 0);
    }
}
