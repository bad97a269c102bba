//! Transaction type tag
//!
//! The discriminants are wire-visible (the `type` field of the serialized
//! transaction) and must never be renumbered.

use serde::{Deserialize, Serialize};

/// Transaction types carried on the ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TxType {
    /// Standard value transfer between addresses
    Normal = 1,
    /// Initial allocation in block 0 (no inputs)
    Genesis = 2,
    /// Per-block fee collection to the black-hole address (no inputs)
    Fee = 3,
    /// Per-block reward distribution to validator slots (no inputs)
    Reward = 4,
    /// Validator slot deposit; outputs marked with the black-hole node
    /// address count against slot capacity
    Stake = 5,
    /// Withdrawal of a stake deposit, releasing the slots it occupied
    Unstake = 6,
    /// Synthesized consolidation of a fragmented address into one output
    Collapse = 7,
}

impl TxType {
    /// Wire representation
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Parse the wire representation
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(TxType::Normal),
            2 => Some(TxType::Genesis),
            3 => Some(TxType::Fee),
            4 => Some(TxType::Reward),
            5 => Some(TxType::Stake),
            6 => Some(TxType::Unstake),
            7 => Some(TxType::Collapse),
            _ => None,
        }
    }

    /// Types produced by the forger itself rather than submitted by users
    pub fn is_synthesized(self) -> bool {
        matches!(self, TxType::Reward | TxType::Fee | TxType::Collapse)
    }

    /// Types that carry no inputs on the wire
    pub fn has_inputs(self) -> bool {
        !matches!(self, TxType::Reward | TxType::Fee | TxType::Genesis)
    }

    /// Types whose `fee` field participates in fee collection
    pub fn pays_fee(self) -> bool {
        matches!(self, TxType::Normal | TxType::Stake | TxType::Unstake)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxType::Normal => "normal",
            TxType::Genesis => "genesis",
            TxType::Fee => "fee",
            TxType::Reward => "reward",
            TxType::Stake => "stake",
            TxType::Unstake => "unstake",
            TxType::Collapse => "collapse",
        }
    }
}
