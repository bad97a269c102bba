//! UTXO Types
//!
//! The index row, its identity, and the store contract.

use serde::{Deserialize, Serialize};

use lib_types::{Address, Amount, BlockHeight, TxHash, TxType};
use lib_wire::TxInput;

use crate::errors::UtxoResult;

/// Reference to a specific output in a transaction
///
/// This is the canonical way to identify a UTXO. Never use the tx hash alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction hash containing the output
    pub tx: TxHash,
    /// Index of the output in the transaction
    pub index: u32,
}

impl OutPoint {
    pub const fn new(tx: TxHash, index: u32) -> Self {
        Self { tx, index }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx, self.index)
    }
}

/// One row of the unspent-output index.
///
/// Mirrors the persistent schema: `(tx_type, blockId, hash, tx_index,
/// address_from, address_to, address_node, amount, spent, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Hash of the producing transaction
    pub hash: TxHash,
    /// Output index within the producing transaction
    pub index: u32,
    /// Type of the producing transaction
    pub tx_type: TxType,
    /// Block that committed this output
    pub block_num: BlockHeight,
    /// Sender of the producing transaction (black-hole for system mints)
    pub from: Address,
    /// Owner of the output
    pub to: Address,
    /// Validator marker; `Some` only for stake outputs
    pub node: Option<Address>,
    pub amount: Amount,
    /// Monotonic: once set, never cleared
    pub spent: bool,
    /// Timestamp of the producing transaction
    pub timestamp: u64,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.hash, self.index)
    }

    /// Whether this row occupies validator slots
    pub fn is_stake_deposit(&self) -> bool {
        self.tx_type == TxType::Stake && self.node.is_some()
    }

    /// Render as a wire input spending this output
    pub fn to_input(&self) -> TxInput {
        TxInput::new(self.hash, self.index, self.to, self.amount)
    }
}

/// Store contract for the unspent-output index.
///
/// Implementations must provide two-phase transaction control: writes are
/// staged between `create_tx` and `commit_tx`, and dropped wholesale by
/// `rollback_tx`.
pub trait UtxoIndex: Send + Sync {
    /// All unspent outputs owned by `addr`, in insertion order.
    fn find_all_utxo(&self, addr: &Address) -> UtxoResult<Vec<Utxo>>;

    /// All unspent stake deposits, in insertion order.
    fn find_stake_deposits(&self) -> UtxoResult<Vec<Utxo>>;

    /// Point lookup against committed state.
    fn get(&self, outpoint: &OutPoint) -> UtxoResult<Option<Utxo>>;

    /// Open the index transaction. Fails if one is already active.
    fn create_tx(&self) -> UtxoResult<()>;

    /// Stage a new output. Requires an active transaction.
    fn add_output(&self, utxo: &Utxo) -> UtxoResult<()>;

    /// Stage a spend marker. Requires an active transaction. Sees rows
    /// staged by the same transaction.
    fn spend_output(&self, outpoint: &OutPoint) -> UtxoResult<()>;

    /// Apply all staged writes atomically.
    fn commit_tx(&self) -> UtxoResult<()>;

    /// Drop all staged writes.
    fn rollback_tx(&self) -> UtxoResult<()>;

    /// Sum of all unspent amounts (the monetary-base cross-check input).
    fn unspent_total(&self) -> UtxoResult<Amount>;
}
