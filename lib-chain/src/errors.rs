//! Chain Errors

use thiserror::Error;

use lib_types::Amount;
use lib_utxo::UtxoError;

/// Error during block persistence or processing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("database error: {0}")]
    Database(String),

    #[error("corrupted chain data: {0}")]
    Corrupted(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("block {actual} does not extend the chain at {expected}")]
    WrongBlockNumber { expected: u64, actual: u64 },

    #[error("balance inconsistency: supply {expected}, unspent total {actual}")]
    BalanceInconsistent { expected: Amount, actual: Amount },

    #[error(transparent)]
    Index(#[from] UtxoError),
}

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;
