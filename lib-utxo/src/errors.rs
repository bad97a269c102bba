//! UTXO Errors

use thiserror::Error;

use crate::types::OutPoint;

/// Error during index operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UtxoError {
    #[error("output not found: {0}")]
    NotFound(OutPoint),

    #[error("output already spent: {0}")]
    AlreadySpent(OutPoint),

    #[error("duplicate output: {0}")]
    DuplicateOutput(OutPoint),

    #[error("an index transaction is already active")]
    TransactionAlreadyActive,

    #[error("no active index transaction")]
    NoActiveTransaction,

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupted index data: {0}")]
    Corrupted(String),
}

/// Result type for index operations
pub type UtxoResult<T> = Result<T, UtxoError>;
