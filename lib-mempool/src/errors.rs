//! Pool Errors

use thiserror::Error;

use lib_types::TxHash;
use lib_wire::WireError;

/// Error during pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("transaction already known: {0}")]
    Duplicate(TxHash),

    #[error("transaction not in pool: {0}")]
    NotFound(TxHash),

    #[error("wire validation failed: {0}")]
    Wire(#[from] WireError),

    #[error("transaction rejected: {0}")]
    Invalid(String),
}

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;
