//! Forge Errors
//!
//! The forger distinguishes soft conditions, handled inline with a log
//! line, from fatal ones that abort the cycle. Soft conditions never
//! appear here: `NoStakers`, `ZeroFee` and slot-admission rejections are
//! matched where they arise. Everything in this enum aborts.

use thiserror::Error;

use lib_chain::ChainError;
use lib_mempool::PoolError;
use lib_types::TxHash;
use lib_utxo::UtxoError;
use lib_wire::WireError;

use crate::registry::RegistryError;

/// Fatal error during a forge or finalize cycle
#[derive(Error, Debug)]
pub enum ForgeError {
    /// The validator rejected the candidate; the failing transaction has
    /// been handed back to the pool.
    #[error("block validation failed: {reason}")]
    ValidationFailed {
        failed: Option<TxHash>,
        reason: String,
    },

    #[error("block persist failed: {0}")]
    Persist(#[source] ChainError),

    #[error("post-block processing failed: {0}")]
    PostProcess(#[source] ChainError),

    #[error("balance inconsistency after commit: {0}")]
    Balance(#[source] ChainError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Index(#[from] UtxoError),

    #[error(transparent)]
    Chain(ChainError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl From<ChainError> for ForgeError {
    fn from(err: ChainError) -> Self {
        ForgeError::Chain(err)
    }
}

/// Result type for forge operations
pub type ForgeResult<T> = Result<T, ForgeError>;
