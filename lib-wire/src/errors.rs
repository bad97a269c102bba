//! Wire Errors

use thiserror::Error;

/// Error raised by wire-level validation and assembly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("hash must be 32 bytes, got {0}")]
    BadHashLength(usize),

    #[error("address must be 20 bytes, got {0}")]
    BadAddressLength(usize),

    #[error("signature must be 65 bytes, got {0}")]
    BadSignatureLength(usize),

    #[error("data exceeds {max} bytes: {size}")]
    DataTooLarge { size: usize, max: usize },

    #[error("too many inputs: {count} > {max}")]
    TooManyInputs { count: usize, max: usize },

    #[error("too many outputs: {count} > {max}")]
    TooManyOutputs { count: usize, max: usize },

    #[error("unknown transaction type {0}")]
    UnknownTxType(u32),

    #[error("signing failed: {0}")]
    Signer(String),
}
