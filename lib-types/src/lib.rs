//! Ledger primitives.
//! Stable, fixed-size, behavior-free.

pub mod primitives;
pub mod tx_type;

pub use primitives::{Address, Amount, BlockHash, BlockHeight, TxHash};
pub use tx_type::TxType;
