//! Wire Format
//!
//! Protocol-buffer messages for blocks and transactions, preserved
//! bit-exact against the existing schema (field numbers and scalar widths
//! must match deployed consumers), plus the canonical hashing rules, the
//! transaction/block builders and the proposer signing seam.

pub mod builder;
pub mod errors;
pub mod hashing;
pub mod limits;
pub mod sign;
pub mod types;

pub use builder::{unix_now, BlockBuilder, TxBuilder};
pub use errors::WireError;
pub use hashing::{block_hash, keccak256, tx_hash, tx_root};
pub use limits::validate_tx_wire;
pub use sign::{recover_address, BlockSigner, ProposerKey};
pub use types::{Block, Sign, Transaction, TxInput, TxOutput};
