//! UTXO Index
//!
//! This crate provides the canonical unspent-output index.
//!
//! # Key Rules
//!
//! 1. **Spending is monotonic**: rows are flagged spent, never deleted
//! 2. **Writes only inside an index transaction**: `create_tx` →
//!    `add_output`/`spend_output` → `commit_tx` or `rollback_tx`
//! 3. **Reads observe committed state**: an open transaction is invisible
//!    to scans (spends are the one exception: they see their own staged
//!    rows, so a block can spend an output it just created)

pub mod errors;
pub mod keys;
pub mod memory;
pub mod sled_index;
pub mod types;

pub use errors::{UtxoError, UtxoResult};
pub use memory::MemoryUtxoIndex;
pub use sled_index::SledUtxoIndex;
pub use types::{OutPoint, Utxo, UtxoIndex};
