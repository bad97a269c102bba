//! Block store contract
//!
//! The forger talks to persistence exclusively through this trait.

use lib_types::BlockHash;
use lib_wire::Block;

use crate::errors::ChainResult;

pub trait BlockStore: Send + Sync {
    /// Number of persisted blocks; doubles as the next block number.
    fn block_count(&self) -> ChainResult<u64>;

    /// Hash of the chain head; zero when the chain is empty.
    fn parent_hash(&self) -> ChainResult<BlockHash>;

    /// Append a block. The block must extend the current head.
    fn save_block(&self, block: &Block) -> ChainResult<()>;

    /// Apply the block's UTXO side effects inside one index transaction.
    /// On failure the index transaction has been rolled back before this
    /// returns.
    fn process_block(&self, block: &Block) -> ChainResult<()>;

    /// Cross-check that the unspent total matches the recorded supply.
    fn check_balance(&self) -> ChainResult<()>;

    /// Read a block back by number.
    fn block_by_num(&self, num: u64) -> ChainResult<Option<Block>>;
}
