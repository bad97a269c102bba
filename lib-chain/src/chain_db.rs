//! Sled-based chain store
//!
//! Tree layout (names are protocol):
//!
//! - `blocks`     block number (8 BE) → wire-encoded block
//! - `chain_meta` head number, minted supply
//!
//! Blocks rest on disk in their wire encoding, so a stored block is
//! byte-identical to what peers would receive.

use std::path::Path;
use std::sync::Arc;

use prost::Message;
use sled::{Db, Tree};
use tracing::{debug, info, warn};

use lib_types::{Address, Amount, BlockHash, TxType};
use lib_utxo::{Utxo, UtxoIndex};
use lib_wire::{Block, BlockBuilder, Transaction, TxBuilder, TxOutput};

use crate::errors::{ChainError, ChainResult};
use crate::store::BlockStore;

const TREE_BLOCKS: &str = "blocks";
const TREE_META: &str = "chain_meta";

const META_HEAD: &[u8] = b"head";
const META_SUPPLY: &[u8] = b"supply";

/// Sled-backed implementation of [`BlockStore`]
pub struct ChainDb {
    db: Db,
    blocks: Tree,
    meta: Tree,
    utxo: Arc<dyn UtxoIndex>,
}

impl std::fmt::Debug for ChainDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainDb").finish_non_exhaustive()
    }
}

impl ChainDb {
    /// Open or create a chain store at the given path.
    pub fn open<P: AsRef<Path>>(path: P, utxo: Arc<dyn UtxoIndex>) -> ChainResult<Self> {
        let db = sled::open(path).map_err(|e| ChainError::Database(e.to_string()))?;
        Self::from_db(db, utxo)
    }

    /// Open a throwaway chain store backed by a temporary sled database.
    pub fn open_temporary(utxo: Arc<dyn UtxoIndex>) -> ChainResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| ChainError::Database(e.to_string()))?;
        Self::from_db(db, utxo)
    }

    fn from_db(db: Db, utxo: Arc<dyn UtxoIndex>) -> ChainResult<Self> {
        let blocks = db
            .open_tree(TREE_BLOCKS)
            .map_err(|e| ChainError::Database(e.to_string()))?;
        let meta = db
            .open_tree(TREE_META)
            .map_err(|e| ChainError::Database(e.to_string()))?;
        Ok(Self { db, blocks, meta, utxo })
    }

    fn head_num(&self) -> ChainResult<Option<u64>> {
        match self.meta.get(META_HEAD) {
            Ok(Some(bytes)) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| ChainError::Corrupted("bad head counter".into()))?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ChainError::Database(e.to_string())),
        }
    }

    fn supply(&self) -> ChainResult<Amount> {
        match self.meta.get(META_SUPPLY) {
            Ok(Some(bytes)) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| ChainError::Corrupted("bad supply counter".into()))?;
                Ok(u64::from_be_bytes(arr))
            }
            Ok(None) => Ok(0),
            Err(e) => Err(ChainError::Database(e.to_string())),
        }
    }

    fn set_supply(&self, supply: Amount) -> ChainResult<()> {
        self.meta
            .insert(META_SUPPLY, &supply.to_be_bytes())
            .map_err(|e| ChainError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write and process block 0 when the chain is empty. Idempotent:
    /// a chain that already has a genesis block is left untouched.
    pub fn ensure_genesis(&self, allocations: &[(Address, Amount)]) -> ChainResult<()> {
        if self.head_num()?.is_some() {
            debug!("genesis already present");
            return Ok(());
        }

        let outputs = allocations
            .iter()
            .map(|(addr, amount)| TxOutput::new(*addr, *amount, None))
            .collect();

        let genesis_tx = TxBuilder::new(TxType::Genesis, 0).outputs(outputs).build();
        let block = BlockBuilder::new(0, BlockHash::zero())
            .timestamp(genesis_tx.timestamp)
            .transactions(vec![genesis_tx])
            .build(None)
            .map_err(|e| ChainError::Codec(e.to_string()))?;

        self.save_block(&block)?;
        self.process_block(&block)?;
        info!(accounts = allocations.len(), "genesis block written");
        Ok(())
    }

    /// The block's net minted value: Σ outputs − Σ inputs across all
    /// transactions. Conservative transactions contribute −fee, the fee
    /// transaction re-mints the collected fees, rewards and genesis mint.
    fn minted_value(block: &Block) -> i128 {
        block.transactions.iter().fold(0i128, |acc, tx| {
            let spent = match tx.kind() {
                Some(kind) if kind.has_inputs() => tx.input_total() as i128,
                _ => 0,
            };
            acc + tx.output_total() as i128 - spent
        })
    }

    fn stage_transaction(&self, block: &Block, tx: &Transaction) -> ChainResult<()> {
        let kind = tx
            .kind()
            .ok_or_else(|| ChainError::Corrupted(format!("unknown tx type {}", tx.tx_type)))?;

        if kind.has_inputs() {
            for input in &tx.inputs {
                let outpoint = lib_utxo::OutPoint::new(input.hash32(), input.index);
                self.utxo.spend_output(&outpoint)?;
            }
        }

        let from = tx.sender().unwrap_or(Address::BLACK_HOLE);
        for (index, out) in tx.outputs.iter().enumerate() {
            let to = out
                .address20()
                .ok_or_else(|| ChainError::Corrupted("bad output address".into()))?;
            self.utxo.add_output(&Utxo {
                hash: tx.hash32(),
                index: index as u32,
                tx_type: kind,
                block_num: block.num,
                from,
                to,
                node: out.node20(),
                amount: out.amount,
                spent: false,
                timestamp: tx.timestamp,
            })?;
        }
        Ok(())
    }
}

impl BlockStore for ChainDb {
    fn block_count(&self) -> ChainResult<u64> {
        Ok(match self.head_num()? {
            Some(head) => head + 1,
            None => 0,
        })
    }

    fn parent_hash(&self) -> ChainResult<BlockHash> {
        match self.head_num()? {
            Some(head) => {
                let block = self
                    .block_by_num(head)?
                    .ok_or_else(|| ChainError::Corrupted(format!("missing head block {head}")))?;
                Ok(block.hash32())
            }
            None => Ok(BlockHash::zero()),
        }
    }

    fn save_block(&self, block: &Block) -> ChainResult<()> {
        let expected = self.block_count()?;
        if block.num != expected {
            return Err(ChainError::WrongBlockNumber {
                expected,
                actual: block.num,
            });
        }

        self.blocks
            .insert(block.num.to_be_bytes(), block.encode_to_vec())
            .map_err(|e| ChainError::Database(e.to_string()))?;
        self.meta
            .insert(META_HEAD, &block.num.to_be_bytes())
            .map_err(|e| ChainError::Database(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| ChainError::Database(e.to_string()))?;

        debug!(num = block.num, txs = block.transactions.len(), "block saved");
        Ok(())
    }

    fn process_block(&self, block: &Block) -> ChainResult<()> {
        self.utxo.create_tx()?;

        for tx in &block.transactions {
            if let Err(e) = self.stage_transaction(block, tx) {
                warn!(num = block.num, %e, "block processing failed, rolling back");
                if let Err(rb) = self.utxo.rollback_tx() {
                    warn!(%rb, "index rollback failed");
                }
                return Err(e);
            }
        }

        self.utxo.commit_tx()?;

        let supply = self.supply()? as i128 + Self::minted_value(block);
        let supply: Amount = supply
            .try_into()
            .map_err(|_| ChainError::Corrupted("supply underflow".into()))?;
        self.set_supply(supply)?;

        debug!(num = block.num, supply, "block processed");
        Ok(())
    }

    fn check_balance(&self) -> ChainResult<()> {
        let expected = self.supply()?;
        let actual = self.utxo.unspent_total()?;
        if expected != actual {
            return Err(ChainError::BalanceInconsistent { expected, actual });
        }
        Ok(())
    }

    fn block_by_num(&self, num: u64) -> ChainResult<Option<Block>> {
        match self.blocks.get(num.to_be_bytes()) {
            Ok(Some(bytes)) => {
                let block =
                    Block::decode(bytes.as_ref()).map_err(|e| ChainError::Codec(e.to_string()))?;
                Ok(Some(block))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ChainError::Database(e.to_string())),
        }
    }
}
