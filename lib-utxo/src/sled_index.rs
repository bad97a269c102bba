//! Sled-based UTXO index
//!
//! Tree layout (names are protocol; changing them breaks migrations):
//!
//! - `utxos`      outpoint → row (the authoritative copy)
//! - `utxo_addr`  address + insertion seq → outpoint (per-address scans)
//! - `utxo_block` block number + outpoint → () (per-block scans)
//! - `utxo_stake` insertion seq + outpoint → () (stake-deposit scans)
//! - `utxo_meta`  counters
//!
//! Writes are buffered in per-tree batches between `create_tx` and
//! `commit_tx`; sled applies each batch atomically per tree.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use sled::{Batch, Db, Tree};
use tracing::debug;

use lib_types::{Address, Amount};

use crate::errors::{UtxoError, UtxoResult};
use crate::keys;
use crate::types::{OutPoint, Utxo, UtxoIndex};

const TREE_UTXOS: &str = "utxos";
const TREE_BY_ADDR: &str = "utxo_addr";
const TREE_BY_BLOCK: &str = "utxo_block";
const TREE_STAKE: &str = "utxo_stake";
const TREE_META: &str = "utxo_meta";

/// Sled-backed implementation of [`UtxoIndex`]
pub struct SledUtxoIndex {
    db: Db,

    utxos: Tree,
    by_addr: Tree,
    by_block: Tree,
    stake: Tree,
    meta: Tree,

    tx_active: AtomicBool,
    pending: Mutex<Option<PendingTx>>,
}

/// Buffered changes for atomic commit
struct PendingTx {
    utxos: Batch,
    by_addr: Batch,
    by_block: Batch,
    stake: Batch,
    /// Rows written by this transaction, readable by `spend_output`
    staged: HashMap<OutPoint, Utxo>,
    /// Outpoints already spent by this transaction
    spent: HashSet<OutPoint>,
    next_seq: u64,
}

impl PendingTx {
    fn new(next_seq: u64) -> Self {
        Self {
            utxos: Batch::default(),
            by_addr: Batch::default(),
            by_block: Batch::default(),
            stake: Batch::default(),
            staged: HashMap::new(),
            spent: HashSet::new(),
            next_seq,
        }
    }
}

impl std::fmt::Debug for SledUtxoIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledUtxoIndex")
            .field("tx_active", &self.tx_active.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SledUtxoIndex {
    /// Open or create an index at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> UtxoResult<Self> {
        let db = sled::open(path).map_err(|e| UtxoError::Database(e.to_string()))?;
        Self::from_db(db)
    }

    /// Open a throwaway index backed by a temporary sled database
    pub fn open_temporary() -> UtxoResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| UtxoError::Database(e.to_string()))?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> UtxoResult<Self> {
        let open = |name: &str| {
            db.open_tree(name)
                .map_err(|e| UtxoError::Database(e.to_string()))
        };

        Ok(Self {
            utxos: open(TREE_UTXOS)?,
            by_addr: open(TREE_BY_ADDR)?,
            by_block: open(TREE_BY_BLOCK)?,
            stake: open(TREE_STAKE)?,
            meta: open(TREE_META)?,
            db,
            tx_active: AtomicBool::new(false),
            pending: Mutex::new(None),
        })
    }

    fn require_transaction(&self) -> UtxoResult<()> {
        if !self.tx_active.load(Ordering::SeqCst) {
            return Err(UtxoError::NoActiveTransaction);
        }
        Ok(())
    }

    fn serialize(utxo: &Utxo) -> UtxoResult<Vec<u8>> {
        bincode::serialize(utxo).map_err(|e| UtxoError::Corrupted(e.to_string()))
    }

    fn deserialize(bytes: &[u8]) -> UtxoResult<Utxo> {
        bincode::deserialize(bytes).map_err(|e| UtxoError::Corrupted(e.to_string()))
    }

    fn get_committed(&self, outpoint: &OutPoint) -> UtxoResult<Option<Utxo>> {
        let key = keys::utxo_key(outpoint);
        match self.utxos.get(key) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(UtxoError::Database(e.to_string())),
        }
    }

    fn load_next_seq(&self) -> UtxoResult<u64> {
        match self.meta.get(keys::meta::NEXT_SEQ) {
            Ok(Some(bytes)) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| UtxoError::Corrupted("bad seq counter".into()))?;
                Ok(u64::from_be_bytes(arr))
            }
            Ok(None) => Ok(0),
            Err(e) => Err(UtxoError::Database(e.to_string())),
        }
    }

    /// All outputs committed by one block, in insertion order
    pub fn outputs_in_block(&self, block_num: u64) -> UtxoResult<Vec<Utxo>> {
        let mut rows = Vec::new();
        for entry in self.by_block.scan_prefix(keys::block_prefix(block_num)) {
            let (key, _) = entry.map_err(|e| UtxoError::Database(e.to_string()))?;
            let outpoint = keys::parse_utxo_key(&key[8..])
                .ok_or_else(|| UtxoError::Corrupted("bad block index key".into()))?;
            if let Some(row) = self.get_committed(&outpoint)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

impl UtxoIndex for SledUtxoIndex {
    fn find_all_utxo(&self, addr: &Address) -> UtxoResult<Vec<Utxo>> {
        let mut rows = Vec::new();
        for entry in self.by_addr.scan_prefix(keys::addr_prefix(addr)) {
            let (_, value) = entry.map_err(|e| UtxoError::Database(e.to_string()))?;
            let outpoint = keys::parse_utxo_key(&value)
                .ok_or_else(|| UtxoError::Corrupted("bad address index entry".into()))?;
            match self.get_committed(&outpoint)? {
                Some(row) if !row.spent => rows.push(row),
                Some(_) => {}
                None => {
                    return Err(UtxoError::Corrupted(format!(
                        "address index points at missing row {}",
                        outpoint
                    )))
                }
            }
        }
        Ok(rows)
    }

    fn find_stake_deposits(&self) -> UtxoResult<Vec<Utxo>> {
        let mut rows = Vec::new();
        for entry in self.stake.iter() {
            let (key, _) = entry.map_err(|e| UtxoError::Database(e.to_string()))?;
            let outpoint = keys::parse_utxo_key(&key[8..])
                .ok_or_else(|| UtxoError::Corrupted("bad stake index key".into()))?;
            match self.get_committed(&outpoint)? {
                Some(row) if !row.spent && row.is_stake_deposit() => rows.push(row),
                _ => {}
            }
        }
        Ok(rows)
    }

    fn get(&self, outpoint: &OutPoint) -> UtxoResult<Option<Utxo>> {
        self.get_committed(outpoint)
    }

    fn create_tx(&self) -> UtxoResult<()> {
        if self.tx_active.swap(true, Ordering::SeqCst) {
            return Err(UtxoError::TransactionAlreadyActive);
        }

        let next_seq = match self.load_next_seq() {
            Ok(seq) => seq,
            Err(e) => {
                self.tx_active.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let mut guard = self.pending.lock().unwrap();
        *guard = Some(PendingTx::new(next_seq));
        Ok(())
    }

    fn add_output(&self, utxo: &Utxo) -> UtxoResult<()> {
        self.require_transaction()?;

        let outpoint = utxo.outpoint();
        let mut guard = self.pending.lock().unwrap();
        let pending = guard.as_mut().ok_or(UtxoError::NoActiveTransaction)?;

        if pending.staged.contains_key(&outpoint) || self.get_committed(&outpoint)?.is_some() {
            return Err(UtxoError::DuplicateOutput(outpoint));
        }

        let value = Self::serialize(utxo)?;
        let seq = pending.next_seq;
        pending.next_seq += 1;

        pending
            .utxos
            .insert(keys::utxo_key(&outpoint).as_ref(), value);
        pending.by_addr.insert(
            keys::addr_key(&utxo.to, seq).as_ref(),
            keys::utxo_key(&outpoint).as_ref(),
        );
        pending
            .by_block
            .insert(keys::block_key(utxo.block_num, &outpoint).as_ref(), &b""[..]);
        if utxo.is_stake_deposit() {
            pending
                .stake
                .insert(keys::stake_key(seq, &outpoint).as_ref(), &b""[..]);
        }

        pending.staged.insert(outpoint, utxo.clone());
        Ok(())
    }

    fn spend_output(&self, outpoint: &OutPoint) -> UtxoResult<()> {
        self.require_transaction()?;

        let mut guard = self.pending.lock().unwrap();
        let pending = guard.as_mut().ok_or(UtxoError::NoActiveTransaction)?;

        if pending.spent.contains(outpoint) {
            return Err(UtxoError::AlreadySpent(*outpoint));
        }

        let mut row = match pending.staged.get(outpoint) {
            Some(row) => row.clone(),
            None => self
                .get_committed(outpoint)?
                .ok_or(UtxoError::NotFound(*outpoint))?,
        };

        if row.spent {
            return Err(UtxoError::AlreadySpent(*outpoint));
        }

        row.spent = true;
        let value = Self::serialize(&row)?;
        pending.utxos.insert(keys::utxo_key(outpoint).as_ref(), value);
        pending.staged.insert(*outpoint, row);
        pending.spent.insert(*outpoint);
        Ok(())
    }

    fn commit_tx(&self) -> UtxoResult<()> {
        self.require_transaction()?;

        let pending = {
            let mut guard = self.pending.lock().unwrap();
            guard.take().ok_or(UtxoError::NoActiveTransaction)?
        };
        let staged = pending.staged.len();
        let next_seq = pending.next_seq;

        let result = (|| {
            let db_err = |e: sled::Error| UtxoError::Database(e.to_string());
            self.utxos.apply_batch(pending.utxos).map_err(db_err)?;
            self.by_addr.apply_batch(pending.by_addr).map_err(db_err)?;
            self.by_block.apply_batch(pending.by_block).map_err(db_err)?;
            self.stake.apply_batch(pending.stake).map_err(db_err)?;
            self.meta
                .insert(keys::meta::NEXT_SEQ, &next_seq.to_be_bytes())
                .map_err(db_err)?;
            self.db.flush().map_err(db_err)?;
            Ok(())
        })();

        self.tx_active.store(false, Ordering::SeqCst);
        debug!(staged, "index transaction committed");
        result
    }

    fn rollback_tx(&self) -> UtxoResult<()> {
        self.require_transaction()?;

        let mut guard = self.pending.lock().unwrap();
        *guard = None;
        self.tx_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn unspent_total(&self) -> UtxoResult<Amount> {
        let mut total: Amount = 0;
        for entry in self.utxos.iter() {
            let (_, value) = entry.map_err(|e| UtxoError::Database(e.to_string()))?;
            let row = Self::deserialize(&value)?;
            if !row.spent {
                total = total.saturating_add(row.amount);
            }
        }
        Ok(total)
    }
}
