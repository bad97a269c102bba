//! Pool implementation
//!
//! The forger consumes the pool through the [`Pool`] trait: a queue
//! snapshot, eviction of single transactions, registration of synthesized
//! collapse transactions, and batch finalization.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{debug, warn};

use lib_types::{TxHash, TxType};
use lib_wire::{tx_hash, validate_tx_wire, Transaction};

use crate::errors::{PoolError, PoolResult};

/// The forger-facing pool contract.
pub trait Pool: Send + Sync {
    /// Snapshot of the pending queue in FIFO order. Later pool mutations
    /// do not affect a snapshot already taken.
    fn queue(&self) -> Vec<Transaction>;

    /// Evict one pending transaction (e.g. a stake that lost admission).
    fn delete(&self, tx: &Transaction) -> PoolResult<()>;

    /// Register a synthesized collapse transaction so finalization can
    /// account for it.
    fn insert_collapse(&self, tx: Transaction) -> PoolResult<()>;

    /// Evict every listed transaction after a block settles (or a failing
    /// transaction after rejection).
    fn finalize(&self, txs: &[Transaction]);
}

/// FIFO transaction pool.
#[derive(Debug, Default)]
pub struct TxPool {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Pending user transactions, oldest first
    queue: Vec<Transaction>,
    /// Hashes of everything the pool has accepted and not yet finalized
    known: HashSet<TxHash>,
    /// Hashes registered via `insert_collapse`
    collapse: HashSet<TxHash>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a user transaction into the queue.
    ///
    /// Checks performed:
    /// 1. type is user-submittable (normal, stake, unstake)
    /// 2. wire limits, including the 65-byte signature requirement
    /// 3. hash integrity against the canonical encoding
    /// 4. value conservation: `Σ inputs = Σ outputs + fee`
    /// 5. duplicate-hash rejection
    pub fn insert(&self, tx: Transaction) -> PoolResult<()> {
        let kind = tx
            .kind()
            .ok_or_else(|| PoolError::Invalid(format!("unknown type {}", tx.tx_type)))?;
        if kind.is_synthesized() || kind == TxType::Genesis {
            return Err(PoolError::Invalid(format!(
                "type {} is not user-submittable",
                kind.as_str()
            )));
        }

        validate_tx_wire(&tx, true)?;

        let hash = tx.hash32();
        if tx_hash(&tx) != hash {
            return Err(PoolError::Invalid("hash mismatch".into()));
        }

        if tx.inputs.is_empty() {
            return Err(PoolError::Invalid("empty inputs".into()));
        }
        if tx.outputs.is_empty() {
            return Err(PoolError::Invalid("empty outputs".into()));
        }

        let spent = tx
            .output_total()
            .checked_add(tx.fee)
            .ok_or_else(|| PoolError::Invalid("amount overflow".into()))?;
        if tx.input_total() != spent {
            return Err(PoolError::Invalid(format!(
                "inputs {} != outputs {} + fee {}",
                tx.input_total(),
                tx.output_total(),
                tx.fee
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        if !inner.known.insert(hash) {
            return Err(PoolError::Duplicate(hash));
        }
        debug!(%hash, kind = kind.as_str(), "transaction queued");
        inner.queue.push(tx);
        Ok(())
    }

    /// Number of pending user transactions.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Pool for TxPool {
    fn queue(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().queue.clone()
    }

    fn delete(&self, tx: &Transaction) -> PoolResult<()> {
        let hash = tx.hash32();
        let mut inner = self.inner.lock().unwrap();
        let before = inner.queue.len();
        inner.queue.retain(|t| t.hash32() != hash);
        if inner.queue.len() == before {
            return Err(PoolError::NotFound(hash));
        }
        inner.known.remove(&hash);
        debug!(%hash, "transaction evicted");
        Ok(())
    }

    fn insert_collapse(&self, tx: Transaction) -> PoolResult<()> {
        if tx.kind() != Some(TxType::Collapse) {
            return Err(PoolError::Invalid("not a collapse transaction".into()));
        }
        validate_tx_wire(&tx, false)?;

        let hash = tx.hash32();
        let mut inner = self.inner.lock().unwrap();
        if !inner.known.insert(hash) {
            warn!(%hash, "collapse transaction already registered");
            return Err(PoolError::Duplicate(hash));
        }
        inner.collapse.insert(hash);
        debug!(%hash, inputs = tx.inputs.len(), "collapse transaction registered");
        Ok(())
    }

    fn finalize(&self, txs: &[Transaction]) {
        let mut inner = self.inner.lock().unwrap();
        for tx in txs {
            let hash = tx.hash32();
            inner.queue.retain(|t| t.hash32() != hash);
            inner.known.remove(&hash);
            inner.collapse.remove(&hash);
        }
        debug!(
            finalized = txs.len(),
            remaining = inner.queue.len(),
            "pool finalized"
        );
    }
}
