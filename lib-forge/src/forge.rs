//! Block Forger
//!
//! The orchestrator. `forge_block` drains a snapshot of the pool into a
//! candidate block under the size and count budgets, weaving in the
//! synthesized reward, collapse and fee transactions; `finalize_block`
//! validates, persists and applies the block atomically.
//!
//! Exactly one forge/finalize cycle runs at a time. The per-cycle scratch
//! set for the collapse planner is created here and dropped at the end of
//! the cycle; the forger itself holds no mutable state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use lib_chain::{BlockStore, ChainError};
use lib_mempool::Pool;
use lib_types::{Address, TxType};
use lib_utxo::UtxoIndex;
use lib_wire::{Block, BlockBuilder, BlockSigner, Transaction};

use crate::collapse::plan_collapse;
use crate::config::ForgeConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::registry::{RegistryError, StakeRegistry};
use crate::synth::{create_fee_tx, create_reward_tx, SynthError};
use crate::validate::BlockValidator;

/// The block forger.
pub struct Forger {
    chain: Arc<dyn BlockStore>,
    pool: Arc<dyn Pool>,
    utxo: Arc<dyn UtxoIndex>,
    registry: Arc<StakeRegistry>,
    validator: Arc<dyn BlockValidator>,
    signer: Arc<dyn BlockSigner>,
    cfg: ForgeConfig,
}

impl Forger {
    pub fn new(
        chain: Arc<dyn BlockStore>,
        pool: Arc<dyn Pool>,
        utxo: Arc<dyn UtxoIndex>,
        registry: Arc<StakeRegistry>,
        validator: Arc<dyn BlockValidator>,
        signer: Arc<dyn BlockSigner>,
        cfg: ForgeConfig,
    ) -> Self {
        Self {
            chain,
            pool,
            utxo,
            registry,
            validator,
            signer,
            cfg,
        }
    }

    /// Assemble a candidate block from the pool queue.
    ///
    /// Final transaction order: `[reward?, user.., collapse.., fee?]`.
    pub fn forge_block(&self) -> ForgeResult<Block> {
        let started = Instant::now();
        let num = self.chain.block_count()?;
        let queue = self.pool.queue();

        let mut skip: HashSet<Address> = HashSet::new();
        let mut batch: Vec<Transaction> = Vec::with_capacity(queue.len() + 2);
        let mut collapse_batch: Vec<Transaction> = Vec::new();
        let mut total_size: usize = 0;

        // Reward first. An empty registry is routine, not an error.
        match create_reward_tx(self.registry.as_ref(), num, self.cfg.reward_base) {
            Ok(reward) => {
                total_size += reward.size_bytes();
                debug!(hash = %reward.hash32(), num, "reward transaction added");
                let planned =
                    plan_collapse(&reward, num, &mut skip, self.utxo.as_ref(), &self.cfg)?;
                batch.push(reward);
                if let Some(collapse) = planned {
                    self.register_collapse(collapse, &mut collapse_batch, &mut total_size);
                }
            }
            Err(err) => warn!(%err, "reward transaction skipped"),
        }

        // One batch slot stays reserved for the eventual fee transaction.
        let count_cap = self
            .cfg
            .batch_limit
            .saturating_sub(batch.len() + collapse_batch.len() + 1)
            .min(queue.len());
        let mut admitted: usize = 0;

        for tx in &queue {
            if admitted >= count_cap {
                break;
            }
            if batch.len() + collapse_batch.len() + 1 >= self.cfg.batch_limit {
                break;
            }

            let size = tx.size_bytes();
            total_size += size;

            // Too big for the remaining budget; a smaller candidate later
            // in the queue may still fit.
            if total_size > self.cfg.block_size {
                total_size -= size;
                continue;
            }

            let hash = tx.hash32();

            if tx.kind() == Some(TxType::Stake) {
                let amount = tx.staked_amount();
                if let Err(err) = self.registry.reserve_slots(amount) {
                    match err {
                        RegistryError::SlotsFull | RegistryError::InvalidStakeAmount(_) => {
                            total_size -= size;
                            self.pool.delete(tx)?;
                            warn!(%hash, %err, "skip stake transaction");
                            continue;
                        }
                        fatal => return Err(fatal.into()),
                    }
                }
                debug!(%hash, num, "stake transaction admitted");
            }

            batch.push(tx.clone());
            admitted += 1;
            debug!(%hash, num, "transaction added to block");

            let planned = plan_collapse(tx, num, &mut skip, self.utxo.as_ref(), &self.cfg)?;
            if let Some(collapse) = planned {
                self.register_collapse(collapse, &mut collapse_batch, &mut total_size);
            }

            // Budget filled exactly; nothing else can fit.
            if total_size == self.cfg.block_size {
                break;
            }
        }

        // Collapse transactions always follow the user transactions.
        batch.append(&mut collapse_batch);

        if !batch.is_empty() {
            match create_fee_tx(&batch, num) {
                Ok(fee_tx) => {
                    debug!(hash = %fee_tx.hash32(), num, "fee transaction added");
                    batch.push(fee_tx);
                }
                Err(SynthError::ZeroFee) => debug!("block has no transactions with fee"),
                Err(err) => debug!(%err, "fee transaction skipped"),
            }
        }

        let parent = self.chain.parent_hash()?;
        let block = BlockBuilder::new(num, parent)
            .transactions(batch)
            .build(Some(self.signer.as_ref()))?;

        info!(
            num,
            txs = block.transactions.len(),
            pool = queue.len(),
            size_kb = total_size / 1024,
            "block forged"
        );
        if self.cfg.enable_metrics {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "forge timing");
        }

        Ok(block)
    }

    fn register_collapse(
        &self,
        collapse: Transaction,
        collapse_batch: &mut Vec<Transaction>,
        total_size: &mut usize,
    ) {
        match self.pool.insert_collapse(collapse.clone()) {
            Ok(()) => {
                *total_size += collapse.size_bytes();
                debug!(
                    hash = %collapse.hash32(),
                    inputs = collapse.inputs.len(),
                    "collapse transaction added"
                );
                collapse_batch.push(collapse);
            }
            Err(err) => error!(%err, "can't register collapse transaction"),
        }
    }

    /// Validate the candidate, persist it, and apply its side effects.
    ///
    /// Reservations settle with the block's fate: slots promoted by
    /// `update_stake_slots` survive, the reservation records themselves
    /// are flushed on success and failure alike. No compensating call is
    /// left to the caller.
    pub fn finalize_block(&self, block: &Block) -> ForgeResult<()> {
        let started = Instant::now();
        let result = self.apply_block(block);
        self.registry.flush_reserved();

        match &result {
            Ok(()) => {
                info!(num = block.num, txs = block.transactions.len(), "block finalized");
                if self.cfg.enable_metrics {
                    debug!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "finalize timing"
                    );
                }
            }
            Err(err) => warn!(num = block.num, %err, "block rejected"),
        }
        result
    }

    fn apply_block(&self, block: &Block) -> ForgeResult<()> {
        if let Err(err) = self.validator.validate_block(block) {
            if let Some(failed) = err.failed_tx.clone() {
                self.pool.finalize(std::slice::from_ref(&failed));
            }
            return Err(ForgeError::ValidationFailed {
                failed: err.failed_tx.map(|tx| tx.hash32()),
                reason: err.reason,
            });
        }

        self.chain.save_block(block).map_err(ForgeError::Persist)?;
        self.chain
            .process_block(block)
            .map_err(ForgeError::PostProcess)?;

        self.pool.finalize(&block.transactions);
        self.registry.update_stake_slots(block)?;

        self.chain.check_balance().map_err(|err| match err {
            err @ ChainError::BalanceInconsistent { .. } => ForgeError::Balance(err),
            other => ForgeError::Chain(other),
        })?;

        Ok(())
    }
}
