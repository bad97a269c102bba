//! Collapse Planner
//!
//! Bounds per-address UTXO fragmentation. When an address accumulates
//! `collapse_threshold` or more unspent outputs, the planner emits a
//! synthetic collapse transaction consuming all of them and producing one
//! consolidated output back to the same address.
//!
//! The planner reads the committed index only: outputs produced by the
//! in-flight block's own transactions are not yet indexed and are never
//! collapsed in the same block.

use std::collections::HashSet;

use tracing::debug;

use lib_types::{Address, Amount, TxType};
use lib_utxo::{UtxoIndex, UtxoResult};
use lib_wire::{Transaction, TxBuilder, TxInput, TxOutput};

use crate::config::ForgeConfig;

/// Plan a collapse transaction for the addresses paid by `tx`.
///
/// `skip` is the forge-cycle scratch set: each address is considered at
/// most once per cycle, and the sender of a non-reward transaction is
/// skipped outright, since its output set is already being consumed.
///
/// Returns `None` when no address crossed the threshold. A failed index
/// query aborts the whole forge.
pub fn plan_collapse(
    tx: &Transaction,
    block_num: u64,
    skip: &mut HashSet<Address>,
    index: &dyn UtxoIndex,
    cfg: &ForgeConfig,
) -> UtxoResult<Option<Transaction>> {
    let mut inputs: Vec<TxInput> = Vec::with_capacity(tx.inputs.len());
    let mut outputs: Vec<TxOutput> = Vec::new();

    if tx.kind() != Some(TxType::Reward) {
        if let Some(from) = tx.sender() {
            skip.insert(from);
        }
    }

    let mut limit_reached = false;
    for out in &tx.outputs {
        let Some(addr) = out.address20() else { continue };

        // Already collapsed this cycle, or the sender itself.
        if skip.contains(&addr) {
            continue;
        }

        let utxo = index.find_all_utxo(&addr)?;
        skip.insert(addr);

        if utxo.len() < cfg.collapse_threshold {
            continue;
        }

        let mut user_inputs: Vec<TxInput> = Vec::with_capacity(utxo.len());
        let mut balance: Amount = 0;
        for uo in &utxo {
            balance = balance.saturating_add(uo.amount);
            user_inputs.push(uo.to_input());

            if inputs.len() + user_inputs.len() == cfg.inputs_per_tx_limit {
                limit_reached = true;
                break;
            }
        }

        if !user_inputs.is_empty() {
            inputs.extend(user_inputs);
            outputs.push(TxOutput::new(addr, balance, None));
        }

        if limit_reached {
            break;
        }
    }

    if inputs.is_empty() {
        return Ok(None);
    }

    let collapse = TxBuilder::new(TxType::Collapse, block_num)
        .inputs(inputs)
        .outputs(outputs)
        .build();
    debug!(
        source = %tx.hash32(),
        hash = %collapse.hash32(),
        inputs = collapse.inputs.len(),
        "collapse transaction planned"
    );
    Ok(Some(collapse))
}
