//! Block Validation
//!
//! The forger hands each candidate to a [`BlockValidator`] before
//! persisting it. [`LedgerValidator`] is the concrete implementation:
//! structural wire checks, per-type invariants, value conservation, and
//! verification of every input against the committed index.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use lib_types::{Address, Amount, TxType};
use lib_utxo::{OutPoint, UtxoIndex};
use lib_wire::{tx_hash, tx_root, validate_tx_wire, Block, Transaction};

/// A rejected candidate block.
///
/// `failed_tx` names the first offending transaction when one can be
/// singled out, so the pool can evict it.
#[derive(Error, Debug, Clone)]
#[error("block validation failed: {reason}")]
pub struct ValidationError {
    pub failed_tx: Option<Transaction>,
    pub reason: String,
}

impl ValidationError {
    fn block(reason: impl Into<String>) -> Self {
        Self {
            failed_tx: None,
            reason: reason.into(),
        }
    }

    fn tx(tx: &Transaction, reason: impl Into<String>) -> Self {
        Self {
            failed_tx: Some(tx.clone()),
            reason: reason.into(),
        }
    }
}

/// Validation seam between the forger and consensus rules.
pub trait BlockValidator: Send + Sync {
    fn validate_block(&self, block: &Block) -> Result<(), ValidationError>;
}

/// Ledger-rule validator backed by the committed UTXO index.
pub struct LedgerValidator {
    utxo: Arc<dyn UtxoIndex>,
    slot_unit: Amount,
}

impl LedgerValidator {
    pub fn new(utxo: Arc<dyn UtxoIndex>, slot_unit: Amount) -> Self {
        Self { utxo, slot_unit }
    }

    fn check_inputs(
        &self,
        tx: &Transaction,
        spent_in_block: &mut HashSet<OutPoint>,
    ) -> Result<(), ValidationError> {
        for input in &tx.inputs {
            let outpoint = OutPoint::new(input.hash32(), input.index);

            if !spent_in_block.insert(outpoint) {
                return Err(ValidationError::tx(
                    tx,
                    format!("output {outpoint} spent twice in block"),
                ));
            }

            let row = self
                .utxo
                .get(&outpoint)
                .map_err(|e| ValidationError::tx(tx, format!("index error: {e}")))?
                .ok_or_else(|| {
                    ValidationError::tx(tx, format!("undefined output {outpoint}"))
                })?;

            if row.spent {
                return Err(ValidationError::tx(
                    tx,
                    format!("output {outpoint} already spent"),
                ));
            }
            if row.amount != input.amount {
                return Err(ValidationError::tx(
                    tx,
                    format!(
                        "amount mismatch for {outpoint}: given {} expected {}",
                        input.amount, row.amount
                    ),
                ));
            }
            if Some(row.to) != input.address20() {
                return Err(ValidationError::tx(
                    tx,
                    format!("owner mismatch for {outpoint}"),
                ));
            }
        }
        Ok(())
    }

    fn check_transaction(
        &self,
        block: &Block,
        tx: &Transaction,
        spent_in_block: &mut HashSet<OutPoint>,
    ) -> Result<(), ValidationError> {
        let kind = tx
            .kind()
            .ok_or_else(|| ValidationError::tx(tx, format!("unknown type {}", tx.tx_type)))?;

        let user_submitted = !kind.is_synthesized() && kind != TxType::Genesis;
        validate_tx_wire(tx, user_submitted)
            .map_err(|e| ValidationError::tx(tx, e.to_string()))?;

        if tx_hash(tx) != tx.hash32() {
            return Err(ValidationError::tx(tx, "hash mismatch"));
        }
        if tx.num != block.num {
            return Err(ValidationError::tx(tx, "block number mismatch"));
        }

        match kind {
            TxType::Reward | TxType::Fee | TxType::Collapse if tx.fee != 0 => {
                return Err(ValidationError::tx(tx, "synthesized type with fee"));
            }
            _ => {}
        }

        match kind {
            TxType::Reward => {
                if !tx.inputs.is_empty() {
                    return Err(ValidationError::tx(tx, "reward with inputs"));
                }
            }
            TxType::Fee => {
                if !tx.inputs.is_empty() {
                    return Err(ValidationError::tx(tx, "fee transaction with inputs"));
                }
                if tx.outputs.len() != 1
                    || tx.outputs[0].address20() != Some(Address::BLACK_HOLE)
                {
                    return Err(ValidationError::tx(
                        tx,
                        "fee transaction must pay the black-hole address",
                    ));
                }
                let collected: Amount = block
                    .transactions
                    .iter()
                    .filter(|t| t.hash32() != tx.hash32())
                    .fold(0u64, |acc, t| acc.saturating_add(t.real_fee()));
                if tx.outputs[0].amount != collected {
                    return Err(ValidationError::tx(
                        tx,
                        format!(
                            "fee amount {} != collected {}",
                            tx.outputs[0].amount, collected
                        ),
                    ));
                }
            }
            TxType::Collapse => {
                if tx.inputs.is_empty() {
                    return Err(ValidationError::tx(tx, "collapse without inputs"));
                }
                if tx.input_total() != tx.output_total() {
                    return Err(ValidationError::tx(tx, "collapse must conserve value"));
                }
                self.check_inputs(tx, spent_in_block)?;
            }
            TxType::Genesis => {
                if block.num != 0 {
                    return Err(ValidationError::tx(tx, "genesis outside block 0"));
                }
            }
            TxType::Normal | TxType::Stake | TxType::Unstake => {
                if tx.inputs.is_empty() {
                    return Err(ValidationError::tx(tx, "empty inputs"));
                }
                if tx.outputs.is_empty() {
                    return Err(ValidationError::tx(tx, "empty outputs"));
                }
                let spent = tx
                    .output_total()
                    .checked_add(tx.fee)
                    .ok_or_else(|| ValidationError::tx(tx, "amount overflow"))?;
                if tx.input_total() != spent {
                    return Err(ValidationError::tx(
                        tx,
                        format!(
                            "inputs {} != outputs {} + fee {}",
                            tx.input_total(),
                            tx.output_total(),
                            tx.fee
                        ),
                    ));
                }
                if kind == TxType::Stake {
                    let staked = tx.staked_amount();
                    if staked == 0 || staked % self.slot_unit != 0 {
                        return Err(ValidationError::tx(
                            tx,
                            format!("staked amount {staked} not a multiple of the slot unit"),
                        ));
                    }
                }
                self.check_inputs(tx, spent_in_block)?;
            }
        }

        Ok(())
    }
}

impl BlockValidator for LedgerValidator {
    fn validate_block(&self, block: &Block) -> Result<(), ValidationError> {
        if tx_root(&block.transactions).as_slice() != block.txroot.as_slice() {
            return Err(ValidationError::block("transaction root mismatch"));
        }

        let mut spent_in_block: HashSet<OutPoint> = HashSet::new();
        for tx in &block.transactions {
            self.check_transaction(block, tx, &mut spent_in_block)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::{BlockHash, TxHash};
    use lib_utxo::{MemoryUtxoIndex, Utxo};
    use lib_wire::{BlockBuilder, ProposerKey, TxBuilder, TxOutput};

    fn addr(tag: u8) -> Address {
        Address::new([tag; 20])
    }

    fn seed(index: &MemoryUtxoIndex, tag: u8, to: Address, amount: Amount) -> Utxo {
        let utxo = Utxo {
            hash: TxHash::new([tag; 32]),
            index: 0,
            tx_type: TxType::Normal,
            block_num: 0,
            from: Address::BLACK_HOLE,
            to,
            node: None,
            amount,
            spent: false,
            timestamp: 1,
        };
        index.seed(utxo.clone());
        utxo
    }

    fn validator(index: Arc<MemoryUtxoIndex>) -> LedgerValidator {
        LedgerValidator::new(index, 100)
    }

    fn block_of(num: u64, txs: Vec<Transaction>) -> Block {
        let key = ProposerKey::generate();
        BlockBuilder::new(num, BlockHash::zero())
            .timestamp(50)
            .transactions(txs)
            .build(Some(&key))
            .unwrap()
    }

    fn transfer(utxo: &Utxo, to: Address, fee: Amount, num: u64) -> Transaction {
        let key = ProposerKey::generate();
        TxBuilder::new(TxType::Normal, num)
            .fee(fee)
            .timestamp(10)
            .input(utxo.to_input())
            .output(TxOutput::new(to, utxo.amount - fee, None))
            .build_signed(&key)
            .unwrap()
    }

    #[test]
    fn test_valid_block_passes() {
        let index = Arc::new(MemoryUtxoIndex::new());
        let utxo = seed(&index, 1, addr(1), 100);
        let tx = transfer(&utxo, addr(2), 5, 3);
        let fee = crate::synth::create_fee_tx(std::slice::from_ref(&tx), 3).unwrap();

        validator(index)
            .validate_block(&block_of(3, vec![tx, fee]))
            .unwrap();
    }

    #[test]
    fn test_conservation_violation_names_the_tx() {
        let index = Arc::new(MemoryUtxoIndex::new());
        let utxo = seed(&index, 1, addr(1), 100);
        let mut tx = transfer(&utxo, addr(2), 5, 3);
        tx.fee = 6;
        tx.hash = tx_hash(&tx).as_bytes().to_vec();

        let err = validator(index)
            .validate_block(&block_of(3, vec![tx.clone()]))
            .unwrap_err();
        assert_eq!(err.failed_tx.map(|t| t.hash32()), Some(tx.hash32()));
    }

    #[test]
    fn test_undefined_output_rejected() {
        let index = Arc::new(MemoryUtxoIndex::new());
        let ghost = Utxo {
            hash: TxHash::new([9; 32]),
            index: 0,
            tx_type: TxType::Normal,
            block_num: 0,
            from: Address::BLACK_HOLE,
            to: addr(1),
            node: None,
            amount: 100,
            spent: false,
            timestamp: 1,
        };
        let tx = transfer(&ghost, addr(2), 5, 3);

        let err = validator(index)
            .validate_block(&block_of(3, vec![tx]))
            .unwrap_err();
        assert!(err.reason.contains("undefined output"));
    }

    #[test]
    fn test_double_spend_within_block_rejected() {
        let index = Arc::new(MemoryUtxoIndex::new());
        let utxo = seed(&index, 1, addr(1), 100);
        let a = transfer(&utxo, addr(2), 0, 3);
        let b = transfer(&utxo, addr(3), 0, 3);

        let err = validator(index)
            .validate_block(&block_of(3, vec![a, b]))
            .unwrap_err();
        assert!(err.reason.contains("spent twice"));
    }

    #[test]
    fn test_fee_amount_must_match_collected() {
        let index = Arc::new(MemoryUtxoIndex::new());
        let utxo = seed(&index, 1, addr(1), 100);
        let tx = transfer(&utxo, addr(2), 5, 3);
        let bogus_fee = TxBuilder::new(TxType::Fee, 3)
            .timestamp(10)
            .output(TxOutput::new(Address::BLACK_HOLE, 4, None))
            .build();

        let err = validator(index)
            .validate_block(&block_of(3, vec![tx, bogus_fee]))
            .unwrap_err();
        assert!(err.reason.contains("fee amount"));
    }

    #[test]
    fn test_txroot_mismatch_rejected() {
        let index = Arc::new(MemoryUtxoIndex::new());
        let utxo = seed(&index, 1, addr(1), 100);
        let tx = transfer(&utxo, addr(2), 0, 3);

        let mut block = block_of(3, vec![tx]);
        block.txroot = vec![0u8; 32];
        let err = validator(index).validate_block(&block).unwrap_err();
        assert!(err.failed_tx.is_none());
        assert!(err.reason.contains("root"));
    }

    #[test]
    fn test_stake_amount_granularity() {
        let index = Arc::new(MemoryUtxoIndex::new());
        let utxo = seed(&index, 1, addr(1), 250);
        let key = ProposerKey::generate();
        let stake = TxBuilder::new(TxType::Stake, 3)
            .timestamp(10)
            .input(utxo.to_input())
            .output(TxOutput::new(addr(1), 250, Some(Address::BLACK_HOLE)))
            .build_signed(&key)
            .unwrap();

        let err = validator(index)
            .validate_block(&block_of(3, vec![stake]))
            .unwrap_err();
        assert!(err.reason.contains("slot unit"));
    }
}
