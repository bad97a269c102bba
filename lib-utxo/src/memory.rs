//! In-memory UTXO index
//!
//! Same contract as the sled backend, held in a `Vec` in insertion order.
//! Used by unit tests and light tooling; not durable.

use std::sync::Mutex;

use lib_types::{Address, Amount};

use crate::errors::{UtxoError, UtxoResult};
use crate::types::{OutPoint, Utxo, UtxoIndex};

/// In-memory implementation of [`UtxoIndex`]
#[derive(Debug, Default)]
pub struct MemoryUtxoIndex {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Committed rows in insertion order
    rows: Vec<Utxo>,
    pending: Option<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    adds: Vec<Utxo>,
    spends: Vec<OutPoint>,
}

impl MemoryUtxoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a committed row directly, bypassing transaction control.
    /// Test setup convenience only.
    pub fn seed(&self, utxo: Utxo) {
        self.inner.lock().unwrap().rows.push(utxo);
    }
}

impl Inner {
    fn committed(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.rows.iter().find(|r| r.outpoint() == *outpoint)
    }
}

impl UtxoIndex for MemoryUtxoIndex {
    fn find_all_utxo(&self, addr: &Address) -> UtxoResult<Vec<Utxo>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.to == *addr && !r.spent)
            .cloned()
            .collect())
    }

    fn find_stake_deposits(&self) -> UtxoResult<Vec<Utxo>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.is_stake_deposit() && !r.spent)
            .cloned()
            .collect())
    }

    fn get(&self, outpoint: &OutPoint) -> UtxoResult<Option<Utxo>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.committed(outpoint).cloned())
    }

    fn create_tx(&self) -> UtxoResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.is_some() {
            return Err(UtxoError::TransactionAlreadyActive);
        }
        inner.pending = Some(Pending::default());
        Ok(())
    }

    fn add_output(&self, utxo: &Utxo) -> UtxoResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let outpoint = utxo.outpoint();

        let committed_dup = inner.committed(&outpoint).is_some();
        let pending = inner
            .pending
            .as_mut()
            .ok_or(UtxoError::NoActiveTransaction)?;

        if committed_dup || pending.adds.iter().any(|r| r.outpoint() == outpoint) {
            return Err(UtxoError::DuplicateOutput(outpoint));
        }

        pending.adds.push(utxo.clone());
        Ok(())
    }

    fn spend_output(&self, outpoint: &OutPoint) -> UtxoResult<()> {
        let mut inner = self.inner.lock().unwrap();

        let committed_state = inner.committed(outpoint).map(|r| r.spent);
        let pending = inner
            .pending
            .as_mut()
            .ok_or(UtxoError::NoActiveTransaction)?;

        if pending.spends.contains(outpoint) {
            return Err(UtxoError::AlreadySpent(*outpoint));
        }

        match committed_state {
            Some(true) => return Err(UtxoError::AlreadySpent(*outpoint)),
            Some(false) => {}
            None => {
                // Visible if staged by this same transaction.
                if !pending.adds.iter().any(|r| r.outpoint() == *outpoint) {
                    return Err(UtxoError::NotFound(*outpoint));
                }
            }
        }

        pending.spends.push(*outpoint);
        Ok(())
    }

    fn commit_tx(&self) -> UtxoResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let pending = inner
            .pending
            .take()
            .ok_or(UtxoError::NoActiveTransaction)?;

        inner.rows.extend(pending.adds);
        for outpoint in pending.spends {
            if let Some(row) = inner.rows.iter_mut().find(|r| r.outpoint() == outpoint) {
                row.spent = true;
            }
        }
        Ok(())
    }

    fn rollback_tx(&self) -> UtxoResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.take().is_none() {
            return Err(UtxoError::NoActiveTransaction);
        }
        Ok(())
    }

    fn unspent_total(&self) -> UtxoResult<Amount> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .filter(|r| !r.spent)
            .fold(0u64, |acc, r| acc.saturating_add(r.amount)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::{TxHash, TxType};

    fn row(tag: u8, to: Address, amount: Amount) -> Utxo {
        Utxo {
            hash: TxHash::new([tag; 32]),
            index: 0,
            tx_type: TxType::Normal,
            block_num: 1,
            from: Address::new([0xee; 20]),
            to,
            node: None,
            amount,
            spent: false,
            timestamp: 1,
        }
    }

    #[test]
    fn test_transaction_lifecycle() {
        let index = MemoryUtxoIndex::new();
        let owner = Address::new([1; 20]);

        index.create_tx().unwrap();
        index.add_output(&row(1, owner, 10)).unwrap();
        assert!(index.find_all_utxo(&owner).unwrap().is_empty());
        index.commit_tx().unwrap();
        assert_eq!(index.find_all_utxo(&owner).unwrap().len(), 1);

        index.create_tx().unwrap();
        index.add_output(&row(2, owner, 20)).unwrap();
        index.rollback_tx().unwrap();
        assert_eq!(index.find_all_utxo(&owner).unwrap().len(), 1);
    }

    #[test]
    fn test_double_spend_rejected() {
        let index = MemoryUtxoIndex::new();
        let owner = Address::new([1; 20]);
        let utxo = row(1, owner, 10);
        index.seed(utxo.clone());

        index.create_tx().unwrap();
        index.spend_output(&utxo.outpoint()).unwrap();
        assert_eq!(
            index.spend_output(&utxo.outpoint()),
            Err(UtxoError::AlreadySpent(utxo.outpoint()))
        );
        index.commit_tx().unwrap();

        assert!(index.find_all_utxo(&owner).unwrap().is_empty());
        assert_eq!(index.unspent_total().unwrap(), 0);
    }

    #[test]
    fn test_spend_of_unknown_output_fails() {
        let index = MemoryUtxoIndex::new();
        index.create_tx().unwrap();
        let missing = OutPoint::new(TxHash::new([9; 32]), 0);
        assert_eq!(
            index.spend_output(&missing),
            Err(UtxoError::NotFound(missing))
        );
        index.rollback_tx().unwrap();
    }

    #[test]
    fn test_insertion_order_preserved() {
        let index = MemoryUtxoIndex::new();
        let owner = Address::new([1; 20]);
        for tag in 1..=4u8 {
            index.seed(row(tag, owner, tag as u64));
        }
        let amounts: Vec<u64> = index
            .find_all_utxo(&owner)
            .unwrap()
            .iter()
            .map(|u| u.amount)
            .collect();
        assert_eq!(amounts, vec![1, 2, 3, 4]);
    }
}
