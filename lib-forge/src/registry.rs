//! Stake Validator Registry
//!
//! Tracks which addresses hold active validator slots and which slots are
//! tentatively committed by the in-flight block. All state lives behind a
//! reader/writer lock: `stake_slots` and `can_stake` serve concurrent API
//! readers while the forger mutates under the write half.
//!
//! Invariant: `slots.len() + reserved ≤ slots_limit` at every step.

use std::sync::RwLock;

use thiserror::Error;
use tracing::{debug, warn};

use lib_types::{Address, Amount, TxType};
use lib_utxo::{UtxoError, UtxoIndex};
use lib_wire::Block;

/// Error during registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("all validator slots are filled")]
    SlotsFull,

    #[error("undefined staker {0}")]
    UnknownStaker(Address),

    #[error("stake amount {0} is not a positive multiple of the slot unit")]
    InvalidStakeAmount(Amount),

    #[error("stake deposits exceed the slot limit")]
    InconsistentDeposits,

    #[error(transparent)]
    Index(#[from] UtxoError),
}

/// Registry of active validator slots plus in-flight reservations.
///
/// One `slots` entry per occupied slot: an address staking several units
/// appears several times. Reservations are kept per-record (slot count
/// each) so concurrent stake admissions stay individually visible until
/// the block settles.
#[derive(Debug)]
pub struct StakeRegistry {
    slots_limit: usize,
    slot_unit: Amount,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: Vec<Address>,
    reserved: Vec<usize>,
}

impl Inner {
    fn reserved_total(&self) -> usize {
        self.reserved.iter().sum()
    }
}

impl StakeRegistry {
    pub fn new(slots_limit: usize, slot_unit: Amount) -> Self {
        Self {
            slots_limit,
            slot_unit,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Rebuild the slot vector from the unspent stake deposits.
    ///
    /// Idempotent: a fresh vector is built and swapped in, so calling it
    /// twice (cold start, inconsistency recovery) leaves the same state.
    /// Outstanding reservations are untouched.
    pub fn load(&self, index: &dyn UtxoIndex) -> Result<(), RegistryError> {
        let deposits = index.find_stake_deposits()?;

        let mut slots = Vec::new();
        for deposit in &deposits {
            let count = (deposit.amount / self.slot_unit) as usize;
            for _ in 0..count {
                if slots.len() == self.slots_limit {
                    warn!("inconsistent stake deposits");
                    return Err(RegistryError::InconsistentDeposits);
                }
                slots.push(deposit.to);
            }
        }

        let count = slots.len();
        self.inner.write().unwrap().slots = slots;
        warn!(count, "stake deposits loaded");
        Ok(())
    }

    /// Whether a further stake could currently be admitted.
    pub fn can_stake(&self) -> bool {
        let inner = self.inner.read().unwrap();
        inner.slots.len() + inner.reserved_total() < self.slots_limit
    }

    /// Tentatively occupy `amount / slot_unit` slots for an in-flight
    /// stake transaction.
    pub fn reserve_slots(&self, amount: Amount) -> Result<(), RegistryError> {
        if amount == 0 || amount % self.slot_unit != 0 {
            return Err(RegistryError::InvalidStakeAmount(amount));
        }
        let count = (amount / self.slot_unit) as usize;

        let mut inner = self.inner.write().unwrap();
        if inner.slots.len() + inner.reserved_total() + count > self.slots_limit {
            return Err(RegistryError::SlotsFull);
        }
        inner.reserved.push(count);
        debug!(count, "slots reserved");
        Ok(())
    }

    /// Drop every outstanding reservation. Called once the in-flight
    /// block's fate is known, accepted or not.
    pub fn flush_reserved(&self) {
        self.inner.write().unwrap().reserved.clear();
    }

    /// Occupy a slot for `addr`.
    ///
    /// Capacity is checked against active slots only, since promotion during
    /// finalization runs while the block's own reservations are still
    /// outstanding.
    pub fn register_stake(&self, addr: Address) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap();
        if inner.slots.len() >= self.slots_limit {
            return Err(RegistryError::SlotsFull);
        }
        inner.slots.push(addr);
        Ok(())
    }

    /// Release one slot held by `addr`.
    pub fn unregister_stake(&self, addr: Address) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap();
        match inner.slots.iter().position(|a| *a == addr) {
            Some(pos) => {
                inner.slots.remove(pos);
                Ok(())
            }
            None => Err(RegistryError::UnknownStaker(addr)),
        }
    }

    /// Stable-order snapshot of the active slots.
    pub fn stake_slots(&self) -> Vec<Address> {
        self.inner.read().unwrap().slots.clone()
    }

    /// Total slots tentatively occupied by reservations.
    pub fn reserved_total(&self) -> usize {
        self.inner.read().unwrap().reserved_total()
    }

    /// Promote the stake transactions of an accepted block to active
    /// slots and release slots for its unstake transactions.
    pub fn update_stake_slots(&self, block: &Block) -> Result<(), RegistryError> {
        for tx in &block.transactions {
            match tx.kind() {
                Some(TxType::Stake) => {
                    for out in &tx.outputs {
                        if out.node20() != Some(Address::BLACK_HOLE) {
                            continue;
                        }
                        let Some(staker) = out.address20() else { continue };
                        let count = (out.amount / self.slot_unit) as usize;
                        for _ in 0..count {
                            self.register_stake(staker)?;
                        }
                    }
                }
                Some(TxType::Unstake) => {
                    let Some(staker) = tx.sender() else { continue };
                    let count = (tx.input_total() / self.slot_unit) as usize;
                    for _ in 0..count {
                        self.unregister_stake(staker)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::TxHash;
    use lib_utxo::{MemoryUtxoIndex, Utxo};
    use lib_wire::{BlockBuilder, TxBuilder, TxInput, TxOutput};

    const UNIT: Amount = 100;

    fn addr(tag: u8) -> Address {
        Address::new([tag; 20])
    }

    fn deposit(tag: u8, to: Address, amount: Amount) -> Utxo {
        Utxo {
            hash: TxHash::new([tag; 32]),
            index: 0,
            tx_type: TxType::Stake,
            block_num: 1,
            from: to,
            to,
            node: Some(Address::BLACK_HOLE),
            amount,
            spent: false,
            timestamp: 1,
        }
    }

    #[test]
    fn test_reserve_respects_limit() {
        let registry = StakeRegistry::new(3, UNIT);
        registry.reserve_slots(2 * UNIT).unwrap();
        registry.reserve_slots(UNIT).unwrap();
        assert_eq!(registry.reserve_slots(UNIT), Err(RegistryError::SlotsFull));
        assert!(!registry.can_stake());

        registry.flush_reserved();
        assert!(registry.can_stake());
        assert_eq!(registry.reserved_total(), 0);
    }

    #[test]
    fn test_reserve_rejects_bad_amounts() {
        let registry = StakeRegistry::new(3, UNIT);
        assert_eq!(
            registry.reserve_slots(0),
            Err(RegistryError::InvalidStakeAmount(0))
        );
        assert_eq!(
            registry.reserve_slots(UNIT + 1),
            Err(RegistryError::InvalidStakeAmount(UNIT + 1))
        );
    }

    #[test]
    fn test_slot_invariant_under_mixed_operations() {
        let registry = StakeRegistry::new(4, UNIT);
        registry.register_stake(addr(1)).unwrap();
        registry.reserve_slots(2 * UNIT).unwrap();
        // 1 active + 2 reserved, limit 4: one slot left.
        registry.reserve_slots(UNIT).unwrap();
        assert_eq!(registry.reserve_slots(UNIT), Err(RegistryError::SlotsFull));

        registry.flush_reserved();
        registry.register_stake(addr(2)).unwrap();
        registry.unregister_stake(addr(1)).unwrap();
        assert_eq!(registry.stake_slots(), vec![addr(2)]);
    }

    #[test]
    fn test_unregister_unknown_staker() {
        let registry = StakeRegistry::new(4, UNIT);
        assert_eq!(
            registry.unregister_stake(addr(9)),
            Err(RegistryError::UnknownStaker(addr(9)))
        );
    }

    #[test]
    fn test_load_is_idempotent() {
        let index = MemoryUtxoIndex::new();
        index.seed(deposit(1, addr(1), 2 * UNIT));
        index.seed(deposit(2, addr(2), UNIT));

        let registry = StakeRegistry::new(8, UNIT);
        registry.load(&index).unwrap();
        let first = registry.stake_slots();
        assert_eq!(first, vec![addr(1), addr(1), addr(2)]);

        registry.load(&index).unwrap();
        assert_eq!(registry.stake_slots(), first);
    }

    #[test]
    fn test_load_rejects_overflowing_deposits() {
        let index = MemoryUtxoIndex::new();
        index.seed(deposit(1, addr(1), 3 * UNIT));

        let registry = StakeRegistry::new(2, UNIT);
        assert_eq!(
            registry.load(&index),
            Err(RegistryError::InconsistentDeposits)
        );
    }

    #[test]
    fn test_update_stake_slots_promotes_and_releases() {
        let registry = StakeRegistry::new(8, UNIT);
        registry.register_stake(addr(1)).unwrap();

        let stake = TxBuilder::new(TxType::Stake, 2)
            .timestamp(1)
            .output(TxOutput::new(addr(2), 2 * UNIT, Some(Address::BLACK_HOLE)))
            .build();
        let unstake = TxBuilder::new(TxType::Unstake, 2)
            .timestamp(2)
            .input(TxInput::new(TxHash::new([7; 32]), 0, addr(1), UNIT))
            .output(TxOutput::new(addr(1), UNIT, None))
            .build();

        let block = BlockBuilder::new(2, lib_types::BlockHash::zero())
            .timestamp(3)
            .transactions(vec![stake, unstake])
            .build(None)
            .unwrap();

        registry.update_stake_slots(&block).unwrap();
        assert_eq!(registry.stake_slots(), vec![addr(2), addr(2)]);
    }
}
