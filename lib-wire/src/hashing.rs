//! Canonical Hashing
//!
//! Every digest on the ledger is Keccak-256. Transaction and block hashes
//! are computed over the canonical wire encoding with the hash itself (and
//! any signature material) cleared, so signing never perturbs the hash.

use prost::Message;
use sha3::{Digest, Keccak256};

use lib_types::{BlockHash, TxHash};

use crate::types::{Block, Transaction};

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Canonical transaction hash: Keccak-256 over the encoding with the
/// `hash` and `signature` fields cleared.
pub fn tx_hash(tx: &Transaction) -> TxHash {
    let mut canonical = tx.clone();
    canonical.hash = Vec::new();
    canonical.signature = Vec::new();
    TxHash::new(keccak256(&canonical.encode_to_vec()))
}

/// Digest over the ordered transaction hashes.
///
/// Reordering, adding or removing any transaction changes the root.
pub fn tx_root(transactions: &[Transaction]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for tx in transactions {
        hasher.update(&tx.hash);
    }
    hasher.finalize().into()
}

/// Canonical block hash: Keccak-256 over the encoding with the `hash`
/// field and all signer material (proposer, approvers, slashers) cleared.
/// The proposer signs this digest, so it cannot be an input to it.
pub fn block_hash(block: &Block) -> BlockHash {
    let mut canonical = block.clone();
    canonical.hash = Vec::new();
    canonical.proposer = None;
    canonical.approvers = Vec::new();
    canonical.slashers = Vec::new();
    BlockHash::new(keccak256(&canonical.encode_to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::TxType;

    fn sample_tx() -> Transaction {
        Transaction {
            num: 1,
            tx_type: TxType::Normal.as_u32(),
            timestamp: 1_700_000_000,
            fee: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_tx_hash_ignores_hash_and_signature() {
        let tx = sample_tx();
        let base = tx_hash(&tx);

        let mut stamped = tx.clone();
        stamped.hash = base.as_bytes().to_vec();
        stamped.signature = vec![0x11; 65];
        assert_eq!(tx_hash(&stamped), base);
    }

    #[test]
    fn test_tx_hash_tracks_content() {
        let tx = sample_tx();
        let mut other = tx.clone();
        other.fee = 4;
        assert_ne!(tx_hash(&tx), tx_hash(&other));
    }

    #[test]
    fn test_tx_root_is_order_sensitive() {
        let mut a = sample_tx();
        a.hash = tx_hash(&a).as_bytes().to_vec();
        let mut b = sample_tx();
        b.fee = 9;
        b.hash = tx_hash(&b).as_bytes().to_vec();

        let forward = tx_root(&[a.clone(), b.clone()]);
        let backward = tx_root(&[b, a]);
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_block_hash_ignores_signers() {
        let block = Block {
            num: 5,
            version: vec![1, 0, 0],
            timestamp: 1_700_000_000,
            ..Default::default()
        };
        let base = block_hash(&block);

        let mut signed = block.clone();
        signed.hash = base.as_bytes().to_vec();
        signed.proposer = Some(crate::types::Sign {
            address: vec![1; 20],
            signature: vec![2; 65],
        });
        assert_eq!(block_hash(&signed), base);
    }
}
