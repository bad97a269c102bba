//! Key Encoding Helpers
//!
//! Key encoding is PROTOCOL. These functions define the canonical byte
//! layout for all index keys. Never inline key construction in business
//! logic.
//!
//! # Format Conventions
//!
//! - Numbers are big-endian (sorts numerically)
//! - Hashes and addresses are raw bytes
//! - Composite keys use fixed-width fields (no delimiters needed)

use lib_types::{Address, TxHash};

use crate::types::OutPoint;

/// Key for the main tree: tx_hash (32) + output_index (4 BE) = 36 bytes
#[inline]
pub fn utxo_key(outpoint: &OutPoint) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(outpoint.tx.as_bytes());
    key[32..].copy_from_slice(&outpoint.index.to_be_bytes());
    key
}

/// Parse an outpoint back out of a main-tree key
#[inline]
pub fn parse_utxo_key(key: &[u8]) -> Option<OutPoint> {
    if key.len() != 36 {
        return None;
    }
    let tx = TxHash::from_slice(&key[..32])?;
    let index = u32::from_be_bytes([key[32], key[33], key[34], key[35]]);
    Some(OutPoint::new(tx, index))
}

/// Key for the per-address tree: address (20) + insertion seq (8 BE).
///
/// The sequence number preserves index insertion order under the
/// prefix scan, which the collapse planner depends on.
#[inline]
pub fn addr_key(addr: &Address, seq: u64) -> [u8; 28] {
    let mut key = [0u8; 28];
    key[..20].copy_from_slice(addr.as_bytes());
    key[20..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// Prefix for scanning one address's outputs
#[inline]
pub fn addr_prefix(addr: &Address) -> [u8; 20] {
    *addr.as_bytes()
}

/// Key for the per-block tree: block number (8 BE) + outpoint (36)
#[inline]
pub fn block_key(block_num: u64, outpoint: &OutPoint) -> [u8; 44] {
    let mut key = [0u8; 44];
    key[..8].copy_from_slice(&block_num.to_be_bytes());
    key[8..].copy_from_slice(&utxo_key(outpoint));
    key
}

/// Prefix for scanning one block's outputs
#[inline]
pub fn block_prefix(block_num: u64) -> [u8; 8] {
    block_num.to_be_bytes()
}

/// Key for the stake-deposit tree: insertion seq (8 BE) + outpoint (36)
#[inline]
pub fn stake_key(seq: u64, outpoint: &OutPoint) -> [u8; 44] {
    let mut key = [0u8; 44];
    key[..8].copy_from_slice(&seq.to_be_bytes());
    key[8..].copy_from_slice(&utxo_key(outpoint));
    key
}

/// Well-known meta keys
pub mod meta {
    /// Monotonic insertion sequence counter
    pub const NEXT_SEQ: &[u8] = b"next_seq";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utxo_key_roundtrip() {
        let outpoint = OutPoint::new(TxHash::new([0xab; 32]), 42);
        let key = utxo_key(&outpoint);
        assert_eq!(parse_utxo_key(&key), Some(outpoint));
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        assert!(parse_utxo_key(&[0; 35]).is_none());
        assert!(parse_utxo_key(&[0; 37]).is_none());
    }

    #[test]
    fn test_addr_keys_sort_by_insertion() {
        let addr = Address::new([7u8; 20]);
        let k1 = addr_key(&addr, 1);
        let k2 = addr_key(&addr, 2);
        let k10 = addr_key(&addr, 10);
        assert!(k1 < k2);
        assert!(k2 < k10);
        assert!(k1.starts_with(&addr_prefix(&addr)));
    }

    #[test]
    fn test_block_keys_group_by_block() {
        let op = OutPoint::new(TxHash::new([1u8; 32]), 0);
        let k = block_key(5, &op);
        assert!(k.starts_with(&block_prefix(5)));
        assert!(!k.starts_with(&block_prefix(6)));
    }
}
