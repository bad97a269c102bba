//! Wire messages
//!
//! Hand-written prost messages mirroring the deployed proto3 schema.
//! Field numbers and scalar widths are protocol: never renumber or widen
//! a field. New fields must take fresh tags.

use lib_types::{Address, Amount, BlockHash, TxHash, TxType};

/// A block as it travels on the wire and rests in the block store.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Block {
    /// Block number, totally ordering the chain
    #[prost(uint64, tag = "1")]
    pub num: u64,
    /// Protocol version (3 bytes)
    #[prost(bytes = "vec", tag = "2")]
    pub version: Vec<u8>,
    /// Keccak-256 over the canonical encoding (hash and signer fields cleared)
    #[prost(bytes = "vec", tag = "3")]
    pub hash: Vec<u8>,
    /// Hash of the parent block; zero for genesis
    #[prost(bytes = "vec", tag = "4")]
    pub parent: Vec<u8>,
    /// Unix seconds at assembly time
    #[prost(uint64, tag = "5")]
    pub timestamp: u64,
    /// Digest over the ordered transaction hashes
    #[prost(bytes = "vec", tag = "6")]
    pub txroot: Vec<u8>,
    /// Proposer signature over the block hash
    #[prost(message, optional, tag = "7")]
    pub proposer: Option<Sign>,
    /// Attestation signatures (exchanged outside this core)
    #[prost(message, repeated, tag = "8")]
    pub approvers: Vec<Sign>,
    /// Slashing signatures (exchanged outside this core)
    #[prost(message, repeated, tag = "9")]
    pub slashers: Vec<Sign>,
    #[prost(message, repeated, tag = "10")]
    pub transactions: Vec<Transaction>,
}

/// An address/signature pair.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sign {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
    /// 65-byte recoverable ECDSA signature
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Transaction {
    /// Producing block number
    #[prost(uint64, tag = "1")]
    pub num: u64,
    /// Discriminant of [`TxType`]
    #[prost(uint32, tag = "2")]
    pub tx_type: u32,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
    /// Keccak-256 over the canonical encoding with hash and signature cleared
    #[prost(bytes = "vec", tag = "4")]
    pub hash: Vec<u8>,
    #[prost(uint64, tag = "5")]
    pub fee: u64,
    /// External byte data
    #[prost(bytes = "vec", tag = "6")]
    pub data: Vec<u8>,
    #[prost(message, repeated, tag = "7")]
    pub inputs: Vec<TxInput>,
    #[prost(message, repeated, tag = "8")]
    pub outputs: Vec<TxOutput>,
    #[prost(bytes = "vec", tag = "9")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxInput {
    /// Hash of the transaction that produced the referenced output
    #[prost(bytes = "vec", tag = "1")]
    pub hash: Vec<u8>,
    /// Output index within the producing transaction
    #[prost(uint32, tag = "2")]
    pub index: u32,
    /// Owner of the referenced output
    #[prost(bytes = "vec", tag = "3")]
    pub address: Vec<u8>,
    /// Denormalized amount; must equal the referenced output's amount
    #[prost(uint64, tag = "4")]
    pub amount: u64,
    /// Deprecated per-input signature slot, kept for wire compatibility
    #[prost(bytes = "vec", tag = "5")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxOutput {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub amount: u64,
    /// Validator to activate; set only on stake outputs
    #[prost(bytes = "vec", tag = "3")]
    pub node: Vec<u8>,
}

impl Transaction {
    /// Parsed transaction type, when the discriminant is known.
    pub fn kind(&self) -> Option<TxType> {
        TxType::from_u32(self.tx_type)
    }

    /// Transaction hash as a fixed-size value; zero when unset or malformed.
    pub fn hash32(&self) -> TxHash {
        TxHash::from_slice(&self.hash).unwrap_or_default()
    }

    /// The sending address: owner of the first input.
    pub fn sender(&self) -> Option<Address> {
        self.inputs.first().and_then(|i| Address::from_slice(&i.address))
    }

    /// The fee this transaction contributes to the block's fee collection.
    pub fn real_fee(&self) -> Amount {
        match self.kind() {
            Some(ty) if ty.pays_fee() => self.fee,
            _ => 0,
        }
    }

    /// Serialized size in bytes, the unit of the block size budget.
    pub fn size_bytes(&self) -> usize {
        prost::Message::encoded_len(self)
    }

    /// Sum over inputs, saturating.
    pub fn input_total(&self) -> Amount {
        self.inputs.iter().fold(0u64, |acc, i| acc.saturating_add(i.amount))
    }

    /// Sum over outputs, saturating.
    pub fn output_total(&self) -> Amount {
        self.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.amount))
    }

    /// Amount counting against validator slot capacity: the sum of outputs
    /// whose node field carries the black-hole marker.
    pub fn staked_amount(&self) -> Amount {
        self.outputs
            .iter()
            .filter(|o| Address::from_slice(&o.node) == Some(Address::BLACK_HOLE))
            .fold(0u64, |acc, o| acc.saturating_add(o.amount))
    }
}

impl TxInput {
    pub fn new(hash: TxHash, index: u32, address: Address, amount: Amount) -> Self {
        Self {
            hash: hash.as_bytes().to_vec(),
            index,
            address: address.as_bytes().to_vec(),
            amount,
            signature: Vec::new(),
        }
    }

    pub fn hash32(&self) -> TxHash {
        TxHash::from_slice(&self.hash).unwrap_or_default()
    }

    pub fn address20(&self) -> Option<Address> {
        Address::from_slice(&self.address)
    }
}

impl TxOutput {
    pub fn new(address: Address, amount: Amount, node: Option<Address>) -> Self {
        Self {
            address: address.as_bytes().to_vec(),
            amount,
            node: node.map(|n| n.as_bytes().to_vec()).unwrap_or_default(),
        }
    }

    pub fn address20(&self) -> Option<Address> {
        Address::from_slice(&self.address)
    }

    pub fn node20(&self) -> Option<Address> {
        if self.node.is_empty() {
            None
        } else {
            Address::from_slice(&self.node)
        }
    }
}

impl Block {
    /// Block hash as a fixed-size value; zero when unset or malformed.
    pub fn hash32(&self) -> BlockHash {
        BlockHash::from_slice(&self.hash).unwrap_or_default()
    }

    pub fn parent32(&self) -> BlockHash {
        BlockHash::from_slice(&self.parent).unwrap_or_default()
    }

    /// Serialized size in bytes.
    pub fn size_bytes(&self) -> usize {
        prost::Message::encoded_len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_field_tags_are_wire_stable() {
        // A transaction with only `num` set must encode as tag 1 varint.
        let tx = Transaction {
            num: 7,
            ..Default::default()
        };
        assert_eq!(tx.encode_to_vec(), vec![0x08, 0x07]);

        // `tx_type` rides on tag 2.
        let tx = Transaction {
            tx_type: 1,
            ..Default::default()
        };
        assert_eq!(tx.encode_to_vec(), vec![0x10, 0x01]);

        // An output amount rides on tag 2 of TxOutput.
        let out = TxOutput {
            amount: 300,
            ..Default::default()
        };
        assert_eq!(out.encode_to_vec(), vec![0x10, 0xac, 0x02]);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let tx = Transaction {
            num: 42,
            tx_type: TxType::Normal.as_u32(),
            timestamp: 1_700_000_000,
            hash: vec![0xaa; 32],
            fee: 5,
            data: vec![1, 2, 3],
            inputs: vec![TxInput::new(
                TxHash::new([1u8; 32]),
                0,
                Address::new([2u8; 20]),
                100,
            )],
            outputs: vec![TxOutput::new(Address::new([3u8; 20]), 95, None)],
            signature: vec![0xbb; 65],
        };
        let bytes = tx.encode_to_vec();
        let decoded = Transaction::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.size_bytes(), bytes.len());
    }

    #[test]
    fn test_staked_amount_counts_black_hole_node_only() {
        let tx = Transaction {
            tx_type: TxType::Stake.as_u32(),
            outputs: vec![
                TxOutput::new(Address::new([1u8; 20]), 64, Some(Address::BLACK_HOLE)),
                TxOutput::new(Address::new([1u8; 20]), 36, None),
            ],
            ..Default::default()
        };
        assert_eq!(tx.staked_amount(), 64);
    }

    #[test]
    fn test_real_fee_is_zero_for_synthesized_types() {
        let mut tx = Transaction {
            tx_type: TxType::Reward.as_u32(),
            fee: 9,
            ..Default::default()
        };
        assert_eq!(tx.real_fee(), 0);
        tx.tx_type = TxType::Normal.as_u32();
        assert_eq!(tx.real_fee(), 9);
    }
}
