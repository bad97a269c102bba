//! Transaction and block assembly
//!
//! Builders stamp the canonical hash as the last construction step, so a
//! built value is always internally consistent.

use std::time::{SystemTime, UNIX_EPOCH};

use lib_types::{Amount, BlockHash, TxType};

use crate::errors::WireError;
use crate::hashing::{block_hash, tx_hash, tx_root};
use crate::sign::BlockSigner;
use crate::types::{Block, Sign, Transaction, TxInput, TxOutput};

/// Protocol version stamped into every assembled block.
pub const BLOCK_VERSION: [u8; 3] = [1, 0, 0];

/// Unix seconds now. Clock access is confined to this helper.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Builder for wire transactions.
#[derive(Debug, Default)]
pub struct TxBuilder {
    num: u64,
    tx_type: u32,
    fee: Amount,
    data: Vec<u8>,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    timestamp: Option<u64>,
}

impl TxBuilder {
    pub fn new(tx_type: TxType, num: u64) -> Self {
        Self {
            num,
            tx_type: tx_type.as_u32(),
            ..Default::default()
        }
    }

    pub fn fee(mut self, fee: Amount) -> Self {
        self.fee = fee;
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn input(mut self, input: TxInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn inputs(mut self, inputs: Vec<TxInput>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn output(mut self, output: TxOutput) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn outputs(mut self, outputs: Vec<TxOutput>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Override the timestamp (defaults to the wall clock at build time).
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Assemble an unsigned transaction (synthesized types carry no
    /// signature) and stamp its canonical hash.
    pub fn build(self) -> Transaction {
        let mut tx = Transaction {
            num: self.num,
            tx_type: self.tx_type,
            timestamp: self.timestamp.unwrap_or_else(unix_now),
            hash: Vec::new(),
            fee: self.fee,
            data: self.data,
            inputs: self.inputs,
            outputs: self.outputs,
            signature: Vec::new(),
        };
        tx.hash = tx_hash(&tx).as_bytes().to_vec();
        tx
    }

    /// Assemble, stamp the hash, then sign the hash.
    pub fn build_signed(self, signer: &dyn BlockSigner) -> Result<Transaction, WireError> {
        let mut tx = self.build();
        let digest: [u8; 32] = *tx.hash32().as_bytes();
        tx.signature = signer.sign(&digest)?.to_vec();
        Ok(tx)
    }
}

/// Builder for blocks.
#[derive(Debug)]
pub struct BlockBuilder {
    num: u64,
    parent: BlockHash,
    timestamp: Option<u64>,
    transactions: Vec<Transaction>,
}

impl BlockBuilder {
    pub fn new(num: u64, parent: BlockHash) -> Self {
        Self {
            num,
            parent,
            timestamp: None,
            transactions: Vec::new(),
        }
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions;
        self
    }

    /// Assemble the block: transaction root, canonical hash, then the
    /// proposer signature over the hash. Genesis is built unsigned.
    pub fn build(self, signer: Option<&dyn BlockSigner>) -> Result<Block, WireError> {
        let mut block = Block {
            num: self.num,
            version: BLOCK_VERSION.to_vec(),
            hash: Vec::new(),
            parent: self.parent.as_bytes().to_vec(),
            timestamp: self.timestamp.unwrap_or_else(unix_now),
            txroot: tx_root(&self.transactions).to_vec(),
            proposer: None,
            approvers: Vec::new(),
            slashers: Vec::new(),
            transactions: self.transactions,
        };

        let hash = block_hash(&block);
        block.hash = hash.as_bytes().to_vec();

        if let Some(signer) = signer {
            let signature = signer.sign(hash.as_bytes())?;
            block.proposer = Some(Sign {
                address: signer.address().as_bytes().to_vec(),
                signature: signature.to_vec(),
            });
        }

        Ok(block)
    }
}
