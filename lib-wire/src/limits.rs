//! Wire-level validation limits
//!
//! These bounds mirror the constraints attached to the deployed schema.
//! Synthesized transactions (reward, fee, collapse) are exempt from the
//! input/output count caps: a collapse consolidates up to thousands of
//! outputs and a reward pays every distinct staker.

use lib_types::TxType;

use crate::errors::WireError;
use crate::types::Transaction;

/// Exact hash width on the wire
pub const HASH_LEN: usize = 32;
/// Exact address width on the wire
pub const ADDRESS_LEN: usize = 20;
/// Exact signature width on the wire
pub const SIGNATURE_LEN: usize = 65;
/// Upper bound on the free-form data field
pub const MAX_DATA_LEN: usize = 10_000;
/// Upper bound on inputs of a user-submitted transaction
pub const MAX_INPUTS: usize = 20;
/// Upper bound on outputs of a user-submitted transaction
pub const MAX_OUTPUTS: usize = 20;

fn check_hash(bytes: &[u8]) -> Result<(), WireError> {
    if bytes.len() != HASH_LEN {
        return Err(WireError::BadHashLength(bytes.len()));
    }
    Ok(())
}

fn check_address(bytes: &[u8]) -> Result<(), WireError> {
    if bytes.len() != ADDRESS_LEN {
        return Err(WireError::BadAddressLength(bytes.len()));
    }
    Ok(())
}

/// Validate the structural wire constraints of a transaction.
///
/// `require_signature` demands a 65-byte signature (user submissions);
/// synthesized transactions carry none.
pub fn validate_tx_wire(tx: &Transaction, require_signature: bool) -> Result<(), WireError> {
    let kind = tx.kind().ok_or(WireError::UnknownTxType(tx.tx_type))?;

    check_hash(&tx.hash)?;

    if tx.data.len() > MAX_DATA_LEN {
        return Err(WireError::DataTooLarge {
            size: tx.data.len(),
            max: MAX_DATA_LEN,
        });
    }

    if require_signature {
        if tx.signature.len() != SIGNATURE_LEN {
            return Err(WireError::BadSignatureLength(tx.signature.len()));
        }
    } else if !tx.signature.is_empty() && tx.signature.len() != SIGNATURE_LEN {
        return Err(WireError::BadSignatureLength(tx.signature.len()));
    }

    if !kind.is_synthesized() {
        if tx.inputs.len() > MAX_INPUTS {
            return Err(WireError::TooManyInputs {
                count: tx.inputs.len(),
                max: MAX_INPUTS,
            });
        }
        if tx.outputs.len() > MAX_OUTPUTS {
            return Err(WireError::TooManyOutputs {
                count: tx.outputs.len(),
                max: MAX_OUTPUTS,
            });
        }
    }

    for input in &tx.inputs {
        check_hash(&input.hash)?;
        check_address(&input.address)?;
    }

    for output in &tx.outputs {
        check_address(&output.address)?;
        if !output.node.is_empty() {
            check_address(&output.node)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TxInput, TxOutput};
    use lib_types::{Address, TxHash};

    fn valid_tx() -> Transaction {
        Transaction {
            num: 1,
            tx_type: TxType::Normal.as_u32(),
            timestamp: 1,
            hash: vec![0u8; 32],
            inputs: vec![TxInput::new(TxHash::zero(), 0, Address::BLACK_HOLE, 10)],
            outputs: vec![TxOutput::new(Address::BLACK_HOLE, 10, None)],
            signature: vec![0u8; 65],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_tx_passes() {
        validate_tx_wire(&valid_tx(), true).unwrap();
    }

    #[test]
    fn test_bad_hash_length() {
        let mut tx = valid_tx();
        tx.hash = vec![0u8; 31];
        assert_eq!(
            validate_tx_wire(&tx, true),
            Err(WireError::BadHashLength(31))
        );
    }

    #[test]
    fn test_missing_signature_rejected_when_required() {
        let mut tx = valid_tx();
        tx.signature = Vec::new();
        assert!(matches!(
            validate_tx_wire(&tx, true),
            Err(WireError::BadSignatureLength(0))
        ));
        // Synthesized path tolerates the empty signature.
        validate_tx_wire(&tx, false).unwrap();
    }

    #[test]
    fn test_data_cap() {
        let mut tx = valid_tx();
        tx.data = vec![0u8; MAX_DATA_LEN + 1];
        assert!(matches!(
            validate_tx_wire(&tx, true),
            Err(WireError::DataTooLarge { .. })
        ));
    }

    #[test]
    fn test_input_cap_exempts_collapse() {
        let mut tx = valid_tx();
        tx.inputs = (0..21)
            .map(|i| TxInput::new(TxHash::zero(), i, Address::BLACK_HOLE, 1))
            .collect();
        assert!(matches!(
            validate_tx_wire(&tx, true),
            Err(WireError::TooManyInputs { .. })
        ));

        tx.tx_type = TxType::Collapse.as_u32();
        tx.signature = Vec::new();
        validate_tx_wire(&tx, false).unwrap();
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut tx = valid_tx();
        tx.tx_type = 99;
        assert_eq!(validate_tx_wire(&tx, true), Err(WireError::UnknownTxType(99)));
    }
}
