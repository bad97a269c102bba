//! Proposer signing
//!
//! secp256k1 ECDSA with recoverable 65-byte signatures (r || s || v).
//! Addresses are the trailing 20 bytes of the Keccak-256 of the
//! uncompressed public key.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use lib_types::Address;

use crate::errors::WireError;
use crate::hashing::keccak256;

/// Signing seam between the forger and key management.
///
/// Key storage lives outside the core; the forger only needs an identity
/// and a signature over a 32-byte digest.
pub trait BlockSigner: Send + Sync {
    /// Address of the signing identity
    fn address(&self) -> Address;

    /// Recoverable signature over a prehashed digest
    fn sign(&self, digest: &[u8; 32]) -> Result<[u8; 65], WireError>;
}

/// In-process secp256k1 proposer key.
pub struct ProposerKey {
    signing_key: SigningKey,
}

impl ProposerKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Restore from secret key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, WireError> {
        let signing_key = SigningKey::from_bytes((&bytes).into())
            .map_err(|e| WireError::Signer(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Secret key bytes (for key-store round trips).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl BlockSigner for ProposerKey {
    fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }

    fn sign(&self, digest: &[u8; 32]) -> Result<[u8; 65], WireError> {
        let (sig, recovery): (Signature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| WireError::Signer(e.to_string()))?;

        let sig_bytes: [u8; 64] = sig.to_bytes().into();
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig_bytes);
        out[64] = recovery.to_byte();
        Ok(out)
    }
}

/// Derive the address of a public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    Address::new(addr)
}

/// Recover the signer address from a 65-byte recoverable signature.
pub fn recover_address(digest: &[u8; 32], signature: &[u8]) -> Result<Address, WireError> {
    if signature.len() != 65 {
        return Err(WireError::BadSignatureLength(signature.len()));
    }

    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| WireError::Signer(e.to_string()))?;
    let recovery = RecoveryId::from_byte(signature[64])
        .ok_or_else(|| WireError::Signer("invalid recovery id".into()))?;

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery)
        .map_err(|e| WireError::Signer(e.to_string()))?;
    Ok(address_of(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_recover() {
        let key = ProposerKey::generate();
        let digest = keccak256(b"candidate block");

        let sig = key.sign(&digest).unwrap();
        assert_eq!(sig.len(), 65);

        let recovered = recover_address(&digest, &sig).unwrap();
        assert_eq!(recovered, key.address());
    }

    #[test]
    fn test_wrong_digest_recovers_other_address() {
        let key = ProposerKey::generate();
        let sig = key.sign(&keccak256(b"one")).unwrap();

        let other = recover_address(&keccak256(b"two"), &sig);
        // Either recovery fails outright or yields a different identity.
        match other {
            Ok(addr) => assert_ne!(addr, key.address()),
            Err(_) => {}
        }
    }

    #[test]
    fn test_key_roundtrip() {
        let key = ProposerKey::generate();
        let restored = ProposerKey::from_bytes(key.to_bytes()).unwrap();
        assert_eq!(key.address(), restored.address());
    }

    #[test]
    fn test_recover_rejects_short_signature() {
        let digest = keccak256(b"x");
        assert!(matches!(
            recover_address(&digest, &[0u8; 64]),
            Err(WireError::BadSignatureLength(64))
        ));
    }
}
