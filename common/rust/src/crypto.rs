use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::{Address, Signature, H256};
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("recovery error: {0}")]
    RecoveryError(String),
}

/// `keccak256` as the pure, stateless function the channel core consumes
/// through a narrow interface rather than depending on `sha3` directly.
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_slice(&hasher.finalize())
}

/// `recover(data, signature) -> address`, the collaborator the balance-proof
/// validator uses. `signature` is the 65-byte `r ‖ s ‖ v` encoding. Recovery
/// runs over the raw `keccak256(data)` digest — no `"\x19Ethereum Signed
/// Message"` prefix is applied, since the on-chain contract verifies the
/// same raw digest.
pub fn recover(data: &[u8], signature: &[u8]) -> Result<Address, CryptoError> {
    let sig = Signature::try_from(signature).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let digest = keccak256(data);
    sig.recover(digest).map_err(|e| CryptoError::RecoveryError(e.to_string()))
}

/// Signs a raw digest of `data`, for tests and for any local party that
/// originates a balance proof. The core itself never signs, only verifies.
pub fn sign(data: &[u8], wallet: &LocalWallet) -> Signature {
    let digest = keccak256(data);
    wallet.sign_hash(digest).expect("signing a raw digest with a local key cannot fail")
}
