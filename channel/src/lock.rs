use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};

use crate::crypto::keccak256;

/// A hash-timelocked pending transfer: claimable by revealing the preimage
/// of `secrethash` before `expiration`, refundable to the sender after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub amount: U256,
    pub expiration: u64,
    pub secrethash: H256,
}

impl Lock {
    pub fn new(amount: U256, expiration: u64, secrethash: H256) -> Self {
        Self { amount, expiration, secrethash }
    }

    /// `lockhash`: the keyed hash of the lock's packed fields, used as its
    /// Merkle leaf. Packed as `expiration (32B BE) ‖ amount (32B BE) ‖
    /// secrethash (32B)`, the field order the on-chain contract expects.
    pub fn lockhash(&self) -> H256 {
        keccak256(&self.encoded())
    }

    pub fn encoded(&self) -> [u8; 96] {
        let mut buf = [0u8; 96];
        let mut expiration_bytes = [0u8; 32];
        U256::from(self.expiration).to_big_endian(&mut expiration_bytes);
        buf[0..32].copy_from_slice(&expiration_bytes);
        let mut amount_bytes = [0u8; 32];
        self.amount.to_big_endian(&mut amount_bytes);
        buf[32..64].copy_from_slice(&amount_bytes);
        buf[64..96].copy_from_slice(self.secrethash.as_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockhash_is_deterministic() {
        let lock = Lock::new(U256::from(30), 120, H256::repeat_byte(7));
        assert_eq!(lock.lockhash(), lock.lockhash());
    }

    #[test]
    fn test_lockhash_changes_with_amount() {
        let a = Lock::new(U256::from(30), 120, H256::repeat_byte(7));
        let b = Lock::new(U256::from(31), 120, H256::repeat_byte(7));
        assert_ne!(a.lockhash(), b.lockhash());
    }
}
