use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::balance_proof::BalanceProofState;
use crate::constants::EMPTY_ROOT;
use crate::identity::ChannelIdentity;
use crate::lock::Lock;
use crate::merkle::MerkleTree;
use crate::transaction::TransactionExecutionStatus;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("reveal_timeout ({reveal_timeout}) must be strictly less than settle_timeout ({settle_timeout})")]
    RevealTimeoutNotBelowSettleTimeout { reveal_timeout: u64, settle_timeout: u64 },
}

/// One side of a channel. §3 `EndState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndState {
    pub address: Address,
    pub contract_balance: U256,
    pub total_withdraw: U256,
    pub balance_proof: Option<BalanceProofState>,
    pub merkletree: MerkleTree,
    pub locked_locks: HashMap<H256, Lock>,
    pub unlocked_locks: HashMap<H256, (Lock, H256)>,
    pub onchain_unlocked_locks: HashMap<H256, (Lock, H256)>,
    pub onchain_locksroot: H256,
}

impl EndState {
    pub fn new(address: Address, contract_balance: U256) -> Self {
        Self {
            address,
            contract_balance,
            total_withdraw: U256::zero(),
            balance_proof: None,
            merkletree: MerkleTree::empty(),
            locked_locks: HashMap::new(),
            unlocked_locks: HashMap::new(),
            onchain_unlocked_locks: HashMap::new(),
            onchain_locksroot: EMPTY_ROOT,
        }
    }

    /// Invariant 4: a fresh end-state's first proof uses nonce 1; 0 is
    /// reserved to mean "no balance proof yet".
    pub fn next_nonce(&self) -> U256 {
        match &self.balance_proof {
            Some(proof) => proof.nonce + U256::one(),
            None => U256::one(),
        }
    }

    /// Checks all three lock maps in order, matching the view the balance-
    /// proof validator and lock lifecycle manager both need.
    pub fn get_lock(&self, secrethash: H256) -> Option<Lock> {
        if let Some(lock) = self.locked_locks.get(&secrethash) {
            return Some(*lock);
        }
        if let Some((lock, _)) = self.unlocked_locks.get(&secrethash) {
            return Some(*lock);
        }
        if let Some((lock, _)) = self.onchain_unlocked_locks.get(&secrethash) {
            return Some(*lock);
        }
        None
    }

    /// Invariant 6, read direction: is the preimage for `secrethash` known
    /// to this side at all (off-chain or on-chain)?
    pub fn is_secret_known(&self, secrethash: H256) -> bool {
        self.unlocked_locks.contains_key(&secrethash) || self.onchain_unlocked_locks.contains_key(&secrethash)
    }

    pub fn offchain_total_withdraw(&self) -> U256 {
        self.total_withdraw
    }
}

/// A deposit observed on-chain but not yet past `DEFAULT_CONFIRMATIONS`,
/// held in `ChannelState::deposit_transaction_queue` until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedDeposit {
    pub block_number: u64,
    pub participant: Address,
    pub contract_balance: U256,
}

impl Ord for QueuedDeposit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.block_number.cmp(&other.block_number)
    }
}

impl PartialOrd for QueuedDeposit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// §3 `ChannelState`: the full replica one participant holds of a single
/// netting channel. Identity is stored once here rather than duplicated
/// onto each end-state (§9).
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub identity: ChannelIdentity,
    pub our_state: EndState,
    pub partner_state: EndState,
    pub token_address: Address,
    pub reveal_timeout: u64,
    pub settle_timeout: u64,
    pub mediation_fee: U256,
    pub close_transaction: Option<TransactionExecutionStatus>,
    pub settle_transaction: Option<TransactionExecutionStatus>,
    pub update_transaction: Option<TransactionExecutionStatus>,
    pub deposit_transaction_queue: BinaryHeap<Reverse<QueuedDeposit>>,
}

impl ChannelState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: ChannelIdentity,
        our_state: EndState,
        partner_state: EndState,
        token_address: Address,
        reveal_timeout: u64,
        settle_timeout: u64,
        mediation_fee: U256,
    ) -> Result<Self, ChannelError> {
        if reveal_timeout >= settle_timeout {
            return Err(ChannelError::RevealTimeoutNotBelowSettleTimeout { reveal_timeout, settle_timeout });
        }

        Ok(Self {
            identity,
            our_state,
            partner_state,
            token_address,
            reveal_timeout,
            settle_timeout,
            mediation_fee,
            close_transaction: None,
            settle_transaction: None,
            update_transaction: None,
            deposit_transaction_queue: BinaryHeap::new(),
        })
    }

    pub fn end_state(&self, address: Address) -> Option<&EndState> {
        if self.our_state.address == address {
            Some(&self.our_state)
        } else if self.partner_state.address == address {
            Some(&self.partner_state)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_test_channel;

    #[test]
    fn test_new_end_state_next_nonce_is_one() {
        let end_state = EndState::new(Address::random(), U256::from(100));
        assert_eq!(end_state.next_nonce(), U256::one());
    }

    #[test]
    fn test_channel_new_rejects_reveal_timeout_not_below_settle_timeout() {
        let our = EndState::new(Address::random(), U256::from(100));
        let partner = EndState::new(Address::random(), U256::zero());
        let identity = ChannelIdentity::new(U256::one(), Address::random(), U256::one());
        let err = ChannelState::new(identity, our, partner, Address::random(), 50, 50, U256::zero()).unwrap_err();
        assert!(matches!(err, ChannelError::RevealTimeoutNotBelowSettleTimeout { .. }));
    }

    #[test]
    fn test_end_state_lookup_by_address() {
        let channel = open_test_channel();
        let our_address = channel.our_state.address;
        assert!(channel.end_state(our_address).is_some());
        assert!(channel.end_state(Address::random()).is_none());
    }
}
