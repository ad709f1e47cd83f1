use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accounting::distributable;
use crate::constants::{MAXIMUM_PENDING_TRANSFERS, UINT256_MAX};
use crate::crypto::{keccak256, recover};
use crate::identity::ChannelIdentity;
use crate::lock::Lock;
use crate::merkle::MerkleTree;
use crate::state::{ChannelState, EndState};
use crate::status::{status, ChannelStatus};

/// A signed balance proof, as received from the peer. The unsigned variant
/// (locally-constructed, before signing) simply omits `signature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceProofState {
    pub nonce: U256,
    pub transferred_amount: U256,
    pub locked_amount: U256,
    pub locksroot: H256,
    pub channel_identity: ChannelIdentity,
    pub message_hash: H256,
    pub signature: Option<[u8; 65]>,
}

impl BalanceProofState {
    pub fn balance_hash(&self) -> H256 {
        hash_balance_data(self.transferred_amount, self.locked_amount, self.locksroot)
    }
}

/// `balance_hash = keccak256(transferred_amount ‖ locked_amount ‖ locksroot)`,
/// each amount packed as 32-byte big-endian.
pub fn hash_balance_data(transferred_amount: U256, locked_amount: U256, locksroot: H256) -> H256 {
    let mut buf = [0u8; 96];
    transferred_amount.to_big_endian(&mut buf[0..32]);
    locked_amount.to_big_endian(&mut buf[32..64]);
    buf[64..96].copy_from_slice(locksroot.as_bytes());
    keccak256(&buf)
}

/// Packs the bytes a balance-proof signature covers, in the exact order the
/// on-chain contract expects: `nonce ‖ balance_hash ‖ additional_hash ‖
/// chain_id ‖ token_network_address ‖ channel_identifier`. Bit-exact; must
/// not change.
pub fn pack_balance_proof(
    nonce: U256,
    balance_hash: H256,
    additional_hash: H256,
    identity: ChannelIdentity,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + 32 + 32 + 84);
    let mut nonce_bytes = [0u8; 32];
    nonce.to_big_endian(&mut nonce_bytes);
    buf.extend_from_slice(&nonce_bytes);
    buf.extend_from_slice(balance_hash.as_bytes());
    buf.extend_from_slice(additional_hash.as_bytes());
    buf.extend_from_slice(&identity.pack());
    buf
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum BalanceProofError {
    #[error("channel is not open")]
    ChannelNotOpen,
    #[error("balance proof references a different channel")]
    ChannelMismatch,
    #[error("transferred_amount + locked_amount overflows UINT256_MAX")]
    AmountOverflow,
    #[error("nonce {received} does not match expected {expected}")]
    NonceMismatch { received: U256, expected: U256 },
    #[error("signature does not recover to the expected sender")]
    InvalidSignature,
    #[error("locked-transfer would exceed MAXIMUM_PENDING_TRANSFERS")]
    TooManyPendingTransfers,
    #[error("locksroot does not match the candidate Merkle tree")]
    LocksrootMismatch,
    #[error("transferred_amount must stay unchanged for a locked transfer")]
    TransferredAmountChanged,
    #[error("locked_amount does not reflect the lock being added")]
    LockedAmountMismatch { expected: U256, received: U256 },
    #[error("lock amount {amount} exceeds distributable {distributable}")]
    ExceedsDistributable { amount: U256, distributable: U256 },
    #[error("lock {0:?} is not present on the sender side")]
    UnknownLock(H256),
    #[error("secret for this lock is already recorded on-chain")]
    SecretAlreadyOnchain,
    #[error("block_number {block_number} has not reached the expiration threshold {threshold}")]
    NotYetExpired { block_number: u64, threshold: u64 },
    #[error("refund field {0} does not match the original transfer")]
    RefundMismatch(&'static str),
    #[error("refund sender must not be the original transfer's target")]
    RefundFromOriginalTarget,
}

/// Outcome of a message-kind-specific check: on success, callers receive
/// both sides of an atomic commit — the validated proof is already known to
/// the caller, so only the candidate Merkle tree, which must replace
/// `sender.merkletree`, is returned here.
pub type ValidationResult = Result<MerkleTree, BalanceProofError>;

/// §4.B `validate_onchain_usable`: the five checks common to every incoming
/// balance proof, independent of message kind.
pub fn validate_onchain_usable(
    received: &BalanceProofState,
    channel: &ChannelState,
    sender_end: &EndState,
) -> Result<(), BalanceProofError> {
    if status(channel) != ChannelStatus::Opened {
        return Err(BalanceProofError::ChannelNotOpen);
    }
    if received.channel_identity != channel.identity {
        return Err(BalanceProofError::ChannelMismatch);
    }
    received
        .transferred_amount
        .checked_add(received.locked_amount)
        .filter(|sum| *sum <= UINT256_MAX)
        .ok_or(BalanceProofError::AmountOverflow)?;

    let expected_nonce = sender_end.next_nonce();
    if received.nonce != expected_nonce {
        return Err(BalanceProofError::NonceMismatch { received: received.nonce, expected: expected_nonce });
    }

    let additional_hash = received.message_hash;
    let packed = pack_balance_proof(received.nonce, received.balance_hash(), additional_hash, received.channel_identity);
    let signature = received.signature.ok_or(BalanceProofError::InvalidSignature)?;
    let recovered = recover(&packed, &signature).map_err(|_| BalanceProofError::InvalidSignature)?;
    if recovered != sender_end.address {
        return Err(BalanceProofError::InvalidSignature);
    }

    Ok(())
}

/// §4.B locked-transfer check: `received` must reflect `lock` freshly added
/// to `sender`'s pending set, within the receiver's distributable capacity.
pub fn validate_locked_transfer(
    received: &BalanceProofState,
    channel: &ChannelState,
    sender: &EndState,
    receiver: &EndState,
    lock: &Lock,
) -> ValidationResult {
    validate_onchain_usable(received, channel, sender)?;

    let candidate = sender.merkletree.with(lock.lockhash()).ok_or(BalanceProofError::LocksrootMismatch)?;
    if candidate.width() > MAXIMUM_PENDING_TRANSFERS {
        return Err(BalanceProofError::TooManyPendingTransfers);
    }
    if received.locksroot != candidate.root() {
        return Err(BalanceProofError::LocksrootMismatch);
    }

    let current = current_transferred_and_locked(sender);
    if received.transferred_amount != current.0 {
        return Err(BalanceProofError::TransferredAmountChanged);
    }
    let expected_locked = current.1.checked_add(lock.amount).ok_or(BalanceProofError::AmountOverflow)?;
    if received.locked_amount != expected_locked {
        return Err(BalanceProofError::LockedAmountMismatch { expected: expected_locked, received: received.locked_amount });
    }

    let limit = distributable(sender, receiver);
    if lock.amount > limit {
        return Err(BalanceProofError::ExceedsDistributable { amount: lock.amount, distributable: limit });
    }

    Ok(candidate)
}

/// §4.B unlock check: `received` must reflect `lock` removed from
/// `sender`'s pending set and its amount moved into `transferred_amount`.
pub fn validate_unlock(
    received: &BalanceProofState,
    channel: &ChannelState,
    sender: &EndState,
    lock: &Lock,
) -> ValidationResult {
    validate_onchain_usable(received, channel, sender)?;

    if sender.get_lock(lock.secrethash).is_none() {
        return Err(BalanceProofError::UnknownLock(lock.secrethash));
    }
    let candidate = sender.merkletree.without(lock.lockhash()).ok_or(BalanceProofError::UnknownLock(lock.secrethash))?;
    if received.locksroot != candidate.root() {
        return Err(BalanceProofError::LocksrootMismatch);
    }

    let current = current_transferred_and_locked(sender);
    let expected_transferred = current.0.checked_add(lock.amount).ok_or(BalanceProofError::AmountOverflow)?;
    if received.transferred_amount != expected_transferred {
        return Err(BalanceProofError::TransferredAmountChanged);
    }
    let expected_locked = current.1.checked_sub(lock.amount).ok_or(BalanceProofError::AmountOverflow)?;
    if received.locked_amount != expected_locked {
        return Err(BalanceProofError::LockedAmountMismatch { expected: expected_locked, received: received.locked_amount });
    }

    Ok(candidate)
}

/// §4.B lock-expired check. `receiver_checks` is `true` when the local
/// party is the message's receiver (threshold = `expiration + 2 *
/// DEFAULT_CONFIRMATIONS`, i.e. the sender's own liveness margin); `false`
/// when checking in the receiver-of-the-message role described in the
/// narrower second clause (`expiration + DEFAULT_CONFIRMATIONS`).
pub fn validate_lock_expired(
    received: &BalanceProofState,
    channel: &ChannelState,
    sender: &EndState,
    lock: &Lock,
    block_number: u64,
    receiver_checks: bool,
) -> ValidationResult {
    validate_onchain_usable(received, channel, sender)?;

    if sender.onchain_unlocked_locks.contains_key(&lock.secrethash) {
        return Err(BalanceProofError::SecretAlreadyOnchain);
    }

    let threshold = if receiver_checks {
        crate::accounting::sender_expiration_threshold(lock.expiration)
    } else {
        crate::accounting::receiver_expiration_threshold(lock.expiration)
    };
    if block_number < threshold {
        return Err(BalanceProofError::NotYetExpired { block_number, threshold });
    }

    let candidate = sender.merkletree.without(lock.lockhash()).ok_or(BalanceProofError::UnknownLock(lock.secrethash))?;
    if received.locksroot != candidate.root() {
        return Err(BalanceProofError::LocksrootMismatch);
    }

    let current = current_transferred_and_locked(sender);
    if received.transferred_amount != current.0 {
        return Err(BalanceProofError::TransferredAmountChanged);
    }
    let expected_locked = current.1.checked_sub(lock.amount).ok_or(BalanceProofError::AmountOverflow)?;
    if received.locked_amount != expected_locked {
        return Err(BalanceProofError::LockedAmountMismatch { expected: expected_locked, received: received.locked_amount });
    }

    Ok(candidate)
}

/// The fields of the original outgoing transfer a `RefundTransfer` is
/// checked against.
#[derive(Debug, Clone)]
pub struct OriginalTransfer {
    pub payment_identifier: u64,
    pub amount: U256,
    pub secrethash: H256,
    pub target: Address,
    pub expiration: u64,
    pub token: Address,
}

/// §4.B refund check: the locked-transfer check, plus agreement with the
/// original outgoing transfer and a sender who is not that transfer's
/// target (a refund from the target would be nonsensical — it already holds
/// the secret).
#[allow(clippy::too_many_arguments)]
pub fn validate_refund_transfer(
    received: &BalanceProofState,
    channel: &ChannelState,
    sender: &EndState,
    receiver: &EndState,
    lock: &Lock,
    refund_sender: Address,
    original: &OriginalTransfer,
    refund_payment_identifier: u64,
    refund_target: Address,
    refund_token: Address,
) -> ValidationResult {
    let candidate = validate_locked_transfer(received, channel, sender, receiver, lock)?;

    if refund_payment_identifier != original.payment_identifier {
        return Err(BalanceProofError::RefundMismatch("payment_identifier"));
    }
    if lock.amount != original.amount {
        return Err(BalanceProofError::RefundMismatch("amount"));
    }
    if lock.secrethash != original.secrethash {
        return Err(BalanceProofError::RefundMismatch("secrethash"));
    }
    if refund_target != original.target {
        return Err(BalanceProofError::RefundMismatch("target"));
    }
    if lock.expiration != original.expiration {
        return Err(BalanceProofError::RefundMismatch("expiration"));
    }
    if refund_token != original.token {
        return Err(BalanceProofError::RefundMismatch("token"));
    }
    if refund_sender == original.target {
        return Err(BalanceProofError::RefundFromOriginalTarget);
    }

    Ok(candidate)
}

fn current_transferred_and_locked(end_state: &EndState) -> (U256, U256) {
    match &end_state.balance_proof {
        Some(proof) => (proof.transferred_amount, proof.locked_amount),
        None => (U256::zero(), U256::zero()),
    }
}
