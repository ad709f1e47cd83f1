use ethers::types::{H256, U256};
use rand::RngCore;

use crate::balance_proof::BalanceProofState;
use crate::events::Event;
use crate::lock::Lock;
use crate::state::ChannelState;
use crate::status::{status, ChannelStatus};

/// Message-kind tag mixed into a message's `additional_hash`, mirroring how
/// the wire format distinguishes otherwise-identical balance-proof payloads
/// by message kind.
const CMD_ID_LOCK_EXPIRED: u8 = 13;

/// §4.C `register_offchain_secret`: moves the lock from `locked_locks` to
/// `unlocked_locks` on both end-states. Idempotent — already-unlocked locks
/// are left alone.
pub fn register_offchain_secret(channel: &mut ChannelState, secret: H256, secrethash: H256) {
    move_to_unlocked(&mut channel.our_state.locked_locks, &mut channel.our_state.unlocked_locks, secrethash, secret);
    move_to_unlocked(&mut channel.partner_state.locked_locks, &mut channel.partner_state.unlocked_locks, secrethash, secret);
}

fn move_to_unlocked(
    locked: &mut std::collections::HashMap<H256, Lock>,
    unlocked: &mut std::collections::HashMap<H256, (Lock, H256)>,
    secrethash: H256,
    secret: H256,
) {
    if unlocked.contains_key(&secrethash) {
        return;
    }
    if let Some(lock) = locked.remove(&secrethash) {
        unlocked.insert(secrethash, (lock, secret));
    }
}

/// §4.C `register_onchain_secret`: a reveal observed on-chain at
/// `reveal_block`. Ignored if the lock had already expired before the
/// chain confirmed the reveal. `delete_lock` controls whether the lock is
/// also evicted from the other two maps, or kept visible so an in-flight
/// off-chain unlock can still validate.
pub fn register_onchain_secret(
    channel: &mut ChannelState,
    secret: H256,
    secrethash: H256,
    reveal_block: u64,
    delete_lock: bool,
) {
    let expiration = channel
        .our_state
        .get_lock(secrethash)
        .or_else(|| channel.partner_state.get_lock(secrethash))
        .map(|lock| lock.expiration);

    let Some(expiration) = expiration else { return };
    if expiration < reveal_block {
        return;
    }

    move_to_onchain(&mut channel.our_state, secrethash, secret, delete_lock);
    move_to_onchain(&mut channel.partner_state, secrethash, secret, delete_lock);
}

fn move_to_onchain(end_state: &mut crate::state::EndState, secrethash: H256, secret: H256, delete_lock: bool) {
    let lock = end_state
        .locked_locks
        .get(&secrethash)
        .copied()
        .or_else(|| end_state.unlocked_locks.get(&secrethash).map(|(lock, _)| *lock));

    let Some(lock) = lock else { return };

    end_state.onchain_unlocked_locks.entry(secrethash).or_insert((lock, secret));

    if delete_lock {
        end_state.locked_locks.remove(&secrethash);
        end_state.unlocked_locks.remove(&secrethash);
    }
}

/// §4.C `events_for_expired_lock`: only callable while the channel is
/// `OPENED`. Builds a fresh `SendLockExpired` balance proof, commits it to
/// `our_state`, and evicts the lock from the off-chain maps (but never from
/// `onchain_unlocked_locks` — an on-chain reveal always wins).
pub fn events_for_expired_lock(channel: &mut ChannelState, lock: Lock, message_identifier_rng: &mut impl RngCore) -> Vec<Event> {
    assert_eq!(status(channel), ChannelStatus::Opened, "events_for_expired_lock called on a non-open channel");

    let Some(candidate_tree) = channel.our_state.merkletree.without(lock.lockhash()) else {
        return vec![Event::EventInvalidReceivedLockExpired { reason: "lock not present on our side".to_string() }];
    };

    let current = channel.our_state.balance_proof.as_ref();
    let transferred_amount = current.map(|p| p.transferred_amount).unwrap_or_else(ethers::types::U256::zero);
    let locked_amount = current.map(|p| p.locked_amount).unwrap_or_else(ethers::types::U256::zero) - lock.amount;
    let locksroot = candidate_tree.root();

    let message_identifier = message_identifier_rng.next_u64();
    let message_hash = lock_expired_message_hash(message_identifier, lock.secrethash);

    let balance_proof = BalanceProofState {
        nonce: channel.our_state.next_nonce(),
        transferred_amount,
        locked_amount,
        locksroot,
        channel_identity: channel.identity,
        message_hash,
        signature: None,
    };

    channel.our_state.merkletree = candidate_tree;
    channel.our_state.locked_locks.remove(&lock.secrethash);
    channel.our_state.unlocked_locks.remove(&lock.secrethash);
    channel.our_state.balance_proof = Some(balance_proof.clone());

    vec![Event::SendLockExpired {
        recipient: channel.partner_state.address,
        message_identifier,
        balance_proof,
        secrethash: lock.secrethash,
    }]
}

/// Constructs and commits a new outgoing locked transfer from `our_state` —
/// the sending counterpart to `events_for_expired_lock`. Only callable while
/// `OPENED`; a lock that would exceed `distributable` or collide with an
/// already-pending lockhash is a caller-precondition failure (§7.2) reported
/// as a diagnostic rather than silently dropped.
pub fn events_for_locked_transfer(channel: &mut ChannelState, lock: Lock, message_identifier_rng: &mut impl RngCore) -> Vec<Event> {
    assert_eq!(status(channel), ChannelStatus::Opened, "events_for_locked_transfer called on a non-open channel");

    let limit = crate::accounting::distributable(&channel.our_state, &channel.partner_state);
    if lock.amount > limit {
        return vec![Event::EventInvalidReceivedLockedTransfer {
            reason: format!("amount {} exceeds distributable {}", lock.amount, limit),
        }];
    }

    let Some(candidate_tree) = channel.our_state.merkletree.with(lock.lockhash()) else {
        return vec![Event::EventInvalidReceivedLockedTransfer { reason: "lock already pending on our side".to_string() }];
    };

    let current = channel.our_state.balance_proof.as_ref();
    let transferred_amount = current.map(|p| p.transferred_amount).unwrap_or_else(U256::zero);
    let locked_amount = current.map(|p| p.locked_amount).unwrap_or_else(U256::zero) + lock.amount;
    let locksroot = candidate_tree.root();

    let message_identifier = message_identifier_rng.next_u64();
    let balance_proof = BalanceProofState {
        nonce: channel.our_state.next_nonce(),
        transferred_amount,
        locked_amount,
        locksroot,
        channel_identity: channel.identity,
        message_hash: H256::zero(),
        signature: None,
    };

    channel.our_state.merkletree = candidate_tree;
    channel.our_state.locked_locks.insert(lock.secrethash, lock);
    channel.our_state.balance_proof = Some(balance_proof.clone());

    vec![Event::SendLockedTransfer { recipient: channel.partner_state.address, message_identifier, balance_proof }]
}

/// Constructs and commits our own outgoing `Unlock`, moving `secrethash`'s
/// amount from locked to transferred on `our_state`. Requires the secret to
/// already be registered on our side via `register_offchain_secret` or
/// `register_onchain_secret`.
pub fn events_for_unlock(channel: &mut ChannelState, secrethash: H256, message_identifier_rng: &mut impl RngCore) -> Vec<Event> {
    assert_eq!(status(channel), ChannelStatus::Opened, "events_for_unlock called on a non-open channel");

    let Some((lock, _secret)) = channel.our_state.unlocked_locks.get(&secrethash).copied() else {
        return vec![Event::EventInvalidReceivedUnlock { reason: "no registered secret for this lock on our side".to_string() }];
    };

    let candidate_tree = match channel.our_state.merkletree.without(lock.lockhash()) {
        Some(tree) => tree,
        None => return vec![Event::EventInvalidReceivedUnlock { reason: "lock not present in our merkle tree".to_string() }],
    };

    let current = channel.our_state.balance_proof.as_ref();
    let transferred_amount = current.map(|p| p.transferred_amount).unwrap_or_else(U256::zero) + lock.amount;
    let locked_amount = current.map(|p| p.locked_amount).unwrap_or_else(U256::zero) - lock.amount;
    let locksroot = candidate_tree.root();

    let message_identifier = message_identifier_rng.next_u64();
    let balance_proof = BalanceProofState {
        nonce: channel.our_state.next_nonce(),
        transferred_amount,
        locked_amount,
        locksroot,
        channel_identity: channel.identity,
        message_hash: H256::zero(),
        signature: None,
    };

    channel.our_state.merkletree = candidate_tree;
    channel.our_state.locked_locks.remove(&secrethash);
    channel.our_state.unlocked_locks.remove(&secrethash);
    channel.our_state.balance_proof = Some(balance_proof.clone());

    vec![Event::SendBalanceProof { recipient: channel.partner_state.address, message_identifier, balance_proof }]
}

fn lock_expired_message_hash(message_identifier: u64, secrethash: H256) -> H256 {
    let mut buf = Vec::with_capacity(1 + 8 + 32);
    buf.push(CMD_ID_LOCK_EXPIRED);
    buf.extend_from_slice(&message_identifier.to_be_bytes());
    buf.extend_from_slice(secrethash.as_bytes());
    crate::crypto::keccak256(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_test_channel;
    use ethers::types::U256;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_register_offchain_secret_moves_lock() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(10), 100, H256::repeat_byte(5));
        channel.our_state.locked_locks.insert(lock.secrethash, lock);

        register_offchain_secret(&mut channel, H256::repeat_byte(0xaa), lock.secrethash);

        assert!(!channel.our_state.locked_locks.contains_key(&lock.secrethash));
        assert!(channel.our_state.unlocked_locks.contains_key(&lock.secrethash));
    }

    #[test]
    fn test_register_offchain_secret_is_idempotent() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(10), 100, H256::repeat_byte(5));
        channel.our_state.unlocked_locks.insert(lock.secrethash, (lock, H256::repeat_byte(0xaa)));

        register_offchain_secret(&mut channel, H256::repeat_byte(0xbb), lock.secrethash);

        assert_eq!(channel.our_state.unlocked_locks.get(&lock.secrethash).unwrap().1, H256::repeat_byte(0xaa));
    }

    #[test]
    fn test_register_onchain_secret_ignores_reveal_after_expiration() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(10), 100, H256::repeat_byte(5));
        channel.our_state.locked_locks.insert(lock.secrethash, lock);

        register_onchain_secret(&mut channel, H256::repeat_byte(0xaa), lock.secrethash, 150, true);

        assert!(channel.our_state.onchain_unlocked_locks.is_empty());
        assert!(channel.our_state.locked_locks.contains_key(&lock.secrethash));
    }

    #[test]
    fn test_register_onchain_secret_deletes_when_requested() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(10), 100, H256::repeat_byte(5));
        channel.our_state.locked_locks.insert(lock.secrethash, lock);

        register_onchain_secret(&mut channel, H256::repeat_byte(0xaa), lock.secrethash, 90, true);

        assert!(channel.our_state.onchain_unlocked_locks.contains_key(&lock.secrethash));
        assert!(!channel.our_state.locked_locks.contains_key(&lock.secrethash));
    }

    #[test]
    fn test_events_for_expired_lock_evicts_and_emits() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(30), 150, H256::repeat_byte(5));
        channel.our_state.merkletree = channel.our_state.merkletree.with(lock.lockhash()).unwrap();
        channel.our_state.locked_locks.insert(lock.secrethash, lock);

        let mut rng = StepRng::new(1, 1);
        let events = events_for_expired_lock(&mut channel, lock, &mut rng);

        assert_eq!(events.len(), 1);
        assert!(!channel.our_state.locked_locks.contains_key(&lock.secrethash));
        assert_eq!(channel.our_state.merkletree.root(), crate::constants::EMPTY_ROOT);
    }

    #[test]
    fn test_events_for_locked_transfer_commits_first_proof() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(30), 150, H256::repeat_byte(6));
        let mut rng = StepRng::new(1, 1);

        let events = events_for_locked_transfer(&mut channel, lock, &mut rng);

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::SendLockedTransfer { .. }));
        let proof = channel.our_state.balance_proof.as_ref().unwrap();
        assert_eq!(proof.nonce, U256::one());
        assert_eq!(proof.locked_amount, U256::from(30));
        assert!(channel.our_state.locked_locks.contains_key(&lock.secrethash));
    }

    #[test]
    fn test_events_for_locked_transfer_rejects_amount_over_distributable() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(1_000), 150, H256::repeat_byte(6));
        let mut rng = StepRng::new(1, 1);

        let events = events_for_locked_transfer(&mut channel, lock, &mut rng);

        assert!(matches!(events[0], Event::EventInvalidReceivedLockedTransfer { .. }));
        assert!(channel.our_state.balance_proof.is_none());
    }

    #[test]
    fn test_events_for_unlock_moves_amount_to_transferred() {
        let mut channel = open_test_channel();
        let lock = Lock::new(U256::from(30), 150, H256::repeat_byte(6));
        let mut rng = StepRng::new(1, 1);
        events_for_locked_transfer(&mut channel, lock, &mut rng);
        register_offchain_secret(&mut channel, H256::repeat_byte(0xcc), lock.secrethash);

        let events = events_for_unlock(&mut channel, lock.secrethash, &mut rng);

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::SendBalanceProof { .. }));
        let proof = channel.our_state.balance_proof.as_ref().unwrap();
        assert_eq!(proof.nonce, U256::from(2));
        assert_eq!(proof.transferred_amount, U256::from(30));
        assert_eq!(proof.locked_amount, U256::zero());
        assert!(!channel.our_state.unlocked_locks.contains_key(&lock.secrethash));
    }
}
