use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use rand::rngs::mock::StepRng;

use netchannel_core::accounting::{balance, distributable};
use netchannel_core::balance_proof::{hash_balance_data, pack_balance_proof, BalanceProofState};
use netchannel_core::constants::EMPTY_ROOT;
use netchannel_core::crypto::{keccak256, sign};
use netchannel_core::events::Event;
use netchannel_core::identity::ChannelIdentity;
use netchannel_core::lifecycle::{events_for_expired_lock, events_for_locked_transfer, register_offchain_secret};
use netchannel_core::lock::Lock;
use netchannel_core::state::{ChannelState, EndState};
use netchannel_core::state_change::{MessageReceipt, StateChange};
use netchannel_core::status::{status, ChannelStatus};
use netchannel_core::transition::{receive_message, state_transition};

fn identity() -> ChannelIdentity {
    ChannelIdentity::new(U256::one(), Address::repeat_byte(0x99), U256::from(7))
}

fn open_channel(our_deposit: u64, partner_address: Address, partner_deposit: u64) -> ChannelState {
    let our = EndState::new(Address::repeat_byte(0x11), U256::from(our_deposit));
    let partner = EndState::new(partner_address, U256::from(partner_deposit));
    ChannelState::new(identity(), our, partner, Address::repeat_byte(0x55), 5, 10, U256::zero()).unwrap()
}

fn sign_proof(nonce: U256, transferred: U256, locked: U256, locksroot: H256, wallet: &LocalWallet) -> BalanceProofState {
    let balance_hash = hash_balance_data(transferred, locked, locksroot);
    let message_hash = H256::zero();
    let packed = pack_balance_proof(nonce, balance_hash, message_hash, identity());
    let signature = sign(&packed, wallet);
    let mut signature_bytes = [0u8; 65];
    signature_bytes.copy_from_slice(&signature.to_vec());
    BalanceProofState {
        nonce,
        transferred_amount: transferred,
        locked_amount: locked,
        locksroot,
        channel_identity: identity(),
        message_hash,
        signature: Some(signature_bytes),
    }
}

/// Boundary scenarios 1 and 3: an outgoing locked transfer (our deposit 100,
/// partner 0) followed by its expiry once nobody claims the secret.
#[test]
fn test_outgoing_locked_transfer_then_expiry() {
    let mut channel = open_channel(100, Address::repeat_byte(0x22), 0);
    let mut rng = StepRng::new(1, 1);
    let secrethash = H256::repeat_byte(0xaa);
    let lock = Lock::new(U256::from(30), 50, secrethash);

    let events = events_for_locked_transfer(&mut channel, lock, &mut rng);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::SendLockedTransfer { .. }));

    let proof = channel.our_state.balance_proof.clone().unwrap();
    assert_eq!(proof.nonce, U256::one());
    assert_eq!(proof.transferred_amount, U256::zero());
    assert_eq!(proof.locked_amount, U256::from(30));
    assert_eq!(proof.locksroot, channel.our_state.merkletree.root());
    assert!(channel.our_state.locked_locks.contains_key(&secrethash));
    assert_eq!(distributable(&channel.our_state, &channel.partner_state), U256::from(70));

    let (next, events) = state_transition(channel, StateChange::Block { block_number: 1 }, 1, H256::zero(), &mut rng);
    let mut channel = next.expect("channel survives a plain block tick");
    assert!(events.is_empty());

    let events = events_for_expired_lock(&mut channel, lock, &mut rng);
    assert_eq!(events.len(), 1);
    match &events[0] {
        Event::SendLockExpired { balance_proof, .. } => {
            assert_eq!(balance_proof.nonce, U256::from(2));
            assert_eq!(balance_proof.locked_amount, U256::zero());
            assert_eq!(balance_proof.transferred_amount, U256::zero());
            assert_eq!(balance_proof.locksroot, EMPTY_ROOT);
        }
        other => panic!("expected SendLockExpired, got {other:?}"),
    }
    assert!(!channel.our_state.locked_locks.contains_key(&secrethash));
}

/// Boundary scenarios 2 and 4: partner sends us a locked transfer, reveals
/// the secret, then unlocks; replaying the same unlock is rejected.
#[test]
fn test_incoming_locked_transfer_then_unlock_then_replay_is_rejected() {
    let wallet = LocalWallet::new(&mut rand::thread_rng());
    let partner_address = wallet.address();
    let mut channel = open_channel(0, partner_address, 100);

    let secret = H256::repeat_byte(0xbb);
    let secrethash = keccak256(secret.as_bytes());
    let lock = Lock::new(U256::from(30), 50, secrethash);

    let candidate = channel.partner_state.merkletree.with(lock.lockhash()).unwrap();
    let locked_proof = sign_proof(U256::one(), U256::zero(), U256::from(30), candidate.root(), &wallet);

    let events =
        receive_message(&mut channel, MessageReceipt::ReceiveLockedTransfer { balance_proof: locked_proof, lock, message_identifier: 1 });
    assert!(matches!(events[0], Event::SendProcessed { .. }));
    assert!(channel.partner_state.locked_locks.contains_key(&secrethash));

    register_offchain_secret(&mut channel, secret, secrethash);
    assert!(channel.partner_state.unlocked_locks.contains_key(&secrethash));

    let unlock_proof = sign_proof(U256::from(2), U256::from(30), U256::zero(), EMPTY_ROOT, &wallet);
    let events = receive_message(
        &mut channel,
        MessageReceipt::ReceiveUnlock { balance_proof: unlock_proof.clone(), lock, message_identifier: 2 },
    );
    assert!(matches!(events[0], Event::SendProcessed { .. }));
    assert!(!channel.partner_state.locked_locks.contains_key(&secrethash));
    assert!(!channel.partner_state.unlocked_locks.contains_key(&secrethash));
    assert_eq!(balance(&channel.our_state, &channel.partner_state), U256::from(30));
    assert_eq!(balance(&channel.partner_state, &channel.our_state), U256::from(70));

    let events =
        receive_message(&mut channel, MessageReceipt::ReceiveUnlock { balance_proof: unlock_proof, lock, message_identifier: 3 });
    match &events[0] {
        Event::EventInvalidReceivedUnlock { reason } => assert!(reason.contains("nonce"), "reason was: {reason}"),
        other => panic!("expected EventInvalidReceivedUnlock, got {other:?}"),
    }
    assert_eq!(channel.partner_state.balance_proof.as_ref().unwrap().nonce, U256::from(2));
}

/// Boundary scenario 5: closing, then a block past the settle timeout
/// auto-triggers settlement.
#[test]
fn test_settlement_auto_triggers_after_close_and_settle_timeout() {
    let channel = open_channel(0, Address::repeat_byte(0x22), 0);
    let mut rng = StepRng::new(7, 7);
    let settle_timeout = channel.settle_timeout;

    let (next, events) = state_transition(channel, StateChange::ActionChannelClose, 10, H256::zero(), &mut rng);
    let channel = next.unwrap();
    assert_eq!(events.len(), 1);

    let (next, events) = state_transition(
        channel,
        StateChange::ContractReceiveChannelClosed { closing_participant: Address::repeat_byte(0x11), block_number: 10 },
        10,
        H256::zero(),
        &mut rng,
    );
    let channel = next.unwrap();
    assert!(events.is_empty());
    assert_eq!(status(&channel), ChannelStatus::Closed);

    let (next, events) =
        state_transition(channel, StateChange::Block { block_number: 10 + settle_timeout + 1 }, 10 + settle_timeout + 1, H256::zero(), &mut rng);
    let channel = next.unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::ContractSendChannelSettle { .. }));
    assert!(channel.settle_transaction.as_ref().unwrap().finished_block_number.is_none());
    assert_eq!(status(&channel), ChannelStatus::Settling);
}

/// Boundary scenario 6: settlement with non-empty locksroots, followed by a
/// batch unlock for each side, disposes of the channel.
#[test]
fn test_batch_unlock_for_both_sides_disposes_the_channel() {
    let channel = open_channel(0, Address::repeat_byte(0x22), 0);
    let mut rng = StepRng::new(3, 3);

    let (next, events) = state_transition(
        channel,
        StateChange::ContractReceiveChannelSettled {
            block_number: 2,
            our_onchain_locksroot: H256::repeat_byte(1),
            partner_onchain_locksroot: H256::repeat_byte(2),
        },
        2,
        H256::zero(),
        &mut rng,
    );
    let channel = next.expect("channel survives settlement with non-empty locksroots");
    assert_eq!(events.len(), 2);

    let (next, _) =
        state_transition(channel, StateChange::ContractReceiveChannelBatchUnlock { participant: Address::repeat_byte(0x11) }, 3, H256::zero(), &mut rng);
    let channel = next.expect("one side cleared is not enough to dispose the channel");

    let (next, _) =
        state_transition(channel, StateChange::ContractReceiveChannelBatchUnlock { participant: Address::repeat_byte(0x22) }, 4, H256::zero(), &mut rng);
    assert!(next.is_none());
}
