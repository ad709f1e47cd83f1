use std::cmp::Reverse;

use ethers::types::{Address, H256, U256};
use rand::RngCore;

use crate::constants::{DEFAULT_CONFIRMATIONS, EMPTY_ROOT};
use crate::crypto::recover;
use crate::events::Event;
use crate::state::{ChannelState, QueuedDeposit};
use crate::state_change::{MessageReceipt, StateChange};
use crate::status::{is_prior_to_closed, status, ChannelStatus};
use crate::transaction::{TransactionExecutionStatus, TransactionResult};

/// §4.E entry point. Dispatch is an exhaustive `match` over [`StateChange`]:
/// every variant has its own arm and its own handler parameter, so the
/// `ActionChannelWithdraw` misrouting this is grounded against — the source
/// threading the withdraw state change through a parameter named `close` —
/// cannot recur here; it would be a compile error.
pub fn state_transition(
    mut channel: ChannelState,
    change: StateChange,
    block_number: u64,
    _block_hash: H256,
    rng: &mut impl RngCore,
) -> (Option<ChannelState>, Vec<Event>) {
    match change {
        StateChange::Block { block_number } => {
            let events = handle_block(&mut channel, block_number);
            (Some(channel), events)
        }
        StateChange::ActionChannelClose => {
            let events = handle_action_channel_close(&mut channel, block_number);
            (Some(channel), events)
        }
        StateChange::ActionChannelSetFee { mediation_fee } => {
            channel.mediation_fee = mediation_fee;
            (Some(channel), Vec::new())
        }
        StateChange::ActionChannelWithdraw { total_withdraw } => {
            let events = handle_action_channel_withdraw(&mut channel, total_withdraw, block_number, rng);
            (Some(channel), events)
        }
        StateChange::ContractReceiveChannelClosed { closing_participant, block_number } => {
            let events = handle_contract_receive_channel_closed(&mut channel, closing_participant, block_number, rng);
            (Some(channel), events)
        }
        StateChange::ContractReceiveUpdateTransfer { block_number } => {
            handle_contract_receive_update_transfer(&mut channel, block_number);
            (Some(channel), Vec::new())
        }
        StateChange::ContractReceiveChannelSettled { block_number, our_onchain_locksroot, partner_onchain_locksroot } => {
            handle_contract_receive_channel_settled(channel, block_number, our_onchain_locksroot, partner_onchain_locksroot)
        }
        StateChange::ContractReceiveChannelNewBalance { participant, contract_balance, block_number } => {
            handle_contract_receive_channel_new_balance(&mut channel, participant, contract_balance, block_number);
            (Some(channel), Vec::new())
        }
        StateChange::ContractReceiveChannelBatchUnlock { participant } => {
            handle_contract_receive_channel_batch_unlock(channel, participant)
        }
        StateChange::ReceiveWithdrawRequest { sender, total_withdraw, expiration, message_identifier, signature, packed } => {
            let events = handle_receive_withdraw_request(&mut channel, sender, total_withdraw, expiration, message_identifier, &signature, &packed);
            (Some(channel), events)
        }
    }
}

fn handle_block(channel: &mut ChannelState, block_number: u64) -> Vec<Event> {
    drain_confirmed_deposits(channel, block_number);

    let mut events = Vec::new();
    if status(channel) == ChannelStatus::Closed {
        if let Some(close) = &channel.close_transaction {
            if let Some(closed_block) = close.finished_block_number {
                if block_number > closed_block + channel.settle_timeout {
                    channel.settle_transaction = Some(TransactionExecutionStatus::started(block_number));
                    events.push(Event::ContractSendChannelSettle { channel_identity: channel.identity });
                }
            }
        }
    }
    events
}

fn drain_confirmed_deposits(channel: &mut ChannelState, block_number: u64) {
    while let Some(Reverse(deposit)) = channel.deposit_transaction_queue.peek() {
        if deposit.block_number + DEFAULT_CONFIRMATIONS > block_number {
            break;
        }
        let Reverse(deposit) = channel.deposit_transaction_queue.pop().unwrap();
        apply_deposit(channel, deposit);
    }
}

fn apply_deposit(channel: &mut ChannelState, deposit: QueuedDeposit) {
    if deposit.participant == channel.our_state.address {
        channel.our_state.contract_balance = deposit.contract_balance;
    } else if deposit.participant == channel.partner_state.address {
        channel.partner_state.contract_balance = deposit.contract_balance;
    }
}

fn handle_action_channel_close(channel: &mut ChannelState, block_number: u64) -> Vec<Event> {
    if !is_prior_to_closed(channel) {
        return Vec::new();
    }
    channel.close_transaction = Some(TransactionExecutionStatus::started(block_number));
    vec![Event::ContractSendChannelClose {
        channel_identity: channel.identity,
        balance_proof: channel.partner_state.balance_proof.clone(),
    }]
}

fn handle_action_channel_withdraw(
    channel: &mut ChannelState,
    total_withdraw: U256,
    block_number: u64,
    rng: &mut impl RngCore,
) -> Vec<Event> {
    let available = crate::accounting::balance(&channel.our_state, &channel.partner_state);
    if total_withdraw > available {
        return Vec::new();
    }
    let message_identifier = rng.next_u64();
    let expiration = block_number + channel.settle_timeout;
    vec![Event::SendWithdrawRequest {
        recipient: channel.partner_state.address,
        message_identifier,
        total_withdraw,
        expiration,
    }]
}

fn handle_contract_receive_channel_closed(
    channel: &mut ChannelState,
    closing_participant: Address,
    block_number: u64,
    rng: &mut impl RngCore,
) -> Vec<Event> {
    match &mut channel.close_transaction {
        Some(tx) if tx.is_running() => tx.finish(block_number, TransactionResult::Success),
        Some(_) => {}
        None => channel.close_transaction = Some({
            let mut tx = TransactionExecutionStatus::started(block_number);
            tx.finish(block_number, TransactionResult::Success);
            tx
        }),
    }

    let partner_closed_us = closing_participant == channel.partner_state.address;
    if partner_closed_us && channel.partner_state.balance_proof.is_some() && channel.update_transaction.is_none() {
        channel.update_transaction = Some(TransactionExecutionStatus::started(block_number));
        let _ = rng;
        return vec![Event::ContractSendChannelUpdateTransfer {
            channel_identity: channel.identity,
            balance_proof: channel.partner_state.balance_proof.clone().unwrap(),
        }];
    }
    Vec::new()
}

fn handle_contract_receive_update_transfer(channel: &mut ChannelState, block_number: u64) {
    if let Some(tx) = &mut channel.update_transaction {
        tx.finish(block_number, TransactionResult::Success);
    }
}

fn handle_contract_receive_channel_settled(
    mut channel: ChannelState,
    block_number: u64,
    our_onchain_locksroot: H256,
    partner_onchain_locksroot: H256,
) -> (Option<ChannelState>, Vec<Event>) {
    match &mut channel.settle_transaction {
        Some(tx) => tx.finish(block_number, TransactionResult::Success),
        None => {
            let mut tx = TransactionExecutionStatus::started(block_number);
            tx.finish(block_number, TransactionResult::Success);
            channel.settle_transaction = Some(tx);
        }
    }

    channel.our_state.onchain_locksroot = our_onchain_locksroot;
    channel.partner_state.onchain_locksroot = partner_onchain_locksroot;

    if our_onchain_locksroot == EMPTY_ROOT && partner_onchain_locksroot == EMPTY_ROOT {
        return (None, Vec::new());
    }

    let mut events = Vec::new();
    if our_onchain_locksroot != EMPTY_ROOT {
        events.push(Event::ContractSendChannelBatchUnlock { channel_identity: channel.identity, participant: channel.our_state.address });
    }
    if partner_onchain_locksroot != EMPTY_ROOT {
        events.push(Event::ContractSendChannelBatchUnlock { channel_identity: channel.identity, participant: channel.partner_state.address });
    }
    (Some(channel), events)
}

fn handle_contract_receive_channel_new_balance(channel: &mut ChannelState, participant: Address, contract_balance: U256, block_number: u64) {
    channel.deposit_transaction_queue.push(Reverse(QueuedDeposit { block_number, participant, contract_balance }));
}

fn handle_contract_receive_channel_batch_unlock(mut channel: ChannelState, participant: Address) -> (Option<ChannelState>, Vec<Event>) {
    if status(&channel) != ChannelStatus::Settled {
        return (Some(channel), Vec::new());
    }

    if participant == channel.our_state.address {
        channel.our_state.onchain_locksroot = EMPTY_ROOT;
    } else if participant == channel.partner_state.address {
        channel.partner_state.onchain_locksroot = EMPTY_ROOT;
    }

    if channel.our_state.onchain_locksroot == EMPTY_ROOT && channel.partner_state.onchain_locksroot == EMPTY_ROOT {
        return (None, Vec::new());
    }
    (Some(channel), Vec::new())
}

#[allow(clippy::too_many_arguments)]
fn handle_receive_withdraw_request(
    channel: &mut ChannelState,
    sender: Address,
    total_withdraw: U256,
    _expiration: u64,
    message_identifier: u64,
    signature: &[u8; 65],
    packed: &[u8],
) -> Vec<Event> {
    if sender != channel.partner_state.address {
        return vec![Event::EventInvalidReceivedWithdrawRequest { reason: "withdraw request sender is not our channel partner".into() }];
    }

    let recovered = match recover(packed, signature) {
        Ok(address) => address,
        Err(_) => return vec![Event::EventInvalidReceivedWithdrawRequest { reason: "signature does not recover".into() }],
    };
    if recovered != sender {
        return vec![Event::EventInvalidReceivedWithdrawRequest { reason: "signature does not match claimed sender".into() }];
    }

    // Strengthening over the source (§9 open question, resolved): require a
    // strictly increasing cumulative total so a replayed request for an
    // already-withdrawn amount cannot spuriously re-validate.
    if total_withdraw <= channel.partner_state.total_withdraw {
        return vec![Event::EventInvalidReceivedWithdrawRequest { reason: "total_withdraw does not exceed the already-confirmed total".into() }];
    }

    let requested_delta = total_withdraw - channel.partner_state.total_withdraw;
    let available = crate::accounting::balance(&channel.partner_state, &channel.our_state);
    if requested_delta > available {
        return vec![Event::EventInvalidReceivedWithdrawRequest { reason: "requested withdraw exceeds available balance".into() }];
    }

    channel.partner_state.total_withdraw = total_withdraw;
    vec![Event::SendWithdraw { recipient: sender, message_identifier, total_withdraw }]
}

/// Shared shape for `ReceiveLockedTransfer`/`ReceiveUnlock`/
/// `ReceiveLockExpired`/`ReceiveTransferRefund`: validate via §4.B, commit
/// the new balance proof and Merkle tree to `partner_state` in one step on
/// success, emit `SendProcessed`; on failure, leave state untouched and
/// emit the matching `EventInvalidReceived*`.
pub fn receive_message(channel: &mut ChannelState, receipt: MessageReceipt) -> Vec<Event> {
    match receipt {
        MessageReceipt::ReceiveLockedTransfer { balance_proof, lock, message_identifier } => {
            match crate::balance_proof::validate_locked_transfer(&balance_proof, channel, &channel.partner_state.clone(), &channel.our_state.clone(), &lock) {
                Ok(candidate) => {
                    channel.partner_state.merkletree = candidate;
                    channel.partner_state.locked_locks.insert(lock.secrethash, lock);
                    channel.partner_state.balance_proof = Some(balance_proof);
                    vec![Event::SendProcessed { recipient: channel.partner_state.address, message_identifier }]
                }
                Err(e) => vec![Event::EventInvalidReceivedLockedTransfer { reason: e.to_string() }],
            }
        }
        MessageReceipt::ReceiveUnlock { balance_proof, lock, message_identifier } => {
            match crate::balance_proof::validate_unlock(&balance_proof, channel, &channel.partner_state.clone(), &lock) {
                Ok(candidate) => {
                    channel.partner_state.merkletree = candidate;
                    channel.partner_state.locked_locks.remove(&lock.secrethash);
                    channel.partner_state.unlocked_locks.remove(&lock.secrethash);
                    channel.partner_state.balance_proof = Some(balance_proof);
                    vec![Event::SendProcessed { recipient: channel.partner_state.address, message_identifier }]
                }
                Err(e) => vec![Event::EventInvalidReceivedUnlock { reason: e.to_string() }],
            }
        }
        MessageReceipt::ReceiveLockExpired { balance_proof, lock, message_identifier, block_number } => {
            match crate::balance_proof::validate_lock_expired(&balance_proof, channel, &channel.partner_state.clone(), &lock, block_number, true) {
                Ok(candidate) => {
                    channel.partner_state.merkletree = candidate;
                    channel.partner_state.locked_locks.remove(&lock.secrethash);
                    channel.partner_state.unlocked_locks.remove(&lock.secrethash);
                    channel.partner_state.balance_proof = Some(balance_proof);
                    vec![Event::SendProcessed { recipient: channel.partner_state.address, message_identifier }]
                }
                Err(e) => vec![Event::EventInvalidReceivedLockExpired { reason: e.to_string() }],
            }
        }
        MessageReceipt::ReceiveTransferRefund {
            balance_proof,
            lock,
            message_identifier,
            refund_sender,
            original,
            refund_payment_identifier,
            refund_target,
            refund_token,
        } => {
            match crate::balance_proof::validate_refund_transfer(
                &balance_proof,
                channel,
                &channel.partner_state.clone(),
                &channel.our_state.clone(),
                &lock,
                refund_sender,
                &original,
                refund_payment_identifier,
                refund_target,
                refund_token,
            ) {
                Ok(candidate) => {
                    channel.partner_state.merkletree = candidate;
                    channel.partner_state.locked_locks.insert(lock.secrethash, lock);
                    channel.partner_state.balance_proof = Some(balance_proof);
                    vec![Event::SendProcessed { recipient: channel.partner_state.address, message_identifier }]
                }
                Err(e) => vec![Event::EventInvalidReceivedTransferRefund { reason: e.to_string() }],
            }
        }
    }
}
