use ethers::types::{Address, H256, U256};

use crate::balance_proof::BalanceProofState;
use crate::lock::Lock;

/// §4.E: the inbound changes `state_transition` dispatches over. Dispatch
/// is an exhaustive `match`, not a chain of type checks — the compiler
/// enforces that every variant is handled, which is what rules out the
/// `ActionChannelWithdraw` misrouting this is grounded against (§9).
#[derive(Debug, Clone)]
pub enum StateChange {
    Block { block_number: u64 },
    ActionChannelClose,
    ActionChannelSetFee { mediation_fee: U256 },
    ActionChannelWithdraw { total_withdraw: U256 },
    ContractReceiveChannelClosed { closing_participant: Address, block_number: u64 },
    ContractReceiveUpdateTransfer { block_number: u64 },
    ContractReceiveChannelSettled {
        block_number: u64,
        our_onchain_locksroot: H256,
        partner_onchain_locksroot: H256,
    },
    ContractReceiveChannelNewBalance { participant: Address, contract_balance: U256, block_number: u64 },
    ContractReceiveChannelBatchUnlock { participant: Address },
    ReceiveWithdrawRequest {
        sender: Address,
        total_withdraw: U256,
        expiration: u64,
        message_identifier: u64,
        signature: [u8; 65],
        packed: Vec<u8>,
    },
}

/// Message receipts handled outside `state_transition` (§4.E, last
/// paragraph) but sharing its validate-then-commit shape.
#[derive(Debug, Clone)]
pub enum MessageReceipt {
    ReceiveLockedTransfer { balance_proof: BalanceProofState, lock: Lock, message_identifier: u64 },
    ReceiveUnlock { balance_proof: BalanceProofState, lock: Lock, message_identifier: u64 },
    ReceiveLockExpired { balance_proof: BalanceProofState, lock: Lock, message_identifier: u64, block_number: u64 },
    ReceiveTransferRefund {
        balance_proof: BalanceProofState,
        lock: Lock,
        message_identifier: u64,
        refund_sender: Address,
        original: crate::balance_proof::OriginalTransfer,
        refund_payment_identifier: u64,
        refund_target: Address,
        refund_token: Address,
    },
}
