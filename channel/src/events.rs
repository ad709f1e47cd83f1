use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::balance_proof::BalanceProofState;
use crate::identity::ChannelIdentity;

/// Everything `state_transition` and the message-receipt handlers can
/// produce: messages to send, on-chain transactions to submit, and
/// diagnostics for messages that failed validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SendLockedTransfer { recipient: Address, message_identifier: u64, balance_proof: BalanceProofState },
    SendBalanceProof { recipient: Address, message_identifier: u64, balance_proof: BalanceProofState },
    SendLockExpired { recipient: Address, message_identifier: u64, balance_proof: BalanceProofState, secrethash: H256 },
    SendRefundTransfer { recipient: Address, message_identifier: u64, balance_proof: BalanceProofState },
    SendWithdrawRequest { recipient: Address, message_identifier: u64, total_withdraw: U256, expiration: u64 },
    SendWithdraw { recipient: Address, message_identifier: u64, total_withdraw: U256 },
    SendProcessed { recipient: Address, message_identifier: u64 },

    ContractSendChannelClose { channel_identity: ChannelIdentity, balance_proof: Option<BalanceProofState> },
    ContractSendChannelSettle { channel_identity: ChannelIdentity },
    ContractSendChannelUpdateTransfer { channel_identity: ChannelIdentity, balance_proof: BalanceProofState },
    ContractSendChannelBatchUnlock { channel_identity: ChannelIdentity, participant: Address },

    EventInvalidReceivedLockedTransfer { reason: String },
    EventInvalidReceivedUnlock { reason: String },
    EventInvalidReceivedLockExpired { reason: String },
    EventInvalidReceivedTransferRefund { reason: String },
    EventInvalidReceivedWithdrawRequest { reason: String },
}

impl Event {
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Event::EventInvalidReceivedLockedTransfer { .. }
                | Event::EventInvalidReceivedUnlock { .. }
                | Event::EventInvalidReceivedLockExpired { .. }
                | Event::EventInvalidReceivedTransferRefund { .. }
                | Event::EventInvalidReceivedWithdrawRequest { .. }
        )
    }
}
