use serde::{Deserialize, Serialize};

use crate::state::ChannelState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    Opened,
    Closing,
    Closed,
    Settling,
    Settled,
    Unusable,
}

/// Statuses from which closing the channel or requesting a withdraw are
/// still permitted.
pub const CHANNEL_STATES_PRIOR_TO_CLOSED: &[ChannelStatus] = &[ChannelStatus::Opened];

/// §4.D: status is a pure function of the transaction slots, settle taking
/// priority over close since a channel can only reach settlement after
/// having closed.
pub fn status(channel: &ChannelState) -> ChannelStatus {
    if let Some(settle) = &channel.settle_transaction {
        return if settle.is_successful() {
            ChannelStatus::Settled
        } else if settle.is_running() {
            ChannelStatus::Settling
        } else {
            ChannelStatus::Unusable
        };
    }

    if let Some(close) = &channel.close_transaction {
        return if close.is_successful() {
            ChannelStatus::Closed
        } else if close.is_running() {
            ChannelStatus::Closing
        } else {
            ChannelStatus::Unusable
        };
    }

    ChannelStatus::Opened
}

pub fn is_prior_to_closed(channel: &ChannelState) -> bool {
    CHANNEL_STATES_PRIOR_TO_CLOSED.contains(&status(channel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_test_channel;
    use crate::transaction::{TransactionExecutionStatus, TransactionResult};

    #[test]
    fn test_fresh_channel_is_opened() {
        assert_eq!(status(&open_test_channel()), ChannelStatus::Opened);
    }

    #[test]
    fn test_running_close_is_closing() {
        let mut channel = open_test_channel();
        channel.close_transaction = Some(TransactionExecutionStatus::started(10));
        assert_eq!(status(&channel), ChannelStatus::Closing);
    }

    #[test]
    fn test_successful_close_is_closed() {
        let mut channel = open_test_channel();
        let mut tx = TransactionExecutionStatus::started(10);
        tx.finish(12, TransactionResult::Success);
        channel.close_transaction = Some(tx);
        assert_eq!(status(&channel), ChannelStatus::Closed);
    }

    #[test]
    fn test_failed_close_is_unusable() {
        let mut channel = open_test_channel();
        let mut tx = TransactionExecutionStatus::started(10);
        tx.finish(12, TransactionResult::Failure);
        channel.close_transaction = Some(tx);
        assert_eq!(status(&channel), ChannelStatus::Unusable);
    }

    #[test]
    fn test_settle_takes_priority_over_close() {
        let mut channel = open_test_channel();
        let mut closed = TransactionExecutionStatus::started(10);
        closed.finish(12, TransactionResult::Success);
        channel.close_transaction = Some(closed);
        channel.settle_transaction = Some(TransactionExecutionStatus::started(50));
        assert_eq!(status(&channel), ChannelStatus::Settling);
    }
}
