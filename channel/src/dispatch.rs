use ethers::types::H256;
use netchannel_common::metrics::{EVENTS_EMITTED, INVALID_MESSAGES};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::events::Event;
use crate::state::ChannelState;
use crate::state_change::{MessageReceipt, StateChange};
use crate::transition::{receive_message, state_transition};

fn record_events(events: &[Event]) {
    EVENTS_EMITTED.inc_by(events.len() as f64);
    let invalid = events.iter().filter(|event| event.is_diagnostic()).count();
    if invalid > 0 {
        INVALID_MESSAGES.inc_by(invalid as f64);
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("channel actor has shut down")]
    ActorGone,
}

enum Request {
    Apply { change: StateChange, block_number: u64, block_hash: H256, response: oneshot::Sender<Vec<Event>> },
    Receive { receipt: MessageReceipt, response: oneshot::Sender<Vec<Event>> },
}

/// Owns a single [`ChannelState`] and serializes every mutation through one
/// mpsc queue, grounded on the teacher's `ChannelOperationHandler`: a single
/// task draining a channel of requests keeps the nonce sequence from racing
/// across concurrent callers. `state_transition` and `receive_message`
/// themselves stay synchronous and untouched by tokio. Every batch of
/// emitted events is counted against `EVENTS_EMITTED`/`INVALID_MESSAGES` here,
/// the one place both request kinds funnel through.
pub struct ChannelDispatcher {
    request_tx: mpsc::Sender<Request>,
}

impl ChannelDispatcher {
    pub fn spawn(channel: ChannelState) -> Self {
        let (request_tx, mut request_rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut channel = Some(channel);
            let mut rng = StdRng::from_entropy();

            while let Some(request) = request_rx.recv().await {
                let Some(current) = channel.take() else {
                    log::warn!("channel actor dropped a request after the channel was disposed");
                    continue;
                };

                match request {
                    Request::Apply { change, block_number, block_hash, response } => {
                        let (next, events) = state_transition(current, change, block_number, block_hash, &mut rng);
                        record_events(&events);
                        channel = next;
                        let _ = response.send(events);
                    }
                    Request::Receive { receipt, response } => {
                        let mut current = current;
                        let events = receive_message(&mut current, receipt);
                        record_events(&events);
                        channel = Some(current);
                        let _ = response.send(events);
                    }
                }
            }
        });

        Self { request_tx }
    }

    pub async fn apply(&self, change: StateChange, block_number: u64, block_hash: H256) -> Result<Vec<Event>, DispatchError> {
        let (response, response_rx) = oneshot::channel();
        self.request_tx
            .send(Request::Apply { change, block_number, block_hash, response })
            .await
            .map_err(|_| DispatchError::ActorGone)?;
        response_rx.await.map_err(|_| DispatchError::ActorGone)
    }

    pub async fn receive(&self, receipt: MessageReceipt) -> Result<Vec<Event>, DispatchError> {
        let (response, response_rx) = oneshot::channel();
        self.request_tx.send(Request::Receive { receipt, response }).await.map_err(|_| DispatchError::ActorGone)?;
        response_rx.await.map_err(|_| DispatchError::ActorGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_test_channel;

    #[tokio::test]
    async fn test_block_tick_round_trips_through_the_actor() {
        let dispatcher = ChannelDispatcher::spawn(open_test_channel());
        let events = dispatcher.apply(StateChange::Block { block_number: 1 }, 1, H256::zero()).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_close_then_settle_disposes_the_actor_state() {
        let dispatcher = ChannelDispatcher::spawn(open_test_channel());
        let events = dispatcher.apply(StateChange::ActionChannelClose, 1, H256::zero()).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_records_emitted_event_count() {
        let before = EVENTS_EMITTED.get();
        let dispatcher = ChannelDispatcher::spawn(open_test_channel());
        dispatcher.apply(StateChange::ActionChannelClose, 1, H256::zero()).await.unwrap();
        assert!(EVENTS_EMITTED.get() >= before + 1.0);
    }
}
