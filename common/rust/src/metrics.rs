use lazy_static::lazy_static;
use prometheus::{register_counter, register_gauge, Counter, Gauge, Registry};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref CHANNELS_OPENED: Counter = register_counter!(
        "netchannel_channels_opened_total",
        "Number of channels opened"
    ).unwrap();

    pub static ref CHANNELS_CLOSED: Counter = register_counter!(
        "netchannel_channels_closed_total",
        "Number of channels closed"
    ).unwrap();

    pub static ref CHANNELS_ACTIVE: Gauge = register_gauge!(
        "netchannel_channels_active",
        "Number of channels currently open"
    ).unwrap();

    pub static ref EVENTS_EMITTED: Counter = register_counter!(
        "netchannel_events_emitted_total",
        "Number of events emitted by the transition dispatcher"
    ).unwrap();

    pub static ref INVALID_MESSAGES: Counter = register_counter!(
        "netchannel_invalid_messages_total",
        "Number of received messages rejected by validation"
    ).unwrap();
}

pub struct MetricsCollector {
    registry: Arc<Registry>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self { registry: Arc::new(Registry::new()) }
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn record_channel_opened(&self) {
        CHANNELS_OPENED.inc();
        CHANNELS_ACTIVE.inc();
    }

    pub fn record_channel_closed(&self) {
        CHANNELS_CLOSED.inc();
        CHANNELS_ACTIVE.dec();
    }

    pub fn record_events(&self, count: usize) {
        EVENTS_EMITTED.inc_by(count as f64);
    }

    pub fn record_invalid_message(&self) {
        INVALID_MESSAGES.inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
