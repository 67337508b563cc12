//! Consumer-side view of a node's telemetry
//!
//! [`TelemetryView`] is what a dashboard keeps while watching a node: the
//! latest light reading, a short newest-first history of button events and
//! the state of its own broker connection. The `monitor` binary feeds it
//! from a live broker; tests feed it directly.

use crate::protocol::{DecodeError, EdgeEvent, MessageCodec, Reading};
use crate::transport::InboundMessage;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Upper bound of a light reading as displayed
pub const LIGHT_MAX: i32 = 4096;

/// Button events kept by default
pub const DEFAULT_EVENT_HISTORY: usize = 25;

/// What one inbound message did to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    Reading(Reading),
    Edge(EdgeEvent),
    /// Topic is neither the light nor the button topic
    Ignored,
    /// Payload on a known topic failed to decode
    Rejected,
}

/// Connection state as shown to the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub last_error: Option<String>,
    pub last_message_at: Option<u64>,
}

/// Latest telemetry of one node
#[derive(Debug, Clone)]
pub struct TelemetryView {
    light_topic: String,
    button_topic: String,
    codec: MessageCodec,
    latest_reading: Option<Reading>,
    events: VecDeque<EdgeEvent>,
    history_limit: usize,
    status: ConnectionStatus,
    rejected: u64,
}

impl TelemetryView {
    pub fn new(light_topic: impl Into<String>, button_topic: impl Into<String>) -> Self {
        Self::with_history(light_topic, button_topic, DEFAULT_EVENT_HISTORY)
    }

    pub fn with_history(
        light_topic: impl Into<String>,
        button_topic: impl Into<String>,
        history_limit: usize,
    ) -> Self {
        let history_limit = history_limit.max(1);
        Self {
            light_topic: light_topic.into(),
            button_topic: button_topic.into(),
            codec: MessageCodec::default(),
            latest_reading: None,
            events: VecDeque::with_capacity(history_limit),
            history_limit,
            status: ConnectionStatus::default(),
            rejected: 0,
        }
    }

    pub fn light_topic(&self) -> &str {
        &self.light_topic
    }

    pub fn button_topic(&self) -> &str {
        &self.button_topic
    }

    /// Dispatch one message by topic; `received_at` is the local clock
    pub fn handle(&mut self, message: &InboundMessage, received_at: u64) -> ViewUpdate {
        let decoded = if message.topic == self.light_topic {
            self.codec
                .decode_reading(&message.payload)
                .map(|reading| self.record_reading(reading))
        } else if message.topic == self.button_topic {
            self.codec
                .decode_edge(&message.payload)
                .map(|event| self.record_edge(event))
        } else {
            debug!(topic = %message.topic, "Ignoring message on unwatched topic");
            return ViewUpdate::Ignored;
        };

        match decoded {
            Ok(update) => {
                self.status.last_message_at = Some(received_at);
                update
            }
            Err(e) => {
                self.reject(&message.topic, &e);
                ViewUpdate::Rejected
            }
        }
    }

    /// Store a reading, clamped into `0..=LIGHT_MAX`
    pub fn record_reading(&mut self, reading: Reading) -> ViewUpdate {
        let clamped = Reading {
            value: reading.value.clamp(0, LIGHT_MAX),
            ..reading
        };
        self.latest_reading = Some(clamped);
        ViewUpdate::Reading(clamped)
    }

    /// Push an event onto the history, evicting the oldest when full
    pub fn record_edge(&mut self, event: EdgeEvent) -> ViewUpdate {
        if self.events.len() == self.history_limit {
            self.events.pop_back();
        }
        self.events.push_front(event);
        ViewUpdate::Edge(event)
    }

    fn reject(&mut self, topic: &str, error: &DecodeError) {
        self.rejected += 1;
        warn!(topic = %topic, error = %error, "Failed to decode telemetry payload");
    }

    pub fn set_connected(&mut self) {
        self.status.connected = true;
        self.status.last_error = None;
    }

    pub fn set_disconnected(&mut self, error: Option<&str>) {
        self.status.connected = false;
        if let Some(error) = error {
            self.status.last_error = Some(error.to_string());
        }
    }

    pub fn latest_reading(&self) -> Option<Reading> {
        self.latest_reading
    }

    /// Events newest first
    pub fn recent_events(&self) -> impl Iterator<Item = &EdgeEvent> {
        self.events.iter()
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }
}
