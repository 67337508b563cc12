//! Message types exchanged between the node and the broker
//!
//! Domain values ([`Reading`], [`EdgeEvent`], [`Command`]) are kept apart
//! from the flat JSON wire shapes ([`ReadingPayload`], [`ButtonPayload`]),
//! so field naming on the wire can't leak into the core.

use crate::hardware::{ActuatorId, ActuatorState, Level};
use serde::{Deserialize, Serialize};

/// Wire field carrying a command's desired state
pub const STATE_FIELD: &str = "state";

/// One analog sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub value: i32,
    pub timestamp_millis: u64,
}

/// Direction of a debounced button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Pressed,
    Released,
}

impl EdgeKind {
    /// Edge produced by settling at `level`
    pub fn from_level(level: Level) -> Self {
        match level {
            Level::Active => EdgeKind::Pressed,
            Level::Inactive => EdgeKind::Released,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Pressed => "pressed",
            EdgeKind::Released => "released",
        }
    }
}

/// A debounced button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub kind: EdgeKind,
    pub timestamp_millis: u64,
}

/// Outbound telemetry, one variant per publish topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Telemetry {
    Reading(Reading),
    Edge(EdgeEvent),
}

/// Which publish topic a [`Telemetry`] value goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
    Light,
    Button,
}

impl Telemetry {
    pub fn kind(&self) -> TelemetryKind {
        match self {
            Telemetry::Reading(_) => TelemetryKind::Light,
            Telemetry::Edge(_) => TelemetryKind::Button,
        }
    }

    pub fn timestamp_millis(&self) -> u64 {
        match self {
            Telemetry::Reading(reading) => reading.timestamp_millis,
            Telemetry::Edge(event) => event.timestamp_millis,
        }
    }
}

/// A resolved remote command, ready to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub actuator_id: ActuatorId,
    pub desired_state: ActuatorState,
}

/// `{"light": <int>, "timestamp": <ms>}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPayload {
    pub light: i32,
    pub timestamp: u64,
}

impl From<&Reading> for ReadingPayload {
    fn from(reading: &Reading) -> Self {
        Self {
            light: reading.value,
            timestamp: reading.timestamp_millis,
        }
    }
}

impl From<ReadingPayload> for Reading {
    fn from(payload: ReadingPayload) -> Self {
        Self {
            value: payload.light,
            timestamp_millis: payload.timestamp,
        }
    }
}

/// `{"event": "pressed"|"released", "timestamp": <ms>}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonPayload {
    pub event: EdgeKind,
    pub timestamp: u64,
}

impl From<&EdgeEvent> for ButtonPayload {
    fn from(event: &EdgeEvent) -> Self {
        Self {
            event: event.kind,
            timestamp: event.timestamp_millis,
        }
    }
}

impl From<ButtonPayload> for EdgeEvent {
    fn from(payload: ButtonPayload) -> Self {
        Self {
            kind: payload.event,
            timestamp_millis: payload.timestamp,
        }
    }
}
