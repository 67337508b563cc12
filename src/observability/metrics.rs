//! Operational counters for one agent
//!
//! The agent is single-threaded and there may be several in one process
//! (tests simulate whole fleets), so counters are plain fields owned by the
//! agent rather than process-wide atomics.

use serde::Serialize;

/// Counters accumulated over the agent's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentMetrics {
    pub ticks: u64,
    pub readings_published: u64,
    pub events_published: u64,
    pub publish_failures: u64,
    pub commands_applied: u64,
    pub commands_dropped: u64,
    pub inbound_overflow: u64,
    pub link_attempts: u64,
    pub session_attempts: u64,
    pub sessions_established: u64,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            metrics: *self,
            telemetry_published: self.readings_published + self.events_published,
        }
    }
}

/// Point-in-time view of [`AgentMetrics`] with derived totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub metrics: AgentMetrics,
    pub telemetry_published: u64,
}
