//! Health reporting for the node
//!
//! A report is derived from the supervisor's link and session states plus
//! the agent's counters. The runtime logs one periodically.

use crate::observability::MetricsSnapshot;
use crate::transport::{LinkState, SessionState};
use serde::Serialize;
use tracing::{info, warn};

/// Health of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    pub component: String,
    pub healthy: bool,
    pub message: Option<String>,
}

impl HealthCheckResult {
    fn new(component: &str, healthy: bool, message: String) -> Self {
        Self {
            component: component.to_string(),
            healthy,
            message: Some(message),
        }
    }
}

/// Overall health of the agent at one instant
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub uptime_ms: u64,
    pub checks: Vec<HealthCheckResult>,
    pub metrics: MetricsSnapshot,
}

impl HealthReport {
    pub fn new(
        uptime_ms: u64,
        link: LinkState,
        session: SessionState,
        metrics: MetricsSnapshot,
    ) -> Self {
        let link_check = HealthCheckResult::new(
            "network_link",
            link == LinkState::Connected,
            format!("link {link:?}"),
        );
        let session_check = HealthCheckResult::new(
            "broker_session",
            session == SessionState::Connected,
            format!("session {session:?}"),
        );

        Self {
            uptime_ms,
            checks: vec![link_check, session_check],
            metrics,
        }
    }

    /// Healthy when every component is
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|check| check.healthy)
    }

    pub fn unhealthy_components(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .filter(|check| !check.healthy)
            .map(|check| check.component.as_str())
    }

    /// Emit the report as one structured event
    pub fn log(&self) {
        let m = &self.metrics.metrics;
        if self.is_healthy() {
            info!(
                uptime_ms = self.uptime_ms,
                readings_published = m.readings_published,
                events_published = m.events_published,
                publish_failures = m.publish_failures,
                commands_applied = m.commands_applied,
                commands_dropped = m.commands_dropped,
                inbound_overflow = m.inbound_overflow,
                "Health check passed"
            );
        } else {
            let unhealthy: Vec<&str> = self.unhealthy_components().collect();
            warn!(
                uptime_ms = self.uptime_ms,
                unhealthy = ?unhealthy,
                link_attempts = m.link_attempts,
                session_attempts = m.session_attempts,
                "Health check failed"
            );
        }
    }
}
