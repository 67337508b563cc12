//! Debounced edge detection for a digital input
//!
//! A sample is accepted when it differs from the last accepted level and
//! more than the refractory window has passed since the last accepted
//! change. Samples rejected inside the window do not move the anchor, so a
//! level that is still held once the window closes is reported on the first
//! sample after it.

use crate::hardware::Level;
use crate::protocol::{EdgeEvent, EdgeKind};
use tracing::trace;

/// Default refractory window
pub const DEFAULT_REFRACTORY_WINDOW_MS: u64 = 100;

/// Per-input debounce bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceState {
    pub last_stable_level: Level,
    /// Time of the last accepted change; `None` until the first one
    pub last_change_millis: Option<u64>,
}

impl Default for DebounceState {
    fn default() -> Self {
        Self {
            last_stable_level: Level::IDLE,
            last_change_millis: None,
        }
    }
}

/// Turns raw level samples into [`EdgeEvent`]s
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    refractory_window_ms: u64,
    state: DebounceState,
}

impl EdgeDetector {
    pub fn new(refractory_window_ms: u64) -> Self {
        Self {
            refractory_window_ms,
            state: DebounceState::default(),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn refractory_window_ms(&self) -> u64 {
        self.refractory_window_ms
    }

    /// Feed one raw sample taken at `now`
    pub fn tick(&mut self, now: u64, raw_level: Level) -> Option<EdgeEvent> {
        if raw_level == self.state.last_stable_level {
            return None;
        }

        if let Some(last_change) = self.state.last_change_millis {
            let elapsed = now.saturating_sub(last_change);
            if elapsed <= self.refractory_window_ms {
                trace!(
                    ?raw_level,
                    elapsed_ms = elapsed,
                    window_ms = self.refractory_window_ms,
                    "Bounce suppressed"
                );
                return None;
            }
        }

        self.state = DebounceState {
            last_stable_level: raw_level,
            last_change_millis: Some(now),
        };

        Some(EdgeEvent {
            kind: EdgeKind::from_level(raw_level),
            timestamp_millis: now,
        })
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_REFRACTORY_WINDOW_MS)
    }
}
