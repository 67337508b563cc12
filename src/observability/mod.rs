//! Observability for the node agent
//!
//! Structured logging setup and the agent's operational counters.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{AgentMetrics, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{command_span, link_span, session_span};
