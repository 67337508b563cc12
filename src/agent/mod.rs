//! The node agent: a single-threaded tick loop and its real-time driver

pub mod agent_loop;
pub mod runtime;

pub use agent_loop::{AgentLoop, TickReport};
pub use runtime::{build_host_agent, HostAgent, MonotonicClock, Runtime};
