//! Transport layer for the node
//!
//! This module defines the two connectivity collaborators the core drives,
//! the network link and the broker session, plus the supervisor that keeps
//! both converging toward connected.
//!
//! Both traits are synchronous and non-blocking by contract (aside from a
//! bounded connect attempt), which is what lets the agent loop stay a plain
//! single-threaded tick function.

pub mod inbox;
pub mod link;
pub mod mqtt;
pub mod supervisor;

pub use inbox::{InboundMessage, InboundQueue};
pub use link::HostLink;
pub use supervisor::{ConnectionSupervisor, LinkError, LinkState, SessionError, SessionState};

/// Network connectivity beneath the broker session
pub trait NetworkLink {
    /// Make one connection attempt; returns whether the link is now up
    fn connect(&mut self, ssid: &str, password: &str) -> bool;

    /// Current link status
    fn is_connected(&self) -> bool;

    /// Address assigned to this node, for diagnostics
    fn local_address(&self) -> String;

    /// Stable identifier of this device, used to derive the broker client id
    fn hardware_id(&self) -> String;
}

/// Broker session carrying telemetry out and commands in
pub trait MessagingTransport {
    /// Make one session attempt; returns whether the broker accepted it
    fn connect(&mut self, client_id: &str, username: Option<&str>, password: Option<&str>)
        -> bool;

    /// Current session status
    fn is_connected(&self) -> bool;

    /// Subscribe to an exact topic; returns whether the request was accepted
    fn subscribe(&mut self, topic: &str) -> bool;

    /// Publish without retain; returns whether the write was accepted
    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;

    /// Move every inbound message buffered since the last pump into `inbox`,
    /// in delivery order, without blocking
    fn pump(&mut self, inbox: &mut InboundQueue);

    /// Tear down the session, if any
    fn disconnect(&mut self) {}
}
