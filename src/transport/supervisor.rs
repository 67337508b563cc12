//! Connection supervision for the network link and the broker session
//!
//! Each call to [`ConnectionSupervisor::ensure_link`] or
//! [`ConnectionSupervisor::ensure_session`] advances a small state machine by
//! at most one connection attempt. Attempts are gated by a fixed backoff
//! measured against the caller's clock, so the supervisor never sleeps and
//! never retries faster than the backoff no matter how often it is ticked.
//! Nothing is ever abandoned: both machines keep converging toward
//! `Connected` for as long as they are ticked.

use super::{MessagingTransport, NetworkLink};
use crate::config::AgentConfig;
use crate::protocol::BindingTable;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Delay between network link attempts
pub const DEFAULT_LINK_RETRY_MS: u64 = 500;
/// Delay between broker session attempts after a rejection
pub const DEFAULT_SESSION_RETRY_MS: u64 = 5_000;
/// Prefix of the broker client id; the hardware id follows it
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "esp32-client-";

/// Network link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// At least one attempt failed and another is scheduled
    Connecting,
    Connected,
}

/// Broker session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// The broker refused the last attempt; another is scheduled
    Rejected,
}

/// Network link failures; always retried
#[derive(Debug, Error, PartialEq)]
pub enum LinkError {
    #[error("Network unreachable (attempt {attempt})")]
    Unreachable { attempt: u32 },
    #[error("Network link lost")]
    Lost,
}

/// Broker session failures; always retried
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Broker rejected session for client {client_id} (attempt {attempt})")]
    Rejected { client_id: String, attempt: u32 },
    #[error("Broker session lost")]
    Lost,
    #[error("Subscription to {topic} was not accepted")]
    SubscribeFailed { topic: String },
}

/// Everything the supervisor needs to (re-)establish connectivity
///
/// Credentials are passed through opaquely.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub ssid: String,
    pub network_password: String,
    pub link_retry_ms: u64,
    pub client_id_prefix: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_retry_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            network_password: String::new(),
            link_retry_ms: DEFAULT_LINK_RETRY_MS,
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_string(),
            username: None,
            password: None,
            session_retry_ms: DEFAULT_SESSION_RETRY_MS,
        }
    }
}

impl SupervisorSettings {
    /// Build settings from configuration, resolving credentials from the environment
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            ssid: config.network.ssid.clone(),
            network_password: config.get_network_password().unwrap_or_default(),
            link_retry_ms: config.network.retry_delay_ms,
            client_id_prefix: config.device.client_id_prefix.clone(),
            username: config.get_mqtt_username(),
            password: config.get_mqtt_password(),
            session_retry_ms: config.mqtt.retry_delay_ms,
        }
    }
}

/// Lifetime counters kept by the supervisor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorCounters {
    pub link_attempts: u64,
    pub session_attempts: u64,
    pub sessions_established: u64,
}

/// Drives the link and session state machines
#[derive(Debug)]
pub struct ConnectionSupervisor {
    settings: SupervisorSettings,
    link_state: LinkState,
    session_state: SessionState,
    next_link_attempt: Option<u64>,
    next_session_attempt: Option<u64>,
    link_failures: u32,
    session_failures: u32,
    client_id: Option<String>,
    counters: SupervisorCounters,
}

impl ConnectionSupervisor {
    pub fn new(settings: SupervisorSettings) -> Self {
        Self {
            settings,
            link_state: LinkState::Disconnected,
            session_state: SessionState::Disconnected,
            next_link_attempt: None,
            next_session_attempt: None,
            link_failures: 0,
            session_failures: 0,
            client_id: None,
            counters: SupervisorCounters::default(),
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    /// Client id used for the most recent session attempt
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn counters(&self) -> SupervisorCounters {
        self.counters
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Derive the broker client id from a hardware id
    pub fn derive_client_id(prefix: &str, hardware_id: &str) -> String {
        format!("{prefix}{hardware_id}")
    }

    /// Bring the network link up, making at most one attempt
    ///
    /// A no-op while the link reports connected. A lost link forces the
    /// session to `Disconnected` and is retried immediately.
    pub fn ensure_link<L: NetworkLink + ?Sized>(&mut self, now: u64, link: &mut L) -> LinkState {
        if link.is_connected() {
            if self.link_state != LinkState::Connected {
                self.link_up(link);
            }
            return LinkState::Connected;
        }

        if self.link_state == LinkState::Connected {
            warn!(error = %LinkError::Lost, "Network link dropped, reconnecting");
            self.set_link_state(LinkState::Disconnected);
            self.force_session_down();
            self.next_link_attempt = None;
        }

        if let Some(deadline) = self.next_link_attempt {
            if now < deadline {
                return self.link_state;
            }
        }

        self.counters.link_attempts += 1;
        let attempt = self.link_failures + 1;
        debug!(attempt, ssid = %self.settings.ssid, "Connecting to network");

        if link.connect(&self.settings.ssid, &self.settings.network_password) {
            self.link_up(link);
            return LinkState::Connected;
        }

        self.link_failures = attempt;
        self.next_link_attempt = Some(now.saturating_add(self.settings.link_retry_ms));
        warn!(
            error = %LinkError::Unreachable { attempt },
            retry_in_ms = self.settings.link_retry_ms,
            "Network connection attempt failed"
        );
        self.set_link_state(LinkState::Connecting);
        self.link_state
    }

    /// Bring the broker session up over a connected link, making at most one attempt
    ///
    /// On every successful attempt all bound topics are subscribed again.
    pub fn ensure_session<L, M>(
        &mut self,
        now: u64,
        link: &L,
        transport: &mut M,
        bindings: &BindingTable,
    ) -> SessionState
    where
        L: NetworkLink + ?Sized,
        M: MessagingTransport + ?Sized,
    {
        if self.link_state != LinkState::Connected {
            self.force_session_down();
            return self.session_state;
        }

        if self.session_state == SessionState::Connected {
            if transport.is_connected() {
                return SessionState::Connected;
            }
            warn!(error = %SessionError::Lost, "Broker session dropped, reconnecting");
            self.set_session_state(SessionState::Disconnected);
            self.next_session_attempt = None;
        }

        if let Some(deadline) = self.next_session_attempt {
            if now < deadline {
                return self.session_state;
            }
        }

        let client_id = Self::derive_client_id(&self.settings.client_id_prefix, &link.hardware_id());
        self.client_id = Some(client_id.clone());
        self.counters.session_attempts += 1;
        let attempt = self.session_failures + 1;

        self.set_session_state(SessionState::Connecting);
        let accepted = transport.connect(
            &client_id,
            self.settings.username.as_deref(),
            self.settings.password.as_deref(),
        );

        if !accepted {
            self.session_failures = attempt;
            self.next_session_attempt = Some(now.saturating_add(self.settings.session_retry_ms));
            warn!(
                error = %SessionError::Rejected { client_id, attempt },
                retry_in_ms = self.settings.session_retry_ms,
                "Broker connection attempt failed"
            );
            self.set_session_state(SessionState::Rejected);
            return self.session_state;
        }

        self.session_failures = 0;
        self.next_session_attempt = None;
        self.counters.sessions_established += 1;
        self.set_session_state(SessionState::Connected);
        info!(client_id = %client_id, attempts = attempt, "Connected to broker");

        let mut subscribed = 0usize;
        for topic in bindings.topics() {
            if transport.subscribe(topic) {
                subscribed += 1;
            } else {
                warn!(
                    error = %SessionError::SubscribeFailed { topic: topic.to_string() },
                    "Subscription failed"
                );
            }
        }
        info!(subscribed, total = bindings.len(), "Subscribed to command topics");

        SessionState::Connected
    }

    fn link_up<L: NetworkLink + ?Sized>(&mut self, link: &L) {
        info!(
            address = %link.local_address(),
            attempts = self.link_failures + 1,
            "Network connected"
        );
        self.link_failures = 0;
        self.next_link_attempt = None;
        self.set_link_state(LinkState::Connected);
    }

    fn force_session_down(&mut self) {
        if self.session_state != SessionState::Disconnected {
            self.set_session_state(SessionState::Disconnected);
        }
        self.next_session_attempt = None;
        self.session_failures = 0;
    }

    fn set_link_state(&mut self, next: LinkState) {
        if self.link_state != next {
            debug!(from = ?self.link_state, to = ?next, "Link state changed");
            self.link_state = next;
        }
    }

    fn set_session_state(&mut self, next: SessionState) {
        if self.session_state != next {
            debug!(from = ?self.session_state, to = ?next, "Session state changed");
            self.session_state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::ActuatorId;
    use crate::protocol::ActuatorBinding;
    use crate::testing::mocks::{MockLink, MockTransport};

    fn settings() -> SupervisorSettings {
        SupervisorSettings {
            ssid: "Wokwi-GUEST".to_string(),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        }
    }

    fn bindings() -> BindingTable {
        BindingTable::new(vec![
            ActuatorBinding::new("led/red", ActuatorId::new("red")),
            ActuatorBinding::new("led/blue", ActuatorId::new("blue")),
        ])
        .unwrap()
    }

    #[test]
    fn test_link_connects_on_first_attempt() {
        let mut supervisor = ConnectionSupervisor::new(settings());
        let mut link = MockLink::new();

        assert_eq!(supervisor.ensure_link(0, &mut link), LinkState::Connected);
        assert_eq!(link.connect_calls(), &["Wokwi-GUEST".to_string()]);
    }

    #[test]
    fn test_link_retries_only_after_backoff() {
        let mut supervisor = ConnectionSupervisor::new(settings());
        let mut link = MockLink::failing(2);

        assert_eq!(supervisor.ensure_link(0, &mut link), LinkState::Connecting);
        assert_eq!(supervisor.ensure_link(100, &mut link), LinkState::Connecting);
        assert_eq!(supervisor.ensure_link(499, &mut link), LinkState::Connecting);
        assert_eq!(link.connect_calls().len(), 1);

        assert_eq!(supervisor.ensure_link(500, &mut link), LinkState::Connecting);
        assert_eq!(supervisor.ensure_link(1_000, &mut link), LinkState::Connected);
        assert_eq!(link.connect_calls().len(), 3);
        assert_eq!(supervisor.counters().link_attempts, 3);
    }

    #[test]
    fn test_ensure_link_is_idempotent_when_connected() {
        let mut supervisor = ConnectionSupervisor::new(settings());
        let mut link = MockLink::new();

        supervisor.ensure_link(0, &mut link);
        supervisor.ensure_link(10, &mut link);
        supervisor.ensure_link(20, &mut link);
        assert_eq!(link.connect_calls().len(), 1);
    }

    #[test]
    fn test_session_requires_link() {
        let mut supervisor = ConnectionSupervisor::new(settings());
        let link = MockLink::new();
        let mut transport = MockTransport::new();

        let state = supervisor.ensure_session(0, &link, &mut transport, &bindings());
        assert_eq!(state, SessionState::Disconnected);
        assert!(transport.connect_calls().is_empty());
    }

    #[test]
    fn test_session_subscribes_every_bound_topic() {
        let mut supervisor = ConnectionSupervisor::new(settings());
        let mut link = MockLink::with_hardware_id("AA:BB:CC:DD:EE:FF");
        let mut transport = MockTransport::new();

        supervisor.ensure_link(0, &mut link);
        let state = supervisor.ensure_session(0, &link, &mut transport, &bindings());

        assert_eq!(state, SessionState::Connected);
        assert_eq!(supervisor.client_id(), Some("esp32-client-AA:BB:CC:DD:EE:FF"));
        assert_eq!(transport.subscriptions(), &["led/red", "led/blue"]);

        let call = &transport.connect_calls()[0];
        assert_eq!(call.client_id, "esp32-client-AA:BB:CC:DD:EE:FF");
        assert_eq!(call.username.as_deref(), Some("user"));
        assert_eq!(call.password.as_deref(), Some("pass"));
    }

    #[test]
    fn test_session_rejection_retries_after_five_seconds() {
        let mut supervisor = ConnectionSupervisor::new(settings());
        let mut link = MockLink::new();
        let mut transport = MockTransport::rejecting(1);
        let bindings = bindings();

        supervisor.ensure_link(0, &mut link);
        assert_eq!(
            supervisor.ensure_session(0, &link, &mut transport, &bindings),
            SessionState::Rejected
        );
        assert_eq!(
            supervisor.ensure_session(4_999, &link, &mut transport, &bindings),
            SessionState::Rejected
        );
        assert_eq!(transport.connect_calls().len(), 1);

        assert_eq!(
            supervisor.ensure_session(5_000, &link, &mut transport, &bindings),
            SessionState::Connected
        );
        assert_eq!(transport.connect_calls().len(), 2);
        assert!(transport.subscriptions().len() == 2);
    }

    #[test]
    fn test_link_drop_forces_session_down() {
        let mut supervisor = ConnectionSupervisor::new(settings());
        let mut link = MockLink::new();
        let mut transport = MockTransport::new();
        let bindings = bindings();

        supervisor.ensure_link(0, &mut link);
        supervisor.ensure_session(0, &link, &mut transport, &bindings);
        assert_eq!(supervisor.session_state(), SessionState::Connected);

        link.drop_link();
        link.fail_next(1);
        assert_eq!(supervisor.ensure_link(10, &mut link), LinkState::Connecting);
        assert_eq!(supervisor.session_state(), SessionState::Disconnected);
        assert_eq!(
            supervisor.ensure_session(10, &link, &mut transport, &bindings),
            SessionState::Disconnected
        );

        assert_eq!(supervisor.ensure_link(510, &mut link), LinkState::Connected);
        assert_eq!(
            supervisor.ensure_session(510, &link, &mut transport, &bindings),
            SessionState::Connected
        );
        assert_eq!(transport.connect_calls().len(), 2);
        assert_eq!(transport.subscriptions().len(), 4);
    }

    #[test]
    fn test_session_loss_reconnects_immediately_and_resubscribes() {
        let mut supervisor = ConnectionSupervisor::new(settings());
        let mut link = MockLink::new();
        let mut transport = MockTransport::new();
        let bindings = bindings();

        supervisor.ensure_link(0, &mut link);
        supervisor.ensure_session(0, &link, &mut transport, &bindings);
        transport.drop_session();

        assert_eq!(
            supervisor.ensure_session(20, &link, &mut transport, &bindings),
            SessionState::Connected
        );
        assert_eq!(transport.connect_calls().len(), 2);
        assert_eq!(transport.subscriptions().len(), 4);
        assert_eq!(supervisor.counters().sessions_established, 2);
    }

    #[test]
    fn test_client_id_derivation() {
        assert_eq!(
            ConnectionSupervisor::derive_client_id("node-", "1234"),
            "node-1234"
        );
    }
}
