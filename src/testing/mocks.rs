//! Mock implementations for testing
//!
//! Provides scripted network link, messaging transport, actuator bank and
//! sensors so the agent can be driven tick by tick without a network, a
//! broker or any hardware.

use crate::hardware::{ActuatorBank, ActuatorId, ActuatorState, AnalogSensor, DigitalInput, Level};
use crate::transport::{InboundMessage, InboundQueue, MessagingTransport, NetworkLink};
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

pub type PublishedMessage = (String, Vec<u8>);

/// Mock network link that fails a scripted number of attempts
#[derive(Debug, Clone)]
pub struct MockLink {
    connected: bool,
    fail_remaining: u32,
    connect_calls: Vec<String>,
    hardware_id: String,
    address: String,
}

impl Default for MockLink {
    fn default() -> Self {
        Self {
            connected: false,
            fail_remaining: 0,
            connect_calls: Vec::new(),
            hardware_id: "24:6F:28:AB:CD:EF".to_string(),
            address: "192.168.4.2".to_string(),
        }
    }
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A link whose first `attempts` connects fail
    pub fn failing(attempts: u32) -> Self {
        Self {
            fail_remaining: attempts,
            ..Default::default()
        }
    }

    pub fn with_hardware_id(hardware_id: &str) -> Self {
        Self {
            hardware_id: hardware_id.to_string(),
            ..Default::default()
        }
    }

    /// Make the next `attempts` connects fail
    pub fn fail_next(&mut self, attempts: u32) {
        self.fail_remaining = attempts;
    }

    /// Simulate losing the network
    pub fn drop_link(&mut self) {
        self.connected = false;
    }

    /// SSIDs passed to every connect, in order
    pub fn connect_calls(&self) -> &[String] {
        &self.connect_calls
    }
}

impl NetworkLink for MockLink {
    fn connect(&mut self, ssid: &str, _password: &str) -> bool {
        self.connect_calls.push(ssid.to_string());
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            self.connected = false;
        } else {
            self.connected = true;
        }
        self.connected
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn local_address(&self) -> String {
        self.address.clone()
    }

    fn hardware_id(&self) -> String {
        self.hardware_id.clone()
    }
}

/// Arguments of one session attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectCall {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Mock broker session with scripted rejections and inbound messages
#[derive(Debug, Default)]
pub struct MockTransport {
    connected: bool,
    reject_remaining: u32,
    should_fail_publish: bool,
    connect_calls: Vec<ConnectCall>,
    subscriptions: Vec<String>,
    published: Vec<PublishedMessage>,
    pending: VecDeque<InboundMessage>,
    pump_calls: usize,
    disconnect_calls: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose first `attempts` connects are rejected
    pub fn rejecting(attempts: u32) -> Self {
        Self {
            reject_remaining: attempts,
            ..Default::default()
        }
    }

    pub fn reject_next(&mut self, attempts: u32) {
        self.reject_remaining = attempts;
    }

    /// Make every publish fail until cleared
    pub fn set_publish_failure(&mut self, fail: bool) {
        self.should_fail_publish = fail;
    }

    /// Queue a message as if the broker delivered it
    pub fn deliver<T: Into<String>, P: Into<Vec<u8>>>(&mut self, topic: T, payload: P) {
        self.pending.push_back(InboundMessage::new(topic, payload));
    }

    /// Simulate the broker dropping the session
    pub fn drop_session(&mut self) {
        self.connected = false;
    }

    pub fn connect_calls(&self) -> &[ConnectCall] {
        &self.connect_calls
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn published(&self) -> &[PublishedMessage] {
        &self.published
    }

    /// Payloads published on `topic`, as UTF-8 strings
    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| String::from_utf8_lossy(payload).to_string())
            .collect()
    }

    pub fn pump_calls(&self) -> usize {
        self.pump_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls
    }

    pub fn clear_history(&mut self) {
        self.published.clear();
        self.subscriptions.clear();
        self.connect_calls.clear();
    }
}

impl MessagingTransport for MockTransport {
    fn connect(&mut self, client_id: &str, username: Option<&str>, password: Option<&str>) -> bool {
        self.connect_calls.push(ConnectCall {
            client_id: client_id.to_string(),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        });
        if self.reject_remaining > 0 {
            self.reject_remaining -= 1;
            self.connected = false;
        } else {
            self.connected = true;
        }
        self.connected
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        if !self.connected {
            return false;
        }
        self.subscriptions.push(topic.to_string());
        true
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.connected || self.should_fail_publish {
            return false;
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        true
    }

    fn pump(&mut self, inbox: &mut InboundQueue) {
        self.pump_calls += 1;
        if !self.connected {
            return;
        }
        while let Some(message) = self.pending.pop_front() {
            inbox.push(message);
        }
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }
}

/// Mock actuator bank recording every write
#[derive(Debug, Default)]
pub struct MockActuatorBank {
    writes: Vec<(ActuatorId, ActuatorState)>,
    states: HashMap<ActuatorId, ActuatorState>,
}

impl MockActuatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> &[(ActuatorId, ActuatorState)] {
        &self.writes
    }

    pub fn state(&self, actuator: &ActuatorId) -> Option<ActuatorState> {
        self.states.get(actuator).copied()
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }
}

impl ActuatorBank for MockActuatorBank {
    fn set_state(&mut self, actuator: &ActuatorId, state: ActuatorState) {
        self.writes.push((actuator.clone(), state));
        self.states.insert(actuator.clone(), state);
    }
}

/// Analog sensor whose value is set from the test; clones share state
#[derive(Debug, Clone, Default)]
pub struct MockAnalogSensor {
    value: Rc<Cell<i32>>,
    reads: Rc<Cell<u32>>,
}

impl MockAnalogSensor {
    pub fn new(value: i32) -> Self {
        Self {
            value: Rc::new(Cell::new(value)),
            reads: Rc::new(Cell::new(0)),
        }
    }

    pub fn set(&self, value: i32) {
        self.value.set(value);
    }

    pub fn read_count(&self) -> u32 {
        self.reads.get()
    }
}

impl AnalogSensor for MockAnalogSensor {
    fn read(&mut self) -> i32 {
        self.reads.set(self.reads.get() + 1);
        self.value.get()
    }
}

/// Digital input whose level is set from the test; clones share state
#[derive(Debug, Clone)]
pub struct MockDigitalInput {
    level: Rc<Cell<Level>>,
}

impl Default for MockDigitalInput {
    fn default() -> Self {
        Self::new(Level::IDLE)
    }
}

impl MockDigitalInput {
    pub fn new(level: Level) -> Self {
        Self {
            level: Rc::new(Cell::new(level)),
        }
    }

    pub fn set(&self, level: Level) {
        self.level.set(level);
    }
}

impl DigitalInput for MockDigitalInput {
    fn read_level(&mut self) -> Level {
        self.level.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_link_scripted_failures() {
        let mut link = MockLink::failing(2);
        assert!(!link.connect("ssid", ""));
        assert!(!link.connect("ssid", ""));
        assert!(link.connect("ssid", ""));
        assert_eq!(link.connect_calls().len(), 3);

        link.drop_link();
        assert!(!link.is_connected());
    }

    #[test]
    fn test_mock_transport_delivers_only_when_connected() {
        let mut transport = MockTransport::new();
        let mut inbox = InboundQueue::new(4);
        transport.deliver("led/red", r#"{"state":"ON"}"#);

        transport.pump(&mut inbox);
        assert!(inbox.is_empty());

        transport.connect("client", None, None);
        transport.pump(&mut inbox);
        assert_eq!(inbox.len(), 1);
        assert_eq!(transport.pump_calls(), 2);
    }

    #[test]
    fn test_mock_transport_publish_failure() {
        let mut transport = MockTransport::new();
        transport.connect("client", None, None);
        transport.set_publish_failure(true);

        assert!(!transport.publish("t", b"x"));
        assert!(transport.published().is_empty());
    }

    #[test]
    fn test_mock_sensors_share_state() {
        let sensor = MockAnalogSensor::new(10);
        let mut reader = sensor.clone();
        sensor.set(42);
        assert_eq!(reader.read(), 42);
        assert_eq!(sensor.read_count(), 1);

        let button = MockDigitalInput::default();
        let mut reader = button.clone();
        button.set(Level::Active);
        assert_eq!(reader.read_level(), Level::Active);
    }
}
