//! Blocking MQTT transport built on rumqttc's synchronous v5 client
//!
//! Every session attempt builds a fresh client and connection. The
//! connection only makes progress while it is polled, so [`MqttTransport::pump`]
//! is what moves keep-alives, outgoing publishes and inbound messages; the
//! agent loop calls it once per tick.

use super::connection::{configure_mqtt_options, MqttError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::MqttSection;
use crate::transport::{InboundMessage, InboundQueue, MessagingTransport};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, Connection};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Capacity of the client's request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;
/// Upper bound on events handled by one pump
const MAX_EVENTS_PER_PUMP: usize = 64;

struct Session {
    client: Client,
    connection: Connection,
}

/// [`MessagingTransport`] talking to a real broker
pub struct MqttTransport {
    config: MqttSection,
    session: Option<Session>,
    connected: bool,
    last_error: Option<String>,
}

impl MqttTransport {
    pub fn new(config: MqttSection) -> Self {
        Self {
            config,
            session: None,
            connected: false,
            last_error: None,
        }
    }

    /// Most recent connection failure, for diagnostics
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.config.connect_timeout_ms)
    }

    fn pump_window(&self) -> Duration {
        Duration::from_millis(self.config.pump_window_ms)
    }

    fn mark_lost(&mut self, reason: String) {
        if self.connected {
            warn!(reason = %reason, "MQTT session lost");
        }
        self.connected = false;
        self.last_error = Some(reason);
        self.session = None;
    }

    /// Poll the fresh connection until the broker acknowledges it
    fn await_connack(connection: &mut Connection, timeout: Duration) -> Result<(), MqttError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(MqttError::ConnectTimeout(timeout));
            }

            match connection.recv_timeout(remaining) {
                Ok(Ok(event)) => match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::ConnectionAcknowledged => return Ok(()),
                    EventRoute::ConnectionRefused(reason) => {
                        return Err(MqttError::ConnectionFailed(reason))
                    }
                    EventRoute::Disconnected => {
                        return Err(MqttError::ConnectionFailed(
                            "broker closed the connection".to_string(),
                        ))
                    }
                    EventRoute::MessageReceived { .. } | EventRoute::Other => {}
                },
                Ok(Err(e)) => return Err(MqttError::ConnectionFailed(e.to_string())),
                Err(_) => return Err(MqttError::ConnectTimeout(timeout)),
            }
        }
    }

    fn try_connect(
        &mut self,
        client_id: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), MqttError> {
        let options = configure_mqtt_options(client_id, &self.config, username, password)?;
        let (client, mut connection) = Client::new(options, REQUEST_CHANNEL_CAPACITY);

        Self::await_connack(&mut connection, self.connect_timeout())?;

        self.session = Some(Session { client, connection });
        Ok(())
    }
}

impl MessagingTransport for MqttTransport {
    fn connect(&mut self, client_id: &str, username: Option<&str>, password: Option<&str>) -> bool {
        // Drop any stale session before starting a new one
        self.session = None;
        self.connected = false;

        match self.try_connect(client_id, username, password) {
            Ok(()) => {
                info!(client_id = %client_id, broker = %self.config.broker_url, "MQTT session established");
                self.connected = true;
                self.last_error = None;
                true
            }
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "MQTT connect attempt failed");
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.client.try_subscribe(topic, QoS::AtMostOnce) {
            Ok(()) => {
                debug!(topic = %topic, "Subscription requested");
                true
            }
            Err(e) => {
                warn!(topic = %topic, error = %MqttError::ClientRequest(Box::new(e)), "Subscribe request failed");
                false
            }
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.connected {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
        {
            Ok(()) => true,
            Err(e) => {
                warn!(topic = %topic, error = %MqttError::ClientRequest(Box::new(e)), "Publish request failed");
                false
            }
        }
    }

    fn pump(&mut self, inbox: &mut InboundQueue) {
        let window = self.pump_window();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let mut lost: Option<String> = None;
        for index in 0..MAX_EVENTS_PER_PUMP {
            let polled = if index == 0 {
                session.connection.recv_timeout(window).ok()
            } else {
                session.connection.try_recv().ok()
            };
            let Some(result) = polled else {
                break;
            };

            match result {
                Ok(event) => match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::MessageReceived {
                        topic,
                        payload,
                        retain,
                    } => {
                        trace!(topic = %topic, bytes = payload.len(), retain, "Inbound message");
                        inbox.push(InboundMessage::new(topic, payload));
                    }
                    EventRoute::Disconnected => {
                        lost = Some("broker sent disconnect".to_string());
                        break;
                    }
                    EventRoute::ConnectionRefused(reason) => {
                        lost = Some(reason);
                        break;
                    }
                    EventRoute::ConnectionAcknowledged | EventRoute::Other => {}
                },
                Err(e) => {
                    lost = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(reason) = lost {
            self.mark_lost(reason);
        }
    }

    fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.client.try_disconnect() {
                debug!(error = %e, "Disconnect request failed");
            }
            // Give the connection a chance to flush the disconnect packet
            let _ = session.connection.recv_timeout(self.pump_window());
            info!("MQTT session closed");
        }
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_mqtt_config(broker_url: &str) -> MqttSection {
        MqttSection {
            broker_url: broker_url.to_string(),
            username_env: None,
            password_env: None,
            retry_delay_ms: 5_000,
            keep_alive_secs: 60,
            connect_timeout_ms: 200,
            pump_window_ms: 1,
        }
    }

    #[test]
    fn test_new_transport_is_disconnected() {
        let transport = MqttTransport::new(test_mqtt_config("mqtt://localhost:1883"));
        assert!(!transport.is_connected());
        assert!(transport.last_error().is_none());
    }

    #[test]
    fn test_connect_with_invalid_url_fails() {
        let mut transport = MqttTransport::new(test_mqtt_config("invalid-url"));
        assert!(!transport.connect("client", None, None));
        assert!(!transport.is_connected());
        assert!(transport.last_error().is_some());
    }

    #[test]
    fn test_connect_to_closed_port_fails() {
        // Port 1 on loopback is not expected to accept connections
        let mut transport = MqttTransport::new(test_mqtt_config("mqtt://127.0.0.1:1"));
        assert!(!transport.connect("client", None, None));
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_operations_without_session_are_refused() {
        let mut transport = MqttTransport::new(test_mqtt_config("mqtt://localhost:1883"));
        let mut inbox = InboundQueue::new(4);

        assert!(!transport.subscribe("led/red"));
        assert!(!transport.publish("sensors/light", b"{}"));
        transport.pump(&mut inbox);
        assert!(inbox.is_empty());

        transport.disconnect();
        assert!(!transport.is_connected());
    }
}
