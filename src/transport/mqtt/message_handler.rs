//! Pure routing of MQTT client events
//!
//! The transport only cares about three things coming from the client's
//! event stream: the broker accepting the session, a message arriving, and
//! the session ending. Everything else is bookkeeping.

use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet};
use rumqttc::v5::Event;
use tracing::debug;

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Broker accepted the session
    ConnectionAcknowledged,
    /// Broker answered the connect with a failure reason
    ConnectionRefused(String),
    /// Message received on a subscribed topic
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// Broker ended the session
    Disconnected,
    /// Acks, pings and outgoing packets
    Other,
}

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(Packet::ConnAck(connack)) => {
                if connack.code == ConnectReturnCode::Success {
                    EventRoute::ConnectionAcknowledged
                } else {
                    EventRoute::ConnectionRefused(format!("{:?}", connack.code))
                }
            }
            Event::Incoming(Packet::Publish(publish)) => EventRoute::MessageReceived {
                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                payload: publish.payload.to_vec(),
                retain: publish.retain,
            },
            Event::Incoming(Packet::Disconnect(disconnect)) => {
                debug!(reason = ?disconnect.reason_code, "Broker sent disconnect");
                EventRoute::Disconnected
            }
            Event::Incoming(_) | Event::Outgoing(_) => EventRoute::Other,
        }
    }
}
