//! MQTT binding of the messaging transport
//!
//! The module is split into three focused sub-modules:
//!
//! - [`connection`] - Broker URL parsing and client option construction
//! - [`message_handler`] - Pure routing of client events
//! - [`client`] - The blocking [`MqttTransport`] itself
//!
//! # Usage
//!
//! ```rust,no_run
//! use nodeagent::config::MqttSection;
//! use nodeagent::transport::mqtt::MqttTransport;
//! use nodeagent::transport::{InboundQueue, MessagingTransport};
//!
//! let config = MqttSection {
//!     broker_url: "mqtt://broker.hivemq.com:1883".to_string(),
//!     username_env: None,
//!     password_env: None,
//!     retry_delay_ms: 5_000,
//!     keep_alive_secs: 60,
//!     connect_timeout_ms: 3_000,
//!     pump_window_ms: 5,
//! };
//!
//! let mut transport = MqttTransport::new(config);
//! if transport.connect("esp32-client-0001", None, None) {
//!     transport.subscribe("ttpu/iot/node/led/red");
//!     let mut inbox = InboundQueue::default();
//!     transport.pump(&mut inbox);
//! }
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttTransport;
pub use connection::{configure_mqtt_options, parse_broker_url, BrokerEndpoint, MqttError};
pub use message_handler::{EventRoute, MessageHandler};
