//! Pure connection configuration for the MQTT transport
//!
//! Parsing the broker URL and building client options are kept free of I/O
//! so they can be tested without a broker.

use crate::config::MqttSection;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Largest packet accepted from the broker; commands are tiny
pub const MAX_INBOUND_PACKET_BYTES: u32 = 4 * 1024;

/// Transport level MQTT errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Unsupported broker URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Broker did not acknowledge the session within {0:?}")]
    ConnectTimeout(Duration),
    #[error("Request rejected by client")]
    ClientRequest(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Not connected")]
    NotConnected,
}

/// Broker address extracted from a `mqtt://` or `mqtts://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerEndpoint {
    /// `host:port`, suitable for a socket address lookup
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a broker URL, defaulting the port per scheme
pub fn parse_broker_url(broker_url: &str) -> Result<BrokerEndpoint, MqttError> {
    let url =
        Url::parse(broker_url).map_err(|_| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;

    let tls = match url.scheme() {
        "mqtt" | "tcp" => false,
        "mqtts" | "ssl" => true,
        other => return Err(MqttError::UnsupportedScheme(other.to_string())),
    };

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    Ok(BrokerEndpoint {
        host: host.to_string(),
        port,
        tls,
    })
}

/// Build client options for one session attempt
///
/// Credentials are passed through as given; a password without a username
/// is ignored since MQTT cannot carry it.
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<MqttOptions, MqttError> {
    let endpoint = parse_broker_url(&config.broker_url)?;
    let mut mqtt_options = MqttOptions::new(client_id, endpoint.host.as_str(), endpoint.port);

    if endpoint.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(username) = username {
        mqtt_options.set_credentials(username, password.unwrap_or_default());
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    mqtt_options.set_clean_start(true);
    mqtt_options.set_max_packet_size(Some(MAX_INBOUND_PACKET_BYTES));

    Ok(mqtt_options)
}
