//! Configuration for the node agent
//!
//! One TOML file describes the device, how to reach the network and the
//! broker, which topics drive which actuators, and which local inputs are
//! published. Credentials are never stored in the file; it names the
//! environment variables that hold them and they are resolved at runtime.
//!
//! Omitting `[sampler]` or `[button]`, or leaving `[[actuators]]` empty,
//! yields a publish-only or subscribe-only node.

use crate::hardware::ActuatorId;
use crate::protocol::{validate_topic, ActuatorBinding, BindingTable, TopicError};
use crate::transport::mqtt::parse_broker_url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub network: NetworkSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub actuators: Vec<ActuatorSection>,
    pub sampler: Option<SamplerSection>,
    pub button: Option<ButtonSection>,
    #[serde(default)]
    pub agent: AgentSection,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Human readable name, used in diagnostics only
    #[serde(default = "default_device_name")]
    pub name: String,
    /// Overrides the hardware id reported by the network link
    pub hardware_id: Option<String>,
    /// Broker client id is this prefix followed by the hardware id
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            hardware_id: None,
            client_id_prefix: default_client_id_prefix(),
        }
    }
}

fn default_device_name() -> String {
    "nodeagent".to_string()
}

fn default_client_id_prefix() -> String {
    crate::transport::supervisor::DEFAULT_CLIENT_ID_PREFIX.to_string()
}

/// Network link settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    #[serde(default)]
    pub ssid: String,
    /// Environment variable containing the network password
    pub password_env: Option<String>,
    /// Delay between link attempts
    #[serde(default = "default_link_retry_ms")]
    pub retry_delay_ms: u64,
    /// `host:port` probed to decide whether the link is up; defaults to the broker
    pub probe_addr: Option<String>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// How often a connected link is probed again
    #[serde(default = "default_recheck_interval_ms")]
    pub recheck_interval_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password_env: None,
            retry_delay_ms: default_link_retry_ms(),
            probe_addr: None,
            probe_timeout_ms: default_probe_timeout_ms(),
            recheck_interval_ms: default_recheck_interval_ms(),
        }
    }
}

fn default_link_retry_ms() -> u64 {
    crate::transport::supervisor::DEFAULT_LINK_RETRY_MS
}

fn default_probe_timeout_ms() -> u64 {
    1_000
}

fn default_recheck_interval_ms() -> u64 {
    5_000
}

/// Broker settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL, `mqtt://host:port` or `mqtts://host:port`
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Delay between session attempts after a rejection
    #[serde(default = "default_session_retry_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// How long one session attempt waits for the broker's acknowledgement
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Longest a pump waits for the first pending event
    #[serde(default = "default_pump_window_ms")]
    pub pump_window_ms: u64,
}

fn default_session_retry_ms() -> u64 {
    crate::transport::supervisor::DEFAULT_SESSION_RETRY_MS
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_pump_window_ms() -> u64 {
    5
}

/// One actuator and the topic that drives it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuatorSection {
    pub id: ActuatorId,
    pub topic: String,
    /// sysfs-style output file; without one the state is only tracked in memory
    pub path: Option<PathBuf>,
}

/// Periodic analog sampling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplerSection {
    /// Publish topic for readings
    pub topic: String,
    #[serde(default = "default_sample_interval_ms")]
    pub interval_ms: u64,
    /// File holding the current integer value
    pub path: Option<PathBuf>,
}

fn default_sample_interval_ms() -> u64 {
    crate::sensing::DEFAULT_SAMPLE_INTERVAL_MS
}

/// Debounced push button
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ButtonSection {
    /// Publish topic for edge events
    pub topic: String,
    #[serde(default = "default_refractory_ms")]
    pub refractory_ms: u64,
    /// File holding `1` or `0`
    pub path: Option<PathBuf>,
    /// Treat a low input as pressed, as with a pull-up wiring
    #[serde(default)]
    pub active_low: bool,
}

fn default_refractory_ms() -> u64 {
    crate::sensing::DEFAULT_REFRACTORY_WINDOW_MS
}

/// Scheduling and buffering of the agent loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_health_log_interval_ms")]
    pub health_log_interval_ms: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            inbound_capacity: default_inbound_capacity(),
            max_payload_bytes: default_max_payload_bytes(),
            health_log_interval_ms: default_health_log_interval_ms(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_inbound_capacity() -> usize {
    crate::transport::inbox::DEFAULT_INBOUND_CAPACITY
}

fn default_max_payload_bytes() -> usize {
    crate::protocol::MAX_PAYLOAD_BYTES
}

fn default_health_log_interval_ms() -> u64 {
    60_000
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid topic '{topic}': {source}")]
    InvalidTopic {
        topic: String,
        #[source]
        source: TopicError,
    },
    #[error("Topic '{0}' is bound to more than one actuator")]
    DuplicateTopic(String),
}

impl ConfigError {
    fn from_topic_error(topic: &str, error: TopicError) -> Self {
        match error {
            TopicError::Duplicate(topic) => ConfigError::DuplicateTopic(topic),
            source => ConfigError::InvalidTopic {
                topic: topic.to_string(),
                source,
            },
        }
    }
}

impl AgentConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_broker_url(&self.mqtt.broker_url)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

        self.binding_table()?;

        if self.network.retry_delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "network.retry_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.mqtt.retry_delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.retry_delay_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(sampler) = &self.sampler {
            validate_topic(&sampler.topic)
                .map_err(|e| ConfigError::from_topic_error(&sampler.topic, e))?;
            if sampler.interval_ms == 0 {
                return Err(ConfigError::InvalidConfig(
                    "sampler.interval_ms must be greater than zero".to_string(),
                ));
            }
        }

        if let Some(button) = &self.button {
            validate_topic(&button.topic)
                .map_err(|e| ConfigError::from_topic_error(&button.topic, e))?;
        }

        if self.agent.inbound_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "agent.inbound_capacity must be greater than zero".to_string(),
            ));
        }
        if self.agent.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "agent.tick_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the immutable topic → actuator table
    pub fn binding_table(&self) -> Result<BindingTable, ConfigError> {
        for actuator in &self.actuators {
            validate_topic(&actuator.topic)
                .map_err(|e| ConfigError::from_topic_error(&actuator.topic, e))?;
        }

        let bindings = self
            .actuators
            .iter()
            .map(|a| ActuatorBinding::new(a.topic.clone(), a.id.clone()))
            .collect();

        // Topics are valid by now, so only duplicates can be reported
        BindingTable::new(bindings).map_err(|e| ConfigError::from_topic_error("", e))
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get the network password from its environment variable
    pub fn get_network_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.network.password_env.as_ref())
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Fail early when a named credential variable is missing
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        for name in [
            self.network.password_env.as_ref(),
            self.mqtt.username_env.as_ref(),
            self.mqtt.password_env.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            Self::get_env_var_required(name)?;
        }
        Ok(())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
name = "test-node"
hardware_id = "AA:BB:CC:DD:EE:FF"

[network]
ssid = "Wokwi-GUEST"

[mqtt]
broker_url = "mqtt://localhost:1883"

[[actuators]]
id = "red"
topic = "ttpu/iot/node/led/red"

[[actuators]]
id = "green"
topic = "ttpu/iot/node/led/green"

[sampler]
topic = "ttpu/iot/node/sensors/light"

[button]
topic = "ttpu/iot/node/events/button"
"#;
        Self::parse(toml_content).expect("Test config should parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[mqtt]
broker_url = "mqtt://broker.example.com:1883"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AgentConfig::parse(MINIMAL).unwrap();

        assert_eq!(config.device.client_id_prefix, "esp32-client-");
        assert_eq!(config.network.retry_delay_ms, 500);
        assert_eq!(config.mqtt.retry_delay_ms, 5_000);
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.agent.tick_interval_ms, 10);
        assert_eq!(config.agent.inbound_capacity, 32);
        assert_eq!(config.agent.max_payload_bytes, 256);
        assert!(config.actuators.is_empty());
        assert!(config.sampler.is_none());
        assert!(config.button.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = AgentConfig::test_config();

        assert_eq!(config.device.hardware_id.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(config.actuators.len(), 2);
        assert_eq!(config.sampler.as_ref().map(|s| s.interval_ms), Some(5_000));
        assert_eq!(config.button.as_ref().map(|b| b.refractory_ms), Some(100));

        let table = config.binding_table().unwrap();
        assert_eq!(
            table.resolve("ttpu/iot/node/led/green"),
            Some(&ActuatorId::new("green"))
        );
    }

    #[test]
    fn test_wildcard_actuator_topic_rejected() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"

[[actuators]]
id = "red"
topic = "led/+"
"#;
        let result = AgentConfig::parse(toml_content);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidTopic {
                source: TopicError::Wildcard(_),
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_actuator_topic_rejected() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"

[[actuators]]
id = "red"
topic = "led/red"

[[actuators]]
id = "blue"
topic = "led/red"
"#;
        let result = AgentConfig::parse(toml_content);
        assert!(matches!(result, Err(ConfigError::DuplicateTopic(t)) if t == "led/red"));
    }

    #[test]
    fn test_wildcard_publish_topic_rejected() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"

[sampler]
topic = "sensors/#"
"#;
        assert!(matches!(
            AgentConfig::parse(toml_content),
            Err(ConfigError::InvalidTopic { .. })
        ));
    }

    #[test]
    fn test_invalid_broker_url_rejected() {
        let toml_content = r#"
[mqtt]
broker_url = "not a url"
"#;
        assert!(matches!(
            AgentConfig::parse(toml_content),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_inbound_capacity_rejected() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"

[agent]
inbound_capacity = 0
"#;
        assert!(matches!(
            AgentConfig::parse(toml_content),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_retry_delays_rejected() {
        let zero_link = r#"
[network]
retry_delay_ms = 0

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;
        match AgentConfig::parse(zero_link) {
            Err(ConfigError::InvalidConfig(msg)) => assert!(msg.contains("network.retry_delay_ms")),
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }

        let zero_session = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
retry_delay_ms = 0
"#;
        match AgentConfig::parse(zero_session) {
            Err(ConfigError::InvalidConfig(msg)) => assert!(msg.contains("mqtt.retry_delay_ms")),
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_mqtt_section_is_parse_error() {
        let result = AgentConfig::parse("[device]\nname = \"x\"\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_credentials_resolved_from_env() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
username_env = "NODEAGENT_TEST_CONFIG_USER"
password_env = "NODEAGENT_TEST_CONFIG_MISSING"
"#;
        std::env::set_var("NODEAGENT_TEST_CONFIG_USER", "device");
        let config = AgentConfig::parse(toml_content).unwrap();

        assert_eq!(config.get_mqtt_username().as_deref(), Some("device"));
        assert_eq!(config.get_mqtt_password(), None);
        assert!(matches!(
            config.require_credentials(),
            Err(ConfigError::EnvVarNotFound(name)) if name == "NODEAGENT_TEST_CONFIG_MISSING"
        ));
        std::env::remove_var("NODEAGENT_TEST_CONFIG_USER");
    }
}
