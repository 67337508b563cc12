//! nodeagent - telemetry and control agent for a small networked node
//!
//! A node keeps a network link and a broker session alive, samples an
//! analog sensor on a fixed cadence, reports debounced button edges, and
//! drives indicator outputs from JSON commands on bound topics.
//!
//! # Overview
//!
//! - [`transport`] - link and session supervision, the MQTT binding
//! - [`sensing`] - the periodic sampler and the debounced edge detector
//! - [`protocol`] - telemetry and command types, JSON codec, topic rules
//! - [`routing`] - inbound command resolution and application
//! - [`agent`] - the single-threaded tick loop and its real-time driver
//! - [`monitor`] - consumer-side view of a node's telemetry
//!
//! # Quick Start
//!
//! Agents are plain values driven by an explicit clock, so several can be
//! simulated side by side:
//!
//! ```rust
//! use nodeagent::agent::AgentLoop;
//! use nodeagent::config::AgentConfig;
//! use nodeagent::hardware::{ActuatorId, ActuatorState};
//! use nodeagent::testing::{MockActuatorBank, MockAnalogSensor, MockLink, MockTransport};
//!
//! let config = AgentConfig::parse(r#"
//! [mqtt]
//! broker_url = "mqtt://broker.hivemq.com:1883"
//!
//! [[actuators]]
//! id = "red"
//! topic = "ttpu/iot/node/led/red"
//!
//! [sampler]
//! topic = "ttpu/iot/node/sensors/light"
//! "#).unwrap();
//!
//! let mut agent = AgentLoop::new(
//!     &config,
//!     MockLink::new(),
//!     MockTransport::new(),
//!     MockActuatorBank::new(),
//! )
//! .unwrap()
//! .with_light_sensor(Box::new(MockAnalogSensor::new(3100)));
//!
//! agent.transport_mut().deliver("ttpu/iot/node/led/red", r#"{"state":"ON"}"#);
//! agent.tick(0);
//!
//! assert_eq!(agent.actuators().state(&ActuatorId::new("red")), Some(ActuatorState::On));
//! assert_eq!(
//!     agent.transport().published_on("ttpu/iot/node/sensors/light"),
//!     vec![r#"{"light":3100,"timestamp":0}"#],
//! );
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod hardware;
pub mod health;
pub mod monitor;
pub mod observability;
pub mod protocol;
pub mod routing;
pub mod sensing;
pub mod testing;
pub mod transport;

pub use agent::{AgentLoop, Runtime, TickReport};
pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use protocol::*;
