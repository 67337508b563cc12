//! Hardware collaborators consumed by the agent core
//!
//! The core never touches pins directly. It reads sensors and drives
//! indicator outputs through the traits below, which keeps the scheduling
//! logic testable with scripted mocks and lets a board binding (here the
//! Linux sysfs one in [`sysfs`]) live at the edge.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod sysfs;

/// Logic level of a digital input after polarity is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Active,
    Inactive,
}

impl Level {
    /// Level an unpressed, unconnected input rests at
    pub const IDLE: Level = Level::Inactive;
}

/// Output state of an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActuatorState {
    On,
    Off,
}

impl ActuatorState {
    /// Value written to a sysfs-style output file
    pub fn as_output(&self) -> &'static str {
        match self {
            ActuatorState::On => "1",
            ActuatorState::Off => "0",
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorState::On => write!(f, "ON"),
            ActuatorState::Off => write!(f, "OFF"),
        }
    }
}

/// Opaque handle naming one actuator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActuatorId(String);

impl ActuatorId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActuatorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A set of addressable indicator outputs
pub trait ActuatorBank {
    /// Drive one output. Writing the same state twice is harmless.
    fn set_state(&mut self, actuator: &ActuatorId, state: ActuatorState);
}

/// Analog input sampled by the periodic sampler
pub trait AnalogSensor {
    /// Current raw value; returns 0 when the converter has nothing ready
    fn read(&mut self) -> i32;
}

/// Digital input watched by the edge detector
pub trait DigitalInput {
    fn read_level(&mut self) -> Level;
}

impl<T: ActuatorBank + ?Sized> ActuatorBank for Box<T> {
    fn set_state(&mut self, actuator: &ActuatorId, state: ActuatorState) {
        (**self).set_state(actuator, state)
    }
}

impl<T: AnalogSensor + ?Sized> AnalogSensor for Box<T> {
    fn read(&mut self) -> i32 {
        (**self).read()
    }
}

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn read_level(&mut self) -> Level {
        (**self).read_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_level_is_inactive() {
        assert_eq!(Level::IDLE, Level::Inactive);
    }

    #[test]
    fn test_actuator_state_display_matches_wire_tokens() {
        assert_eq!(ActuatorState::On.to_string(), "ON");
        assert_eq!(ActuatorState::Off.to_string(), "OFF");
        assert_eq!(ActuatorState::On.as_output(), "1");
        assert_eq!(ActuatorState::Off.as_output(), "0");
    }

    #[test]
    fn test_actuator_id_serializes_transparently() {
        let id = ActuatorId::new("red");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"red\"");
        assert_eq!(id.to_string(), "red");
        assert_eq!(ActuatorId::from("red"), id);
    }
}
