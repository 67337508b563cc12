//! Linux sysfs-style bindings for sensors and indicator outputs
//!
//! Each channel is a plain file: an analog channel holds an integer
//! (`in_illuminance_raw` style), a GPIO value file holds `0` or `1`.
//! Reads never fail the caller; an unreadable channel reports its idle value.

use super::{ActuatorBank, ActuatorId, ActuatorState, AnalogSensor, DigitalInput, Level};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Analog channel backed by a file containing an integer
#[derive(Debug, Clone)]
pub struct SysfsAnalogSensor {
    path: PathBuf,
}

impl SysfsAnalogSensor {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalogSensor for SysfsAnalogSensor {
    fn read(&mut self) -> i32 {
        match fs::read_to_string(&self.path) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                debug!(path = %self.path.display(), raw = %raw.trim(), "Analog channel not ready");
                0
            }),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Analog channel unreadable");
                0
            }
        }
    }
}

/// GPIO value file read as a digital input
#[derive(Debug, Clone)]
pub struct SysfsDigitalInput {
    path: PathBuf,
    active_low: bool,
}

impl SysfsDigitalInput {
    pub fn new<P: Into<PathBuf>>(path: P, active_low: bool) -> Self {
        Self {
            path: path.into(),
            active_low,
        }
    }
}

impl DigitalInput for SysfsDigitalInput {
    fn read_level(&mut self) -> Level {
        let high = match fs::read_to_string(&self.path) {
            Ok(raw) => raw.trim() == "1",
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Digital input unreadable");
                return Level::IDLE;
            }
        };

        if high != self.active_low {
            Level::Active
        } else {
            Level::Inactive
        }
    }
}

/// Indicator outputs keyed by actuator id
///
/// Outputs without a path are kept in memory only, which is how the agent
/// runs on a development host with no GPIO wired up.
#[derive(Debug, Default)]
pub struct SysfsActuatorBank {
    outputs: HashMap<ActuatorId, Option<PathBuf>>,
    states: HashMap<ActuatorId, ActuatorState>,
}

impl SysfsActuatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an output; `path` is the GPIO value file to write
    pub fn add_output(&mut self, id: ActuatorId, path: Option<PathBuf>) {
        self.outputs.insert(id, path);
    }

    /// Last state written to an output
    pub fn state(&self, id: &ActuatorId) -> Option<ActuatorState> {
        self.states.get(id).copied()
    }
}

impl ActuatorBank for SysfsActuatorBank {
    fn set_state(&mut self, actuator: &ActuatorId, state: ActuatorState) {
        match self.outputs.get(actuator) {
            Some(Some(path)) => {
                if let Err(e) = fs::write(path, state.as_output()) {
                    warn!(
                        actuator = %actuator,
                        path = %path.display(),
                        error = %e,
                        "Failed to drive actuator output"
                    );
                    return;
                }
            }
            Some(None) => {}
            None => {
                warn!(actuator = %actuator, "Write to unregistered actuator ignored");
                return;
            }
        }

        self.states.insert(actuator.clone(), state);
        debug!(actuator = %actuator, output = state.as_output(), "Output written");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ActuatorBinding, BindingTable, MessageCodec};
    use crate::routing::CommandRouter;
    use crate::transport::InboundMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts INFO-level events
    struct InfoCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for InfoCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::INFO {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_analog_sensor_reads_integer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in_illuminance_raw");
        fs::write(&path, "1234\n").unwrap();

        let mut sensor = SysfsAnalogSensor::new(&path);
        assert_eq!(sensor.read(), 1234);
    }

    #[test]
    fn test_analog_sensor_defaults_to_zero() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert_eq!(SysfsAnalogSensor::new(&missing).read(), 0);

        let garbage = dir.path().join("garbage");
        fs::write(&garbage, "not-a-number").unwrap();
        assert_eq!(SysfsAnalogSensor::new(&garbage).read(), 0);
    }

    #[test]
    fn test_digital_input_polarity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("value");

        fs::write(&path, "1\n").unwrap();
        assert_eq!(SysfsDigitalInput::new(&path, false).read_level(), Level::Active);
        assert_eq!(SysfsDigitalInput::new(&path, true).read_level(), Level::Inactive);

        fs::write(&path, "0\n").unwrap();
        assert_eq!(SysfsDigitalInput::new(&path, false).read_level(), Level::Inactive);
        assert_eq!(SysfsDigitalInput::new(&path, true).read_level(), Level::Active);
    }

    #[test]
    fn test_digital_input_unreadable_is_idle() {
        let dir = tempdir().unwrap();
        let mut input = SysfsDigitalInput::new(dir.path().join("nope"), true);
        assert_eq!(input.read_level(), Level::IDLE);
    }

    #[test]
    fn test_actuator_bank_writes_gpio_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gpio26");
        let red = ActuatorId::new("red");

        let mut bank = SysfsActuatorBank::new();
        bank.add_output(red.clone(), Some(path.clone()));

        bank.set_state(&red, ActuatorState::On);
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");
        assert_eq!(bank.state(&red), Some(ActuatorState::On));

        bank.set_state(&red, ActuatorState::Off);
        assert_eq!(fs::read_to_string(&path).unwrap(), "0");
        assert_eq!(bank.state(&red), Some(ActuatorState::Off));
    }

    #[test]
    fn test_actuator_bank_memory_only_and_unknown_outputs() {
        let mut bank = SysfsActuatorBank::new();
        let green = ActuatorId::new("green");
        bank.add_output(green.clone(), None);

        bank.set_state(&green, ActuatorState::On);
        assert_eq!(bank.state(&green), Some(ActuatorState::On));

        let unknown = ActuatorId::new("purple");
        bank.set_state(&unknown, ActuatorState::On);
        assert_eq!(bank.state(&unknown), None);
    }

    #[test]
    fn test_routed_command_is_logged_once_at_info() {
        let dir = tempdir().unwrap();
        let red = ActuatorId::new("red");
        let mut bank = SysfsActuatorBank::new();
        bank.add_output(red.clone(), Some(dir.path().join("gpio26")));

        let bindings =
            BindingTable::new(vec![ActuatorBinding::new("node/led/red", red.clone())]).unwrap();
        let router = CommandRouter::new(bindings, MessageCodec::default());

        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(InfoCounter(Arc::clone(&count)));
        tracing::subscriber::with_default(subscriber, || {
            router
                .route(
                    &InboundMessage::new("node/led/red", r#"{"state":"ON"}"#),
                    &mut bank,
                )
                .unwrap();
        });

        assert_eq!(bank.state(&red), Some(ActuatorState::On));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
