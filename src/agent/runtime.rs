//! Real-time driver for an [`AgentLoop`]
//!
//! The runtime owns the monotonic clock and the only sleep in the program.
//! It ticks the agent every `tick_interval_ms`, logs a health report every
//! `health_log_interval_ms`, and stops when SIGINT or SIGTERM raises the
//! shutdown flag.

use super::agent_loop::{AgentLoop, TickReport};
use crate::config::{AgentConfig, AgentSection};
use crate::error::AgentResult;
use crate::hardware::sysfs::{SysfsActuatorBank, SysfsAnalogSensor, SysfsDigitalInput};
use crate::hardware::ActuatorBank;
use crate::transport::mqtt::MqttTransport;
use crate::transport::{HostLink, MessagingTransport, NetworkLink};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Agent wired to the host's network, a real broker and sysfs hardware
pub type HostAgent = AgentLoop<HostLink, MqttTransport, SysfsActuatorBank>;

/// Milliseconds since the clock was created; never goes backwards
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_millis(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives an agent in real time until asked to stop
pub struct Runtime<L, M, A>
where
    L: NetworkLink,
    M: MessagingTransport,
    A: ActuatorBank,
{
    agent: AgentLoop<L, M, A>,
    clock: MonotonicClock,
    tick_interval: Duration,
    health_log_interval_ms: u64,
    next_health_log: u64,
    shutdown: Arc<AtomicBool>,
}

impl<L, M, A> Runtime<L, M, A>
where
    L: NetworkLink,
    M: MessagingTransport,
    A: ActuatorBank,
{
    pub fn new(agent: AgentLoop<L, M, A>, settings: &AgentSection) -> Self {
        Self {
            agent,
            clock: MonotonicClock::new(),
            tick_interval: Duration::from_millis(settings.tick_interval_ms),
            health_log_interval_ms: settings.health_log_interval_ms,
            next_health_log: settings.health_log_interval_ms,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops [`Runtime::run`] once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Raise the shutdown flag on SIGINT and SIGTERM
    pub fn register_signal_handlers(&self) -> AgentResult<()> {
        signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown))?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown))?;
        Ok(())
    }

    pub fn agent(&self) -> &AgentLoop<L, M, A> {
        &self.agent
    }

    /// Tick once at the current clock reading, logging health when due
    pub fn step(&mut self) -> TickReport {
        let now = self.clock.now_millis();
        let report = self.agent.tick(now);

        if self.health_log_interval_ms > 0 && now >= self.next_health_log {
            self.agent.health(now).log();
            self.next_health_log = now.saturating_add(self.health_log_interval_ms);
        }
        report
    }

    /// Tick until the shutdown flag is raised, then close the session
    pub fn run(mut self) -> AgentLoop<L, M, A> {
        info!(
            device = %self.agent.device_name(),
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Agent loop running"
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.step();
            if let Some(remaining) = self.tick_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        info!("Shutdown requested");
        let now = self.clock.now_millis();
        self.agent.health(now).log();
        self.agent.shutdown();
        self.agent
    }
}

/// Wire an agent to this host: TCP probe link, MQTT transport, sysfs I/O
pub fn build_host_agent(config: &AgentConfig) -> AgentResult<HostAgent> {
    let mut actuators = SysfsActuatorBank::new();
    for actuator in &config.actuators {
        actuators.add_output(actuator.id.clone(), actuator.path.clone());
    }

    let mut agent = AgentLoop::new(
        config,
        HostLink::from_config(config),
        MqttTransport::new(config.mqtt.clone()),
        actuators,
    )?;

    if let Some(sampler) = &config.sampler {
        match &sampler.path {
            Some(path) => agent = agent.with_light_sensor(Box::new(SysfsAnalogSensor::new(path))),
            None => warn!(topic = %sampler.topic, "[sampler] has no path, readings disabled"),
        }
    }

    if let Some(button) = &config.button {
        match &button.path {
            Some(path) => {
                agent = agent.with_button(Box::new(SysfsDigitalInput::new(path, button.active_low)))
            }
            None => warn!(topic = %button.topic, "[button] has no path, edge events disabled"),
        }
    }

    Ok(agent)
}
