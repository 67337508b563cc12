//! The agent loop: one cooperative tick at a time
//!
//! Each [`AgentLoop::tick`] does, in order:
//!
//! 1. verify or repair the network link
//! 2. verify or repair the broker session
//! 3. pump the transport once and apply the inbound batch
//! 4. run the sampler and publish its reading if it fired
//! 5. run the edge detector and publish its event if it fired
//!
//! Steps 3 to 5 only run while both the link and the session are connected.
//! The loop never sleeps; time is whatever the caller passes as `now`.

use crate::config::{AgentConfig, ButtonSection, SamplerSection};
use crate::error::AgentResult;
use crate::hardware::{ActuatorBank, ActuatorState, AnalogSensor, DigitalInput};
use crate::health::HealthReport;
use crate::observability::AgentMetrics;
use crate::protocol::{EdgeEvent, MessageCodec, Reading, Telemetry};
use crate::routing::{BatchSummary, CommandRouter};
use crate::sensing::{EdgeDetector, PeriodicSampler};
use crate::transport::supervisor::SupervisorSettings;
use crate::transport::{
    ConnectionSupervisor, InboundQueue, LinkState, MessagingTransport, NetworkLink, SessionState,
};
use crate::{link_span, session_span};
use tracing::{debug, error, info, warn};

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub link: LinkState,
    pub session: SessionState,
    pub commands: BatchSummary,
    /// Reading taken this tick, whether or not its publish succeeded
    pub reading: Option<Reading>,
    /// Edge detected this tick, whether or not its publish succeeded
    pub edge: Option<EdgeEvent>,
    pub published: u32,
    pub publish_failures: u32,
}

impl TickReport {
    fn new(link: LinkState, session: SessionState) -> Self {
        Self {
            link,
            session,
            commands: BatchSummary::default(),
            reading: None,
            edge: None,
            published: 0,
            publish_failures: 0,
        }
    }

    /// Whether steps 3 to 5 ran
    pub fn is_online(&self) -> bool {
        self.link == LinkState::Connected && self.session == SessionState::Connected
    }
}

struct LightChannel {
    topic: String,
    sampler: PeriodicSampler,
    sensor: Box<dyn AnalogSensor>,
}

struct ButtonChannel {
    topic: String,
    detector: EdgeDetector,
    input: Box<dyn DigitalInput>,
}

/// A single node: supervisor, router, sampler and edge detector around
/// injected link, transport and actuators
pub struct AgentLoop<L, M, A>
where
    L: NetworkLink,
    M: MessagingTransport,
    A: ActuatorBank,
{
    device_name: String,
    link: L,
    transport: M,
    actuators: A,
    supervisor: ConnectionSupervisor,
    router: CommandRouter,
    codec: MessageCodec,
    inbox: InboundQueue,
    sampler_config: Option<SamplerSection>,
    button_config: Option<ButtonSection>,
    light: Option<LightChannel>,
    button: Option<ButtonChannel>,
    metrics: AgentMetrics,
    started_at: Option<u64>,
}

impl<L, M, A> AgentLoop<L, M, A>
where
    L: NetworkLink,
    M: MessagingTransport,
    A: ActuatorBank,
{
    /// Build an agent from one explicit configuration
    ///
    /// Fails only on misconfiguration. Every bound actuator is driven off.
    pub fn new(config: &AgentConfig, link: L, transport: M, mut actuators: A) -> AgentResult<Self> {
        config.validate()?;
        let codec = MessageCodec::new(config.agent.max_payload_bytes)?;
        let bindings = config.binding_table()?;

        for actuator in bindings.actuator_ids() {
            actuators.set_state(actuator, ActuatorState::Off);
        }

        info!(
            device = %config.device.name,
            actuators = bindings.len(),
            sampler = config.sampler.is_some(),
            button = config.button.is_some(),
            "Agent initialized"
        );

        Ok(Self {
            device_name: config.device.name.clone(),
            link,
            transport,
            actuators,
            supervisor: ConnectionSupervisor::new(SupervisorSettings::from_config(config)),
            router: CommandRouter::new(bindings, codec.clone()),
            codec,
            inbox: InboundQueue::new(config.agent.inbound_capacity),
            sampler_config: config.sampler.clone(),
            button_config: config.button.clone(),
            light: None,
            button: None,
            metrics: AgentMetrics::new(),
            started_at: None,
        })
    }

    /// Attach the analog sensor read by the `[sampler]` section
    pub fn with_light_sensor(mut self, sensor: Box<dyn AnalogSensor>) -> Self {
        match &self.sampler_config {
            Some(section) => {
                self.light = Some(LightChannel {
                    topic: section.topic.clone(),
                    sampler: PeriodicSampler::new(section.interval_ms),
                    sensor,
                });
            }
            None => warn!("Light sensor attached without a [sampler] section, ignoring it"),
        }
        self
    }

    /// Attach the digital input watched by the `[button]` section
    pub fn with_button(mut self, input: Box<dyn DigitalInput>) -> Self {
        match &self.button_config {
            Some(section) => {
                self.button = Some(ButtonChannel {
                    topic: section.topic.clone(),
                    detector: EdgeDetector::new(section.refractory_ms),
                    input,
                });
            }
            None => warn!("Button attached without a [button] section, ignoring it"),
        }
        self
    }

    /// Advance the agent by one tick at `now` milliseconds
    pub fn tick(&mut self, now: u64) -> TickReport {
        self.started_at.get_or_insert(now);
        self.metrics.ticks += 1;

        let link = link_span!(now).in_scope(|| self.supervisor.ensure_link(now, &mut self.link));
        let session = session_span!(now).in_scope(|| {
            self.supervisor.ensure_session(
                now,
                &self.link,
                &mut self.transport,
                self.router.bindings(),
            )
        });

        let counters = self.supervisor.counters();
        self.metrics.link_attempts = counters.link_attempts;
        self.metrics.session_attempts = counters.session_attempts;
        self.metrics.sessions_established = counters.sessions_established;

        let mut report = TickReport::new(link, session);
        if !report.is_online() {
            return report;
        }

        self.transport.pump(&mut self.inbox);
        let overflow = self.inbox.take_overflow_count();
        if overflow > 0 {
            self.metrics.inbound_overflow += overflow;
        }
        report.commands = self.router.process_batch(&mut self.inbox, &mut self.actuators);
        self.metrics.commands_applied += report.commands.applied as u64;
        self.metrics.commands_dropped += report.commands.dropped as u64;

        if let Some(channel) = self.light.as_mut() {
            if let Some(reading) = channel.sampler.tick(now, &mut channel.sensor) {
                report.reading = Some(reading);
                if publish_telemetry(
                    &self.codec,
                    &mut self.transport,
                    &channel.topic,
                    &Telemetry::Reading(reading),
                ) {
                    report.published += 1;
                    self.metrics.readings_published += 1;
                } else {
                    report.publish_failures += 1;
                }
            }
        }

        if let Some(channel) = self.button.as_mut() {
            let level = channel.input.read_level();
            if let Some(event) = channel.detector.tick(now, level) {
                info!(event = event.kind.as_str(), "Button edge detected");
                report.edge = Some(event);
                if publish_telemetry(
                    &self.codec,
                    &mut self.transport,
                    &channel.topic,
                    &Telemetry::Edge(event),
                ) {
                    report.published += 1;
                    self.metrics.events_published += 1;
                } else {
                    report.publish_failures += 1;
                }
            }
        }

        self.metrics.publish_failures += u64::from(report.publish_failures);
        report
    }

    /// Tear down the broker session; actuators keep their last state
    pub fn shutdown(&mut self) {
        info!(device = %self.device_name, "Agent shutting down");
        self.transport.disconnect();
    }

    /// Health at `now`, derived from connectivity and counters
    pub fn health(&self, now: u64) -> HealthReport {
        let uptime_ms = self
            .started_at
            .map_or(0, |started| now.saturating_sub(started));
        HealthReport::new(
            uptime_ms,
            self.supervisor.link_state(),
            self.supervisor.session_state(),
            self.metrics.snapshot(),
        )
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn transport(&self) -> &M {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut M {
        &mut self.transport
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }

    pub fn has_light_sensor(&self) -> bool {
        self.light.is_some()
    }

    pub fn has_button(&self) -> bool {
        self.button.is_some()
    }
}

/// Encode and publish once; failures are logged and not retried
fn publish_telemetry<M: MessagingTransport + ?Sized>(
    codec: &MessageCodec,
    transport: &mut M,
    topic: &str,
    telemetry: &Telemetry,
) -> bool {
    let payload = match codec.encode(telemetry) {
        Ok(payload) => payload,
        Err(e) => {
            error!(topic = %topic, error = %e, "Telemetry encoding failed");
            return false;
        }
    };

    if transport.publish(topic, &payload) {
        debug!(
            topic = %topic,
            kind = ?telemetry.kind(),
            payload = %String::from_utf8_lossy(&payload),
            "Telemetry published"
        );
        true
    } else {
        warn!(topic = %topic, kind = ?telemetry.kind(), "Telemetry publish failed");
        false
    }
}
