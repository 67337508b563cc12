//! Inbound command routing
//!
//! A message turns into an actuator write only when its topic is bound and
//! its payload names exactly `ON` or `OFF`. Topic and payload are resolved
//! independently; anything that fails either side is dropped with a
//! diagnostic and never retried.

use crate::command_span;
use crate::hardware::ActuatorBank;
use crate::protocol::{BindingTable, Command, DecodeError, MessageCodec};
use crate::transport::{InboundMessage, InboundQueue};
use thiserror::Error;
use tracing::{info, warn};

/// Reasons an inbound message produced no command
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No actuator bound to topic '{0}'")]
    UnknownTopic(String),
    #[error("Undecodable payload on '{topic}': {source}")]
    Decode {
        topic: String,
        #[source]
        source: DecodeError,
    },
    #[error("Payload on '{topic}' does not name a desired state")]
    UnresolvedState { topic: String },
}

/// Outcome of processing one inbound batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub dropped: usize,
}

/// Resolves inbound messages against the binding table and applies them
#[derive(Debug, Clone)]
pub struct CommandRouter {
    bindings: BindingTable,
    codec: MessageCodec,
}

impl CommandRouter {
    pub fn new(bindings: BindingTable, codec: MessageCodec) -> Self {
        Self { bindings, codec }
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Turn a topic and payload into a command without side effects
    pub fn resolve(&self, topic: &str, payload: &[u8]) -> Result<Command, RouteError> {
        let actuator = self.bindings.resolve(topic);
        let desired = self.codec.decode_command(payload);

        let actuator_id = actuator
            .cloned()
            .ok_or_else(|| RouteError::UnknownTopic(topic.to_string()))?;
        let desired_state = desired
            .map_err(|source| RouteError::Decode {
                topic: topic.to_string(),
                source,
            })?
            .ok_or_else(|| RouteError::UnresolvedState {
                topic: topic.to_string(),
            })?;

        Ok(Command {
            actuator_id,
            desired_state,
        })
    }

    /// Resolve one message and, if it names a command, apply it
    pub fn route<A: ActuatorBank + ?Sized>(
        &self,
        message: &InboundMessage,
        actuators: &mut A,
    ) -> Result<Command, RouteError> {
        let span = command_span!(topic = %message.topic);
        let _guard = span.enter();

        match self.resolve(&message.topic, &message.payload) {
            Ok(command) => {
                actuators.set_state(&command.actuator_id, command.desired_state);
                info!(
                    actuator = %command.actuator_id,
                    state = %command.desired_state,
                    "Actuator updated"
                );
                Ok(command)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(&message.payload),
                    "Inbound message dropped"
                );
                Err(e)
            }
        }
    }

    /// Apply every queued message in arrival order, leaving the queue empty
    pub fn process_batch<A: ActuatorBank + ?Sized>(
        &self,
        inbox: &mut InboundQueue,
        actuators: &mut A,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for message in inbox.drain() {
            match self.route(&message, actuators) {
                Ok(_) => summary.applied += 1,
                Err(_) => summary.dropped += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{ActuatorId, ActuatorState};
    use crate::protocol::ActuatorBinding;
    use crate::testing::mocks::MockActuatorBank;

    fn router() -> CommandRouter {
        let bindings = BindingTable::new(vec![
            ActuatorBinding::new("ttpu/iot/node/led/red", ActuatorId::new("red")),
            ActuatorBinding::new("ttpu/iot/node/led/blue", ActuatorId::new("blue")),
        ])
        .unwrap();
        CommandRouter::new(bindings, MessageCodec::default())
    }

    #[test]
    fn test_bound_topic_with_on_payload_is_applied() {
        let router = router();
        let mut bank = MockActuatorBank::new();

        let message = InboundMessage::new("ttpu/iot/node/led/red", r#"{"state":"ON"}"#);
        let command = router.route(&message, &mut bank).unwrap();

        assert_eq!(command.actuator_id, ActuatorId::new("red"));
        assert_eq!(command.desired_state, ActuatorState::On);
        assert_eq!(
            bank.writes(),
            &[(ActuatorId::new("red"), ActuatorState::On)]
        );
    }

    #[test]
    fn test_lowercase_state_is_unresolved() {
        let router = router();
        let mut bank = MockActuatorBank::new();

        let message = InboundMessage::new("ttpu/iot/node/led/red", r#"{"state":"on"}"#);
        let result = router.route(&message, &mut bank);

        assert!(matches!(result, Err(RouteError::UnresolvedState { .. })));
        assert!(bank.writes().is_empty());
    }

    #[test]
    fn test_unknown_topic_is_dropped() {
        let router = router();
        let mut bank = MockActuatorBank::new();

        let message = InboundMessage::new("ttpu/iot/node/led/green", r#"{"state":"ON"}"#);
        let result = router.route(&message, &mut bank);

        assert!(matches!(result, Err(RouteError::UnknownTopic(t)) if t == "ttpu/iot/node/led/green"));
        assert!(bank.writes().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let router = router();
        let mut bank = MockActuatorBank::new();

        let message = InboundMessage::new("ttpu/iot/node/led/blue", "{state: ON");
        assert!(matches!(
            router.route(&message, &mut bank),
            Err(RouteError::Decode { .. })
        ));
        assert!(bank.writes().is_empty());
    }

    #[test]
    fn test_missing_state_field_is_unresolved() {
        let router = router();
        assert!(matches!(
            router.resolve("ttpu/iot/node/led/blue", br#"{"brightness":10}"#),
            Err(RouteError::UnresolvedState { .. })
        ));
    }

    #[test]
    fn test_batch_is_applied_in_arrival_order() {
        let router = router();
        let mut bank = MockActuatorBank::new();
        let mut inbox = InboundQueue::new(8);

        inbox.push(InboundMessage::new("ttpu/iot/node/led/red", r#"{"state":"ON"}"#));
        inbox.push(InboundMessage::new("ttpu/iot/node/led/red", r#"{"state":"maybe"}"#));
        inbox.push(InboundMessage::new("unbound", r#"{"state":"OFF"}"#));
        inbox.push(InboundMessage::new("ttpu/iot/node/led/blue", r#"{"state":"ON"}"#));
        inbox.push(InboundMessage::new("ttpu/iot/node/led/red", r#"{"state":"OFF"}"#));

        let summary = router.process_batch(&mut inbox, &mut bank);

        assert_eq!(summary, BatchSummary { applied: 3, dropped: 2 });
        assert!(inbox.is_empty());
        assert_eq!(
            bank.writes(),
            &[
                (ActuatorId::new("red"), ActuatorState::On),
                (ActuatorId::new("blue"), ActuatorState::On),
                (ActuatorId::new("red"), ActuatorState::Off),
            ]
        );
    }

    #[test]
    fn test_repeated_command_is_idempotent() {
        let router = router();
        let mut bank = MockActuatorBank::new();
        let message = InboundMessage::new("ttpu/iot/node/led/red", r#"{"state":"OFF"}"#);

        router.route(&message, &mut bank).unwrap();
        router.route(&message, &mut bank).unwrap();

        assert_eq!(bank.state(&ActuatorId::new("red")), Some(ActuatorState::Off));
    }
}
