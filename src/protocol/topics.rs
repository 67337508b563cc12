//! Topic validation and the static actuator binding table
//!
//! Topics are exact strings. Wildcards belong to subscription filters on the
//! broker side and are never valid in this node's static namespace.

use crate::hardware::ActuatorId;
use std::collections::HashMap;
use thiserror::Error;

/// MQTT limit on an encoded topic name
pub const MAX_TOPIC_LEN: usize = 65_535;

/// Topic validation errors
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("Topic cannot be empty")]
    Empty,
    #[error("Topic '{0}' contains a wildcard")]
    Wildcard(String),
    #[error("Topic contains a NUL character")]
    NulChar,
    #[error("Topic exceeds 65535 bytes")]
    TooLong,
    #[error("Topic '{0}' is bound more than once")]
    Duplicate(String),
}

/// Check that `topic` is a concrete publish/subscribe address
pub fn validate_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(TopicError::TooLong);
    }
    if topic.contains('\0') {
        return Err(TopicError::NulChar);
    }
    if topic.contains(|c: char| c == '+' || c == '#') {
        return Err(TopicError::Wildcard(topic.to_string()));
    }
    Ok(())
}

/// One subscribe topic driving one actuator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorBinding {
    pub topic: String,
    pub actuator_id: ActuatorId,
}

impl ActuatorBinding {
    pub fn new<T: Into<String>>(topic: T, actuator_id: ActuatorId) -> Self {
        Self {
            topic: topic.into(),
            actuator_id,
        }
    }
}

/// Immutable topic → actuator table, unique by topic
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<ActuatorBinding>,
    by_topic: HashMap<String, usize>,
}

impl BindingTable {
    pub fn new(bindings: Vec<ActuatorBinding>) -> Result<Self, TopicError> {
        let mut by_topic = HashMap::with_capacity(bindings.len());
        for (index, binding) in bindings.iter().enumerate() {
            validate_topic(&binding.topic)?;
            if by_topic.insert(binding.topic.clone(), index).is_some() {
                return Err(TopicError::Duplicate(binding.topic.clone()));
            }
        }
        Ok(Self { bindings, by_topic })
    }

    /// Exact-match lookup
    pub fn resolve(&self, topic: &str) -> Option<&ActuatorId> {
        self.by_topic
            .get(topic)
            .map(|&index| &self.bindings[index].actuator_id)
    }

    /// Subscribe topics in configuration order
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.topic.as_str())
    }

    pub fn actuator_ids(&self) -> impl Iterator<Item = &ActuatorId> {
        self.bindings.iter().map(|b| &b.actuator_id)
    }

    pub fn bindings(&self) -> &[ActuatorBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
