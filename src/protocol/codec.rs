//! JSON codec for telemetry and command payloads
//!
//! Outbound schemas are static, so a payload that can outgrow the size
//! budget is a configuration mistake. [`MessageCodec::new`] rejects it up
//! front by encoding the widest possible value of every schema.

use super::messages::{
    ButtonPayload, EdgeEvent, EdgeKind, Reading, ReadingPayload, Telemetry, STATE_FIELD,
};
use crate::hardware::ActuatorState;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Size budget of one outbound payload, matching the device's message buffer
pub const MAX_PAYLOAD_BYTES: usize = 256;

/// Outbound encoding errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Payload of {size} bytes exceeds the {max} byte budget")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("Serialization error")]
    Serialization(#[source] serde_json::Error),
}

/// Inbound decoding errors; the message is dropped
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Payload is not a JSON object")]
    NotAnObject,
}

/// Encoder/decoder bound to a payload size budget
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_payload_bytes: usize,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self {
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }
}

impl MessageCodec {
    /// Build a codec, verifying every outbound schema fits `max_payload_bytes`
    pub fn new(max_payload_bytes: usize) -> Result<Self, CodecError> {
        let codec = Self { max_payload_bytes };
        codec.verify_schemas()?;
        Ok(codec)
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Encode telemetry into its flat JSON payload
    pub fn encode(&self, telemetry: &Telemetry) -> Result<Vec<u8>, CodecError> {
        match telemetry {
            Telemetry::Reading(reading) => self.encode_payload(&ReadingPayload::from(reading)),
            Telemetry::Edge(event) => self.encode_payload(&ButtonPayload::from(event)),
        }
    }

    fn encode_payload<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>, CodecError> {
        let bytes = serde_json::to_vec(payload).map_err(CodecError::Serialization)?;
        if bytes.len() > self.max_payload_bytes {
            return Err(CodecError::PayloadTooLarge {
                size: bytes.len(),
                max: self.max_payload_bytes,
            });
        }
        Ok(bytes)
    }

    /// Encode the widest value of each schema
    fn verify_schemas(&self) -> Result<(), CodecError> {
        let widest_reading = Telemetry::Reading(Reading {
            value: i32::MIN,
            timestamp_millis: u64::MAX,
        });
        let widest_edge = Telemetry::Edge(EdgeEvent {
            kind: EdgeKind::Released,
            timestamp_millis: u64::MAX,
        });
        self.encode(&widest_reading)?;
        self.encode(&widest_edge)?;
        Ok(())
    }

    /// Decode a command payload into its desired state
    ///
    /// `Ok(None)` means the payload parsed but carried no usable state:
    /// the `state` field is missing, not a string, or not exactly `ON`/`OFF`.
    pub fn decode_command(&self, payload: &[u8]) -> Result<Option<ActuatorState>, DecodeError> {
        let value: Value = serde_json::from_slice(payload).map_err(DecodeError::Malformed)?;
        let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

        Ok(match object.get(STATE_FIELD).and_then(Value::as_str) {
            Some("ON") => Some(ActuatorState::On),
            Some("OFF") => Some(ActuatorState::Off),
            _ => None,
        })
    }

    /// Decode a reading payload, the inverse of encoding `Telemetry::Reading`
    pub fn decode_reading(&self, payload: &[u8]) -> Result<Reading, DecodeError> {
        serde_json::from_slice::<ReadingPayload>(payload)
            .map(Reading::from)
            .map_err(DecodeError::Malformed)
    }

    /// Decode a button event payload
    ///
    /// The event name must be exactly `pressed` or `released`.
    pub fn decode_edge(&self, payload: &[u8]) -> Result<EdgeEvent, DecodeError> {
        serde_json::from_slice::<ButtonPayload>(payload)
            .map(EdgeEvent::from)
            .map_err(DecodeError::Malformed)
    }
}
