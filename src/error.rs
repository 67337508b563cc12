//! Top-level error type for the node agent
//!
//! Only construction can fail terminally. Everything that goes wrong once
//! the loop is running (a lost link, a rejected session, a malformed
//! command) is logged and retried or dropped by the component that saw it,
//! using that component's own error type.

use thiserror::Error;

/// Main error type for agent construction and runtime setup
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Codec error: {0}")]
    CodecError(#[from] crate::protocol::CodecError),

    #[error("MQTT error: {0}")]
    MqttError(#[from] crate::transport::mqtt::MqttError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl AgentError {
    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
