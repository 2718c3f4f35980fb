//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing or malformed startup configuration. Fatal.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Answer, hang-up, transfer or property lookup rejected by the control plane
    #[error("Platform command '{command}' failed: {message}")]
    PlatformCommand { command: String, message: String },

    /// Event references a correlation identifier with no stored record
    #[error("No call record for correlation id: {0}")]
    CorrelationMiss(String),

    /// Malformed media envelope on the audio connection
    #[error("Transport decode error: {0}")]
    TransportDecode(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Backing store unreachable or returned an error
    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn platform(command: &str, message: impl Into<String>) -> Self {
        DomainError::PlatformCommand {
            command: command.to_string(),
            message: message.into(),
        }
    }
}
