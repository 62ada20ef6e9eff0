use std::time::Duration;

use thiserror::Error;

/// Core error type for lease lifecycle operations.
#[derive(Error, Debug)]
pub enum LeaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status from registry: {0}")]
    UnexpectedStatus(u16),

    #[error("Lease not found for instance {0}")]
    LeaseNotFound(String),

    #[error("Registration exhausted for {instance} after {attempts} attempts")]
    RegistrationExhausted { instance: String, attempts: u32 },

    #[error("Heartbeat exhausted for {instance} after {attempts} attempts")]
    HeartbeatExhausted { instance: String, attempts: u32 },

    #[error("All {0} registry endpoints exhausted")]
    EndpointsExhausted(usize),

    #[error("Instance already running: {0}")]
    AlreadyRunning(String),

    #[error("Instance not running: {0}")]
    NotRunning(String),

    #[error("Instance {instance} did not stop within {timeout:?}")]
    DrainTimeout { instance: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LeaseError {
    fn from(e: serde_json::Error) -> Self {
        LeaseError::Serialization(e.to_string())
    }
}

/// Result type alias using LeaseError.
pub type Result<T> = std::result::Result<T, LeaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LeaseError::RegistrationExhausted {
            instance: "ORDERS".into(),
            attempts: 10,
        };
        assert_eq!(
            err.to_string(),
            "Registration exhausted for ORDERS after 10 attempts"
        );
    }
}
