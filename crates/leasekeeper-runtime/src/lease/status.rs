use serde::Serialize;

use leasekeeper_core::{LeaseError, LeaseState, RegistryEndpoint, RetryPolicy};

/// Why a lease run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseExit {
    /// The endpoint could not be reached at all; another one may be tried.
    Unreachable,
    /// Stopped before a registration succeeded; nothing was deregistered.
    RegistrationCancelled,
    /// Every register attempt failed.
    RegistrationExhausted,
    /// Stopped while active, after deregistering.
    Cancelled,
    /// A heartbeat call failed for good, after deregistering.
    HeartbeatExhausted,
    /// Every configured endpoint was unreachable.
    EndpointsExhausted,
}

impl LeaseExit {
    /// Whether the run ended because it was asked to stop.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::RegistrationCancelled)
    }

    /// The error a failed run is reported as; `None` for normal exits.
    pub fn into_error(
        self,
        instance: &str,
        policy: &RetryPolicy,
        endpoints: usize,
    ) -> Option<LeaseError> {
        match self {
            Self::RegistrationExhausted => Some(LeaseError::RegistrationExhausted {
                instance: instance.to_string(),
                attempts: policy.max_registration_attempts,
            }),
            Self::HeartbeatExhausted => Some(LeaseError::HeartbeatExhausted {
                instance: instance.to_string(),
                attempts: policy.max_heartbeat_retries,
            }),
            Self::EndpointsExhausted => Some(LeaseError::EndpointsExhausted(endpoints)),
            Self::Unreachable | Self::RegistrationCancelled | Self::Cancelled => None,
        }
    }
}

/// Progress published by a supervised lease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaseStatus {
    pub state: LeaseState,
    /// Endpoint of the current or last run.
    pub endpoint: Option<RegistryEndpoint>,
    /// Set together with `Stopped`.
    pub exit: Option<LeaseExit>,
}

impl Default for LeaseStatus {
    fn default() -> Self {
        Self {
            state: LeaseState::Unregistered,
            endpoint: None,
            exit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_to_error() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            LeaseExit::RegistrationExhausted.into_error("ORDERS", &policy, 1),
            Some(LeaseError::RegistrationExhausted { attempts: 10, .. })
        ));
        assert!(matches!(
            LeaseExit::HeartbeatExhausted.into_error("ORDERS", &policy, 1),
            Some(LeaseError::HeartbeatExhausted { attempts: 3, .. })
        ));
        assert!(matches!(
            LeaseExit::EndpointsExhausted.into_error("ORDERS", &policy, 3),
            Some(LeaseError::EndpointsExhausted(3))
        ));
        assert!(LeaseExit::Cancelled.into_error("ORDERS", &policy, 1).is_none());
        assert!(LeaseExit::RegistrationCancelled.is_cancellation());
        assert!(!LeaseExit::HeartbeatExhausted.is_cancellation());
    }

    #[test]
    fn test_default_status() {
        let status = LeaseStatus::default();
        assert_eq!(status.state, LeaseState::Unregistered);
        assert!(status.exit.is_none());
    }
}
