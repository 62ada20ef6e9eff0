use async_trait::async_trait;

use super::{RegistryEndpoint, STATUS_CREATED, STATUS_NOT_FOUND, STATUS_OK};
use crate::error::LeaseError;
use crate::instance::ServiceInstance;

/// Outcome of a single register call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterResult {
    /// True only when the registry answered "created".
    pub ok: bool,
    /// Status code, absent when the request never got a response.
    pub http_status: Option<u16>,
    /// Transport failure description.
    pub transport_error: Option<String>,
}

impl RegisterResult {
    /// Interpret a registry status code.
    pub fn from_status(status: u16) -> Self {
        Self {
            ok: status == STATUS_CREATED,
            http_status: Some(status),
            transport_error: None,
        }
    }

    /// The request failed before a status was received.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            http_status: None,
            transport_error: Some(message.into()),
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.http_status.is_none()
    }

    /// Classify a failed call; `None` on success.
    pub fn error(&self) -> Option<LeaseError> {
        classify(self.ok, self.http_status, self.transport_error.as_deref())
    }
}

/// Outcome of a single heartbeat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResult {
    pub ok: bool,
    /// The registry does not know the instance; it must re-register.
    pub not_found: bool,
    pub http_status: Option<u16>,
    pub transport_error: Option<String>,
}

impl HeartbeatResult {
    /// Interpret a registry status code.
    pub fn from_status(status: u16) -> Self {
        Self {
            ok: status == STATUS_OK,
            not_found: status == STATUS_NOT_FOUND,
            http_status: Some(status),
            transport_error: None,
        }
    }

    /// The request failed before a status was received.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            not_found: false,
            http_status: None,
            transport_error: Some(message.into()),
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.http_status.is_none()
    }

    /// Classify a failed call; `None` on success or lease-not-found.
    pub fn error(&self) -> Option<LeaseError> {
        if self.not_found {
            return None;
        }
        classify(self.ok, self.http_status, self.transport_error.as_deref())
    }
}

fn classify(ok: bool, status: Option<u16>, transport: Option<&str>) -> Option<LeaseError> {
    if ok {
        return None;
    }
    Some(match status {
        Some(code) => LeaseError::UnexpectedStatus(code),
        None => LeaseError::Transport(transport.unwrap_or("no response").to_string()),
    })
}

/// The three registry calls driving a lease.
///
/// Every call is a single attempt. Failures are reported through the result
/// value and never returned as errors; retry policy belongs to the caller.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Register the instance (`POST {endpoint}/{app}`).
    async fn register(
        &self,
        instance: &ServiceInstance,
        endpoint: &RegistryEndpoint,
    ) -> RegisterResult;

    /// Renew the instance lease (`PUT {endpoint}/{app}/{id}`).
    async fn heartbeat(
        &self,
        instance: &ServiceInstance,
        endpoint: &RegistryEndpoint,
    ) -> HeartbeatResult;

    /// Remove the instance (`DELETE {endpoint}/{app}/{id}`). Best-effort.
    async fn deregister(&self, instance: &ServiceInstance, endpoint: &RegistryEndpoint) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_success_only_on_created() {
        assert!(RegisterResult::from_status(204).ok);
        assert!(!RegisterResult::from_status(200).ok);
        assert!(!RegisterResult::from_status(500).ok);
    }

    #[test]
    fn test_register_error_classification() {
        assert!(RegisterResult::from_status(204).error().is_none());
        assert!(matches!(
            RegisterResult::from_status(503).error(),
            Some(LeaseError::UnexpectedStatus(503))
        ));
        let failed = RegisterResult::transport_failure("connection refused");
        assert!(failed.is_transport_failure());
        assert!(matches!(failed.error(), Some(LeaseError::Transport(_))));
    }

    #[test]
    fn test_heartbeat_status_mapping() {
        let ok = HeartbeatResult::from_status(200);
        assert!(ok.ok && !ok.not_found);

        let missing = HeartbeatResult::from_status(404);
        assert!(!missing.ok && missing.not_found);
        assert!(missing.error().is_none());

        let broken = HeartbeatResult::from_status(500);
        assert!(!broken.ok && !broken.not_found);
        assert!(matches!(
            broken.error(),
            Some(LeaseError::UnexpectedStatus(500))
        ));
    }
}
