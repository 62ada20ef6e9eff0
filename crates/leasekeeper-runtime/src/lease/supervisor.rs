use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use leasekeeper_core::registry::RegisterResult;
use leasekeeper_core::{
    LeaseError, LeaseState, MetricsStore, RegistryClient, RegistryEndpoint, RetryPolicy, ServiceInstance,
};

use super::status::{LeaseExit, LeaseStatus};

/// Result of the registration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    Cancelled,
    Exhausted,
    /// First attempt could not reach the endpoint and fail-fast is on.
    Unreachable,
}

/// Result of one heartbeat call (with its internal retries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Renewed,
    Failed,
    Cancelled,
}

/// How an interruptible wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Elapsed,
    Cancelled,
}

/// Drives the lease of one instance against one registry endpoint.
///
/// Register, heartbeat loop, deregister. Calls are issued one at a time; the
/// cancellation token is honored at every wait, never in the middle of a call.
pub struct LeaseSupervisor {
    instance: ServiceInstance,
    endpoint: RegistryEndpoint,
    client: Arc<dyn RegistryClient>,
    metrics: Arc<MetricsStore>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    status: Arc<watch::Sender<LeaseStatus>>,
    fail_fast: bool,
}

impl LeaseSupervisor {
    /// Create a supervisor with its own status channel.
    pub fn new(
        instance: ServiceInstance,
        endpoint: RegistryEndpoint,
        client: Arc<dyn RegistryClient>,
        metrics: Arc<MetricsStore>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let (status, _) = watch::channel(LeaseStatus {
            endpoint: Some(endpoint.clone()),
            ..LeaseStatus::default()
        });
        Self {
            instance,
            endpoint,
            client,
            metrics,
            policy,
            cancel,
            status: Arc::new(status),
            fail_fast: false,
        }
    }

    /// Publish progress on a channel owned by the caller.
    pub fn with_status(mut self, status: Arc<watch::Sender<LeaseStatus>>) -> Self {
        self.status = status;
        self
    }

    /// Give up after the first attempt if the endpoint cannot be reached.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn instance(&self) -> &ServiceInstance {
        &self.instance
    }

    pub fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }

    /// Subscribe to status updates.
    pub fn subscribe(&self) -> watch::Receiver<LeaseStatus> {
        self.status.subscribe()
    }

    /// Current lease state.
    pub fn state(&self) -> LeaseState {
        self.status.borrow().state
    }

    /// Run the full lifecycle until it stops.
    pub async fn run(&self) -> LeaseExit {
        tracing::info!("Starting lease lifecycle");

        match self.register_with_retry().await {
            RegistrationOutcome::Registered => {}
            RegistrationOutcome::Unreachable => {
                tracing::warn!("Registry endpoint unreachable");
                return LeaseExit::Unreachable;
            }
            RegistrationOutcome::Cancelled => {
                tracing::info!("Stopped before registration completed");
                return self.finish(LeaseExit::RegistrationCancelled);
            }
            RegistrationOutcome::Exhausted => {
                tracing::error!(
                    attempts = self.policy.max_registration_attempts,
                    "Registration failed for good, lifecycle ended"
                );
                self.metrics
                    .set_instance_registered(self.instance.name(), false);
                return self.finish(LeaseExit::RegistrationExhausted);
            }
        }

        tracing::info!("Registered, starting heartbeat loop");

        let exit = loop {
            match self.heartbeat_with_retry().await {
                HeartbeatOutcome::Renewed => {}
                HeartbeatOutcome::Failed => {
                    tracing::error!("Heartbeat failed for good");
                    break LeaseExit::HeartbeatExhausted;
                }
                HeartbeatOutcome::Cancelled => break LeaseExit::Cancelled,
            }

            if self.wait(self.instance.lease_renewal_interval()).await == Wait::Cancelled {
                tracing::info!("Stop signal received, leaving heartbeat loop");
                break LeaseExit::Cancelled;
            }
        };

        self.deregister().await;
        self.finish(exit)
    }

    /// Register, retrying with backoff until the budget is spent.
    pub async fn register_with_retry(&self) -> RegistrationOutcome {
        self.set_state(LeaseState::Registering);
        let max = self.policy.max_registration_attempts;

        for attempt in 1..=max {
            if self.cancel.is_cancelled() {
                return RegistrationOutcome::Cancelled;
            }

            tracing::info!(attempt, max, "Registration attempt");
            let result = self.register_once().await;
            if result.ok {
                self.set_state(LeaseState::Active);
                return RegistrationOutcome::Registered;
            }

            if self.fail_fast && attempt == 1 && result.is_transport_failure() {
                return RegistrationOutcome::Unreachable;
            }

            if attempt < max {
                let delay = self.policy.registration_backoff.delay(attempt);
                tracing::warn!(delay_secs = delay.as_secs(), "Registration failed, retrying");
                if self.wait(delay).await == Wait::Cancelled {
                    return RegistrationOutcome::Cancelled;
                }
            }
        }

        RegistrationOutcome::Exhausted
    }

    /// Renew the lease, re-registering if the registry forgot the instance.
    pub async fn heartbeat_with_retry(&self) -> HeartbeatOutcome {
        let max = self.policy.max_heartbeat_retries;
        let name = self.instance.name();
        let mut attempt = 0;

        while attempt < max {
            attempt += 1;
            let result = self.client.heartbeat(&self.instance, &self.endpoint).await;

            if result.ok {
                self.metrics.increment_heartbeats();
                self.metrics.set_instance_registered(name, true);
                tracing::debug!(attempt, "Heartbeat sent");
                return HeartbeatOutcome::Renewed;
            }

            self.metrics.set_instance_registered(name, false);

            if result.not_found {
                let err = LeaseError::LeaseNotFound(self.instance.instance_id());
                tracing::warn!(error = %err, "Re-registering");
                self.set_state(LeaseState::AwaitingReregistration);
                self.set_state(LeaseState::Registering);

                if self.register_once().await.ok {
                    self.set_state(LeaseState::Active);
                    tracing::info!("Re-registration succeeded, retrying heartbeat");
                    continue;
                }
                tracing::error!("Re-registration failed");
                return HeartbeatOutcome::Failed;
            }

            self.metrics.increment_heartbeat_errors();
            if let Some(err) = result.error() {
                tracing::warn!(attempt, max, error = %err, "Heartbeat failed");
            }

            if attempt < max {
                let delay = self.policy.heartbeat_backoff.delay(attempt);
                tracing::info!(delay_secs = delay.as_secs(), "Waiting before next heartbeat attempt");
                if self.wait(delay).await == Wait::Cancelled {
                    return HeartbeatOutcome::Cancelled;
                }
            }
        }

        tracing::error!(attempts = max, "All heartbeat attempts failed");
        HeartbeatOutcome::Failed
    }

    /// One register call with its metrics side effects.
    async fn register_once(&self) -> RegisterResult {
        let name = self.instance.name();
        let result = self.client.register(&self.instance, &self.endpoint).await;

        if result.ok {
            self.metrics.increment_successful_registrations();
            self.metrics.set_instance_registered(name, true);
            tracing::info!("Registered with registry");
        } else {
            self.metrics.increment_registration_errors();
            self.metrics.set_instance_registered(name, false);
            if let Some(err) = result.error() {
                tracing::warn!(error = %err, "Registration failed");
            }
        }

        result
    }

    /// Best-effort removal from the registry. Failures are only logged.
    async fn deregister(&self) {
        self.set_state(LeaseState::Deregistering);
        tracing::info!("Deregistering");

        if self.client.deregister(&self.instance, &self.endpoint).await {
            self.metrics.increment_deregistrations();
            self.metrics
                .set_instance_registered(self.instance.name(), false);
            tracing::info!("Deregistered");
        } else {
            tracing::warn!("Deregistration failed, continuing shutdown");
        }
    }

    /// Sleep for `duration` unless cancelled first.
    async fn wait(&self, duration: Duration) -> Wait {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Wait::Cancelled,
            _ = tokio::time::sleep(duration) => Wait::Elapsed,
        }
    }

    fn set_state(&self, state: LeaseState) {
        self.status.send_modify(|s| s.state = state);
    }

    fn finish(&self, exit: LeaseExit) -> LeaseExit {
        self.status.send_modify(|s| {
            s.state = LeaseState::Stopped;
            s.exit = Some(exit);
        });
        exit
    }
}
