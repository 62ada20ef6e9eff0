mod run;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use leasekeeper_core::instance::normalize_name;
use leasekeeper_core::{
    FailoverSelector, LeaseError, LeaseState, MetricsStore, RegistryClient, RegistryEndpoint, Result, RetryPolicy,
    ServiceInstance,
};

use crate::lease::{LeaseExit, LeaseStatus};
use run::FailoverRun;

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Failover candidates, tried in random order.
    pub endpoints: Vec<RegistryEndpoint>,
    pub policy: RetryPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![RegistryEndpoint::default()],
            policy: RetryPolicy::default(),
        }
    }
}

/// Listing entry for one managed instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub name: String,
    pub instance_id: String,
    pub state: LeaseState,
    pub endpoint: Option<RegistryEndpoint>,
    pub exit: Option<LeaseExit>,
    pub running: bool,
    pub started_at: DateTime<Utc>,
}

struct SupervisorHandle {
    instance: ServiceInstance,
    cancel: CancellationToken,
    task: JoinHandle<LeaseExit>,
    status: watch::Receiver<LeaseStatus>,
    started_at: DateTime<Utc>,
    generation: u64,
}

impl SupervisorHandle {
    fn is_live(&self) -> bool {
        self.status.borrow().state.is_live() && !self.task.is_finished()
    }
}

/// Owns the running lease supervisors, one per instance name.
pub struct Manager {
    client: Arc<dyn RegistryClient>,
    metrics: Arc<MetricsStore>,
    config: ManagerConfig,
    supervisors: RwLock<HashMap<String, SupervisorHandle>>,
    generation: AtomicU64,
    endpoint_count: usize,
}

impl Manager {
    pub fn new(
        client: Arc<dyn RegistryClient>,
        metrics: Arc<MetricsStore>,
        config: ManagerConfig,
    ) -> Self {
        let endpoint_count = FailoverSelector::new(config.endpoints.iter().cloned()).len();
        Self {
            client,
            metrics,
            config,
            supervisors: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            endpoint_count,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The error a failed run of `name` is reported as.
    pub fn exit_error(&self, name: &str, exit: LeaseExit) -> Option<LeaseError> {
        exit.into_error(name, &self.config.policy, self.endpoint_count)
    }

    /// Start supervising an instance.
    ///
    /// Fails with `AlreadyRunning` while a supervisor for the same name has
    /// not stopped. An entry whose run already ended is replaced.
    pub async fn start(&self, instance: ServiceInstance) -> Result<()> {
        let name = instance.name().to_string();
        let mut supervisors = self.supervisors.write().await;

        if supervisors.get(&name).is_some_and(SupervisorHandle::is_live) {
            return Err(LeaseError::AlreadyRunning(name));
        }

        self.metrics.set_instance_registered(&name, false);

        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(LeaseStatus::default());
        let run = FailoverRun {
            instance: instance.clone(),
            endpoints: self.config.endpoints.clone(),
            client: self.client.clone(),
            metrics: self.metrics.clone(),
            policy: self.config.policy.clone(),
            cancel: cancel.clone(),
            status: Arc::new(status_tx),
        };

        let span = tracing::info_span!(
            "lease",
            instance = %name,
            instance_id = %instance.instance_id()
        );
        let task = tokio::spawn(run.run().instrument(span));

        tracing::info!(instance = %name, "Started lease supervisor");

        supervisors.insert(
            name,
            SupervisorHandle {
                instance,
                cancel,
                task,
                status: status_rx,
                started_at: Utc::now(),
                generation: self.generation.fetch_add(1, Ordering::SeqCst),
            },
        );
        Ok(())
    }

    /// Stop one instance and wait up to `drain_timeout` for it to finish.
    ///
    /// On timeout the task keeps running and stays listed.
    pub async fn stop(&self, name: &str, drain_timeout: Duration) -> Result<LeaseExit> {
        let name = normalize_name(name);

        let (cancel, mut status, generation) = {
            let supervisors = self.supervisors.read().await;
            let handle = supervisors
                .get(&name)
                .ok_or_else(|| LeaseError::NotRunning(name.clone()))?;
            (handle.cancel.clone(), handle.status.clone(), handle.generation)
        };

        cancel.cancel();

        let stopped = tokio::time::timeout(drain_timeout, async {
            status
                .wait_for(|s| s.state.is_terminal())
                .await
                .map(|s| s.exit)
        })
        .await;

        // A closed channel means the task is gone, which counts as stopped.
        let reported = match stopped {
            Ok(Ok(exit)) => exit,
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::warn!(
                    instance = %name,
                    timeout_secs = drain_timeout.as_secs(),
                    "Supervisor did not stop in time"
                );
                return Err(LeaseError::DrainTimeout {
                    instance: name,
                    timeout: drain_timeout,
                });
            }
        };

        let handle = {
            let mut supervisors = self.supervisors.write().await;
            match supervisors.get(&name) {
                Some(h) if h.generation == generation => supervisors.remove(&name),
                _ => None,
            }
        };

        let exit = match handle {
            Some(handle) => match handle.task.await {
                Ok(exit) => exit,
                Err(e) => {
                    tracing::error!(instance = %name, error = %e, "Supervisor task panicked");
                    reported.unwrap_or(LeaseExit::Cancelled)
                }
            },
            None => reported.unwrap_or(LeaseExit::Cancelled),
        };

        if exit.is_cancellation() {
            tracing::info!(instance = %name, exit = ?exit, "Supervisor stopped");
        } else {
            tracing::warn!(instance = %name, exit = ?exit, "Supervisor had already ended");
        }
        Ok(exit)
    }

    /// Cancel every supervisor at once, then wait for each with the same budget.
    ///
    /// Instances whose run had already failed report the failure as an error.
    pub async fn stop_all(&self, drain_timeout: Duration) -> Vec<(String, Result<LeaseExit>)> {
        let names: Vec<String> = {
            let supervisors = self.supervisors.read().await;
            for handle in supervisors.values() {
                handle.cancel.cancel();
            }
            supervisors.keys().cloned().collect()
        };

        tracing::info!(count = names.len(), "Stopping all supervisors");

        let results = join_all(names.iter().map(|name| async move {
            let exit = self.stop(name, drain_timeout).await?;
            match self.exit_error(name, exit) {
                Some(err) => Err(err),
                None => Ok(exit),
            }
        }))
        .await;
        names.into_iter().zip(results).collect()
    }

    /// Every managed instance, sorted by name.
    pub async fn list(&self) -> Vec<InstanceStatus> {
        let supervisors = self.supervisors.read().await;
        let mut listing: Vec<InstanceStatus> = supervisors
            .iter()
            .map(|(name, handle)| {
                let status = handle.status.borrow().clone();
                InstanceStatus {
                    name: name.clone(),
                    instance_id: handle.instance.instance_id(),
                    state: status.state,
                    endpoint: status.endpoint,
                    exit: status.exit,
                    running: handle.is_live(),
                    started_at: handle.started_at,
                }
            })
            .collect();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        listing
    }

    /// Current state of one instance.
    pub async fn state(&self, name: &str) -> Option<LeaseState> {
        let name = normalize_name(name);
        self.supervisors
            .read()
            .await
            .get(&name)
            .map(|h| h.status.borrow().state)
    }

    /// Wait until the named instance stops on its own.
    ///
    /// A failed run is returned as its error, e.g. `EndpointsExhausted` for an
    /// instance that never reached a registry.
    pub async fn wait_stopped(&self, name: &str) -> Result<LeaseExit> {
        let name = normalize_name(name);
        let mut status = {
            let supervisors = self.supervisors.read().await;
            supervisors
                .get(&name)
                .map(|h| h.status.clone())
                .ok_or_else(|| LeaseError::NotRunning(name.clone()))?
        };
        let exit = status
            .wait_for(|s| s.state.is_terminal())
            .await
            .map(|s| s.exit)
            .unwrap_or(None)
            .unwrap_or(LeaseExit::Cancelled);

        match self.exit_error(&name, exit) {
            Some(err) => Err(err),
            None => Ok(exit),
        }
    }

    pub async fn len(&self) -> usize {
        self.supervisors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.supervisors.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallKind, ScriptedRegistry};
    use leasekeeper_core::RegisterResult;
    use tokio_test::assert_ok;

    const DRAIN: Duration = Duration::from_secs(10);

    fn endpoint(host: &str) -> RegistryEndpoint {
        RegistryEndpoint::new(format!("http://{}:8761/eureka/apps", host))
    }

    fn instance(name: &str) -> ServiceInstance {
        ServiceInstance::new(name, "host-a", 8080)
            .with_lease_renewal_interval(Duration::from_secs(20))
    }

    fn manager(registry: Arc<ScriptedRegistry>, endpoints: Vec<RegistryEndpoint>) -> Manager {
        Manager::new(
            registry,
            Arc::new(MetricsStore::new()),
            ManagerConfig {
                endpoints,
                policy: RetryPolicy::default(),
            },
        )
    }

    #[test]
    fn test_manager_config_default() {
        let config = ManagerConfig::default();
        assert_eq!(config.endpoints, vec![RegistryEndpoint::default()]);
        assert_eq!(config.policy.max_registration_attempts, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_duplicate_name() {
        let registry = Arc::new(ScriptedRegistry::new());
        let manager = manager(registry, vec![endpoint("a")]);

        assert_ok!(manager.start(instance("orders")).await);
        let err = manager.start(instance(" Orders ")).await.unwrap_err();

        assert!(matches!(err, LeaseError::AlreadyRunning(name) if name == "ORDERS"));
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_initialises_gauge_to_zero() {
        let registry = Arc::new(
            ScriptedRegistry::new().with_register_fallback(RegisterResult::from_status(500)),
        );
        let manager = manager(registry, vec![endpoint("a")]);

        assert_ok!(manager.start(instance("orders")).await);
        assert_eq!(manager.metrics().snapshot().registered("ORDERS"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_deregisters_and_forgets() {
        let registry = Arc::new(ScriptedRegistry::new());
        let manager = manager(registry.clone(), vec![endpoint("a")]);

        assert_ok!(manager.start(instance("orders")).await);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.state("orders").await, Some(LeaseState::Active));

        let exit = manager.stop("orders", DRAIN).await.unwrap();

        assert_eq!(exit, LeaseExit::Cancelled);
        assert_eq!(registry.deregister_calls(), 1);
        assert!(manager.is_empty().await);
        assert_eq!(manager.state("orders").await, None);
        assert_eq!(manager.metrics().snapshot().registered("ORDERS"), Some(0));

        // The name is free again.
        assert_ok!(manager.start(instance("orders")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_unknown_instance() {
        let manager = manager(Arc::new(ScriptedRegistry::new()), vec![endpoint("a")]);
        let err = manager.stop("missing", DRAIN).await.unwrap_err();
        assert!(matches!(err, LeaseError::NotRunning(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_to_reachable_endpoint() {
        let (a, b, c) = (endpoint("a"), endpoint("b"), endpoint("c"));
        let registry = Arc::new(
            ScriptedRegistry::new()
                .with_unreachable(a.clone())
                .with_unreachable(b.clone()),
        );
        let manager = manager(registry.clone(), vec![a.clone(), b.clone(), c.clone()]);

        assert_ok!(manager.start(instance("orders")).await);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let listing = manager.list().await;
        assert_eq!(listing[0].state, LeaseState::Active);
        assert_eq!(listing[0].endpoint.as_ref(), Some(&c));
        assert!(registry.calls_to(&a) <= 1);
        assert!(registry.calls_to(&b) <= 1);
        assert_eq!(registry.calls_to(&c), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_endpoints_unreachable() {
        let endpoints = vec![endpoint("a"), endpoint("b"), endpoint("c")];
        let mut registry = ScriptedRegistry::new();
        for e in &endpoints {
            registry = registry.with_unreachable(e.clone());
        }
        let registry = Arc::new(registry);
        let manager = manager(registry.clone(), endpoints);

        assert_ok!(manager.start(instance("orders")).await);
        let err = manager.wait_stopped("orders").await.unwrap_err();

        assert!(matches!(err, LeaseError::EndpointsExhausted(3)));
        assert_eq!(registry.register_calls(), 3);
        assert_eq!(registry.deregister_calls(), 0);

        let listing = manager.list().await;
        assert_eq!(listing[0].state, LeaseState::Stopped);
        assert!(!listing[0].running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_unreachable_endpoint_keeps_retrying() {
        let a = endpoint("a");
        let registry = Arc::new(ScriptedRegistry::new().with_unreachable(a.clone()));
        let manager = manager(registry.clone(), vec![a]);

        assert_ok!(manager.start(instance("orders")).await);
        let err = manager.wait_stopped("orders").await.unwrap_err();

        assert!(matches!(
            err,
            LeaseError::RegistrationExhausted { attempts: 10, .. }
        ));
        assert_eq!(registry.register_calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_drains_every_instance() {
        let registry = Arc::new(ScriptedRegistry::new());
        let manager = manager(registry.clone(), vec![endpoint("a")]);

        assert_ok!(manager.start(instance("orders")).await);
        assert_ok!(manager.start(instance("billing")).await);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let results = manager.stop_all(DRAIN).await;

        assert_eq!(results.len(), 2);
        for (_, result) in &results {
            assert_eq!(result.as_ref().unwrap(), &LeaseExit::Cancelled);
        }
        assert_eq!(registry.calls_for("ORDERS", CallKind::Deregister), 1);
        assert_eq!(registry.calls_for("BILLING", CallKind::Deregister), 1);
        assert!(manager.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_keeps_entry() {
        let registry = Arc::new(ScriptedRegistry::new().with_latency(Duration::from_secs(30)));
        let manager = manager(registry, vec![endpoint("a")]);

        assert_ok!(manager.start(instance("orders")).await);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let err = manager
            .stop("orders", Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, LeaseError::DrainTimeout { .. }));
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_are_isolated() {
        let registry = Arc::new(ScriptedRegistry::new().with_register_status_for("billing", 500));
        let manager = manager(registry.clone(), vec![endpoint("a")]);

        assert_ok!(manager.start(instance("orders")).await);
        assert_ok!(manager.start(instance("billing")).await);

        let err = manager.wait_stopped("billing").await.unwrap_err();
        assert!(matches!(
            err,
            LeaseError::RegistrationExhausted { ref instance, .. } if instance == "BILLING"
        ));
        assert_eq!(manager.state("orders").await, Some(LeaseState::Active));

        let snapshot = manager.metrics().snapshot();
        assert_eq!(snapshot.registered("ORDERS"), Some(1));
        assert_eq!(snapshot.registered("BILLING"), Some(0));
        assert!(registry.calls_for("ORDERS", CallKind::Heartbeat) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_reports_failed_runs_as_errors() {
        let registry = Arc::new(ScriptedRegistry::new().with_register_status_for("billing", 500));
        let manager = manager(registry, vec![endpoint("a")]);

        assert_ok!(manager.start(instance("orders")).await);
        assert_ok!(manager.start(instance("billing")).await);
        assert!(manager.wait_stopped("billing").await.is_err());

        let results: HashMap<String, Result<LeaseExit>> =
            manager.stop_all(DRAIN).await.into_iter().collect();

        assert_eq!(results["ORDERS"].as_ref().unwrap(), &LeaseExit::Cancelled);
        assert!(matches!(
            results["BILLING"],
            Err(LeaseError::RegistrationExhausted { attempts: 10, .. })
        ));
        assert!(manager.is_empty().await);
    }
}
