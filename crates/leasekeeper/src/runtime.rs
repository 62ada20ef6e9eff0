//! Process runtime: starts every configured lease, serves observability,
//! and drains the leases on shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use leasekeeper_core::config::LeaseKeeperConfig;
use leasekeeper_core::{LeaseError, MetricsStore, RegistryClient, Result};
use leasekeeper_runtime::{
    HttpRegistryClient, Manager, ManagerConfig, ObservabilityServer, ObservabilityState,
};

/// The LeaseKeeper runtime.
pub struct LeaseKeeper {
    config: LeaseKeeperConfig,
    client: Option<Arc<dyn RegistryClient>>,
    metrics: Arc<MetricsStore>,
    shutdown: CancellationToken,
}

impl LeaseKeeper {
    pub fn builder() -> LeaseKeeperBuilder {
        LeaseKeeperBuilder::new()
    }

    pub fn config(&self) -> &LeaseKeeperConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsStore> {
        self.metrics.clone()
    }

    /// Token that stops the runtime when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run until Ctrl+C or [`LeaseKeeper::shutdown`].
    pub async fn run(self) -> Result<()> {
        let endpoints = self.config.registry.resolved_endpoints();
        let client: Arc<dyn RegistryClient> = match self.client.clone() {
            Some(client) => client,
            None => Arc::new(HttpRegistryClient::new(
                self.config.registry.request_timeout(),
            )?),
        };

        tracing::info!(
            endpoints = ?endpoints.iter().map(ToString::to_string).collect::<Vec<_>>(),
            instances = self.config.instances.len(),
            "LeaseKeeper starting"
        );

        let manager = Arc::new(Manager::new(
            client,
            self.metrics.clone(),
            ManagerConfig {
                endpoints,
                policy: self.config.lifecycle.retry_policy(),
            },
        ));

        // Everything that can fail is settled before the first register.
        let observability = if self.config.observability.enabled {
            let state = ObservabilityState {
                manager: manager.clone(),
                info: Arc::new(serde_json::to_value(&self.config)?),
            };
            let server = ObservabilityServer::new(&self.config.observability, state);
            let listener = server.bind().await?;
            Some((server, listener))
        } else {
            None
        };

        let drain_timeout = self.config.lifecycle.drain_timeout();
        for instance in self.config.service_instances() {
            if let Err(e) = manager.start(instance).await {
                tracing::error!(error = %e, "Failed to start lease, draining started leases");
                manager.stop_all(drain_timeout).await;
                return Err(e);
            }
        }

        let server_shutdown = self.shutdown.child_token();
        let server = observability.map(|(server, listener)| {
            let token = server_shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = server.run_on(listener, token).await {
                    tracing::error!(error = %e, "Observability server error");
                }
            })
        });

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("Received shutdown request");
            }
        }

        let mut timed_out = Vec::new();
        for (name, result) in manager.stop_all(drain_timeout).await {
            match result {
                Ok(exit) => tracing::info!(instance = %name, exit = ?exit, "Lease stopped"),
                Err(e @ LeaseError::DrainTimeout { .. }) => {
                    tracing::warn!(instance = %name, error = %e, "Lease did not drain");
                    timed_out.push(name);
                }
                Err(e) => tracing::warn!(instance = %name, error = %e, "Lease ended with an error"),
            }
        }

        server_shutdown.cancel();
        if let Some(handle) = server {
            let _ = handle.await;
        }

        if timed_out.is_empty() {
            tracing::info!("LeaseKeeper stopped");
        } else {
            tracing::warn!(instances = ?timed_out, "LeaseKeeper stopped with undrained leases");
        }
        Ok(())
    }
}

/// Builder for [`LeaseKeeper`].
pub struct LeaseKeeperBuilder {
    config: Option<LeaseKeeperConfig>,
    client: Option<Arc<dyn RegistryClient>>,
}

impl LeaseKeeperBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            client: None,
        }
    }

    pub fn config(mut self, config: LeaseKeeperConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `client` instead of the HTTP registry client.
    pub fn client(mut self, client: Arc<dyn RegistryClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Validate the configuration and build the runtime.
    pub fn build(self) -> Result<LeaseKeeper> {
        let config = self
            .config
            .ok_or_else(|| LeaseError::Config("Configuration is required".to_string()))?;
        config.validate()?;

        Ok(LeaseKeeper {
            config,
            client: self.client,
            metrics: Arc::new(MetricsStore::new()),
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for LeaseKeeperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use leasekeeper_core::config::InstanceConfig;
    use leasekeeper_core::RegistryEndpoint;
    use leasekeeper_runtime::testing::{CallKind, ScriptedRegistry};

    fn config() -> LeaseKeeperConfig {
        let mut config = LeaseKeeperConfig::default();
        config.registry.endpoints = vec![RegistryEndpoint::new("http://registry:8761/eureka/apps")];
        config.observability.enabled = false;
        config.instances = vec![
            InstanceConfig::new("orders", 8080),
            InstanceConfig::new("billing", 8081),
        ];
        config
    }

    #[test]
    fn test_build_requires_config() {
        assert!(matches!(
            LeaseKeeper::builder().build(),
            Err(LeaseError::Config(_))
        ));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = config();
        config.instances.push(InstanceConfig::new("Orders", 9000));
        assert!(LeaseKeeper::builder().config(config).build().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_registers_and_drains_on_shutdown() {
        let registry = Arc::new(ScriptedRegistry::new());
        let keeper = LeaseKeeper::builder()
            .config(config())
            .client(registry.clone())
            .build()
            .unwrap();
        let metrics = keeper.metrics();
        let shutdown = keeper.shutdown_token();

        let task = tokio::spawn(keeper.run());
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.successful_registrations_total, 2);
        assert_eq!(snapshot.registered("ORDERS"), Some(1));
        assert_eq!(snapshot.registered("BILLING"), Some(1));

        shutdown.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(registry.calls_for("ORDERS", CallKind::Deregister), 1);
        assert_eq!(registry.calls_for("BILLING", CallKind::Deregister), 1);
        assert_eq!(metrics.snapshot().registered("ORDERS"), Some(0));
    }

    #[tokio::test]
    async fn test_run_serves_observability_on_hostname() {
        let mut config = config();
        config.observability.enabled = true;
        config.observability.host = "localhost".to_string();
        config.observability.port = 0;

        let registry = Arc::new(ScriptedRegistry::new());
        let keeper = LeaseKeeper::builder()
            .config(config)
            .client(registry.clone())
            .build()
            .unwrap();
        let shutdown = keeper.shutdown_token();

        let task = tokio::spawn(keeper.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());

        shutdown.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(registry.calls_for("ORDERS", CallKind::Deregister), 1);
        assert_eq!(registry.calls_for("BILLING", CallKind::Deregister), 1);
    }

    #[tokio::test]
    async fn test_unbindable_observability_registers_nothing() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config();
        config.observability.enabled = true;
        config.observability.host = "127.0.0.1".to_string();
        config.observability.port = taken.local_addr().unwrap().port();

        let registry = Arc::new(ScriptedRegistry::new());
        let keeper = LeaseKeeper::builder()
            .config(config)
            .client(registry.clone())
            .build()
            .unwrap();

        assert!(matches!(keeper.run().await, Err(LeaseError::Io(_))));
        assert_eq!(registry.register_calls(), 0);
        assert_eq!(registry.deregister_calls(), 0);
    }
}
