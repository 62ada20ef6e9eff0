mod instance;
mod observability;

pub use instance::InstanceConfig;
pub use observability::{LoggingConfig, ObservabilityConfig};

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LeaseError, Result};
use crate::instance::{normalize_name, ServiceInstance};
use crate::registry::RegistryEndpoint;
use crate::retry::RetryPolicy;

/// Environment variable overriding the default registry URL.
pub const REGISTRY_URL_ENV: &str = "EUREKA_SERVER_URL";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LeaseKeeperConfig {
    /// Registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Lease lifecycle configuration.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Instances to keep registered.
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl LeaseKeeperConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LeaseError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| LeaseError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Check the configuration for values the lifecycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.registry.request_timeout_secs == 0 {
            return Err(LeaseError::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.lifecycle.max_registration_attempts == 0 {
            return Err(LeaseError::Config(
                "max_registration_attempts must be at least 1".to_string(),
            ));
        }
        if self.lifecycle.max_heartbeat_retries == 0 {
            return Err(LeaseError::Config(
                "max_heartbeat_retries must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for instance in &self.instances {
            let name = normalize_name(&instance.name);
            if name.is_empty() {
                return Err(LeaseError::Config("instance name is empty".to_string()));
            }
            if !names.insert(name.clone()) {
                return Err(LeaseError::Config(format!(
                    "duplicate instance name: {}",
                    name
                )));
            }
            if instance.http_port == 0 {
                return Err(LeaseError::Config(format!("{}: http_port is 0", name)));
            }
            if instance.ssl_preferred && instance.secure_port == 0 {
                return Err(LeaseError::Config(format!("{}: secure_port is 0", name)));
            }
            if instance.lease_renewal_interval_secs == 0 {
                return Err(LeaseError::Config(format!(
                    "{}: lease_renewal_interval_secs is 0",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Build the configured instance descriptors.
    pub fn service_instances(&self) -> Vec<ServiceInstance> {
        self.instances.iter().map(InstanceConfig::to_instance).collect()
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URLs; more than one enables failover.
    #[serde(default)]
    pub endpoints: Vec<RegistryEndpoint>,

    /// Timeout bounding every registry call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RegistryConfig {
    /// Endpoints to use, honoring the `EUREKA_SERVER_URL` override.
    pub fn resolved_endpoints(&self) -> Vec<RegistryEndpoint> {
        self.resolve_endpoints(std::env::var(REGISTRY_URL_ENV).ok())
    }

    /// Endpoint resolution with an explicit override value.
    ///
    /// The override only applies while at most one endpoint is configured;
    /// a configured failover set always wins.
    pub fn resolve_endpoints(&self, env_override: Option<String>) -> Vec<RegistryEndpoint> {
        if self.endpoints.len() > 1 {
            return self.endpoints.clone();
        }
        match env_override.filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                tracing::debug!(url = %url, "Using {} registry override", REGISTRY_URL_ENV);
                vec![RegistryEndpoint::new(url)]
            }
            None if self.endpoints.is_empty() => vec![RegistryEndpoint::default()],
            None => self.endpoints.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout() -> u64 {
    10
}

/// Lease lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Register attempts before an instance gives up.
    #[serde(default = "default_max_registration_attempts")]
    pub max_registration_attempts: u32,

    /// Attempts within one heartbeat call.
    #[serde(default = "default_max_heartbeat_retries")]
    pub max_heartbeat_retries: u32,

    /// Time each instance gets to stop on shutdown, in seconds.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_registration_attempts: default_max_registration_attempts(),
            max_heartbeat_retries: default_max_heartbeat_retries(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

impl LifecycleConfig {
    /// Retry policy with the configured budgets.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_registration_attempts: self.max_registration_attempts,
            max_heartbeat_retries: self.max_heartbeat_retries,
            ..RetryPolicy::default()
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

fn default_max_registration_attempts() -> u32 {
    10
}

fn default_max_heartbeat_retries() -> u32 {
    3
}

fn default_drain_timeout() -> u64 {
    10
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
