use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::instance::{ServiceInstance, DEFAULT_DATA_CENTER, DEFAULT_SECURE_PORT};

/// Configuration of one managed instance (`[[instances]]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Application name; normalized to upper case.
    pub name: String,

    /// Host the instance is reachable on.
    #[serde(default = "default_host_address")]
    pub host_address: String,

    /// Plain HTTP port.
    pub http_port: u16,

    /// Secure port.
    #[serde(default = "default_secure_port")]
    pub secure_port: u16,

    /// Advertise the secure port and scheme.
    #[serde(default)]
    pub ssl_preferred: bool,

    /// Health check path.
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,

    /// Status page path.
    #[serde(default = "default_info_path")]
    pub info_path: String,

    /// Data center label.
    #[serde(default = "default_data_center")]
    pub data_center: String,

    /// Seconds between lease renewals.
    #[serde(default = "default_lease_renewal_interval")]
    pub lease_renewal_interval_secs: u64,

    /// Lease duration in seconds.
    #[serde(default = "default_lease_duration")]
    pub lease_duration_secs: u64,
}

impl InstanceConfig {
    /// Create a config with defaults for everything but name and port.
    pub fn new(name: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            host_address: default_host_address(),
            http_port,
            secure_port: default_secure_port(),
            ssl_preferred: false,
            health_check_path: default_health_check_path(),
            info_path: default_info_path(),
            data_center: default_data_center(),
            lease_renewal_interval_secs: default_lease_renewal_interval(),
            lease_duration_secs: default_lease_duration(),
        }
    }

    /// Build the immutable instance descriptor.
    pub fn to_instance(&self) -> ServiceInstance {
        ServiceInstance::new(&self.name, self.host_address.clone(), self.http_port)
            .with_secure_port(self.secure_port)
            .with_ssl_preferred(self.ssl_preferred)
            .with_health_check_path(self.health_check_path.clone())
            .with_info_path(self.info_path.clone())
            .with_data_center(self.data_center.clone())
            .with_lease_renewal_interval(Duration::from_secs(self.lease_renewal_interval_secs))
            .with_lease_duration(Duration::from_secs(self.lease_duration_secs))
    }
}

fn default_host_address() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_secure_port() -> u16 {
    DEFAULT_SECURE_PORT
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_info_path() -> String {
    "/info".to_string()
}

fn default_data_center() -> String {
    DEFAULT_DATA_CENTER.to_string()
}

fn default_lease_renewal_interval() -> u64 {
    30
}

fn default_lease_duration() -> u64 {
    90
}
