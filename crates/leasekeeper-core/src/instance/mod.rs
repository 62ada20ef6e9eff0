mod state;

pub use state::LeaseState;

use std::net::Ipv6Addr;
use std::time::Duration;

/// Default secure port advertised when none is configured.
pub const DEFAULT_SECURE_PORT: u16 = 443;

/// Default data center label.
pub const DEFAULT_DATA_CENTER: &str = "MyOwn";

/// A service instance kept registered with the registry.
///
/// Built once from configuration and never mutated afterwards. The name is
/// trimmed and upper-cased on construction, so it can be used directly as the
/// registry application name and as the manager key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    name: String,
    host_address: String,
    http_port: u16,
    secure_port: u16,
    ssl_preferred: bool,
    health_check_path: String,
    info_path: String,
    data_center: String,
    lease_renewal_interval: Duration,
    lease_duration: Duration,
}

impl ServiceInstance {
    /// Create an instance with default paths and lease timings.
    pub fn new(name: &str, host_address: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: normalize_name(name),
            host_address: host_address.into(),
            http_port,
            secure_port: DEFAULT_SECURE_PORT,
            ssl_preferred: false,
            health_check_path: "/health".to_string(),
            info_path: "/info".to_string(),
            data_center: DEFAULT_DATA_CENTER.to_string(),
            lease_renewal_interval: Duration::from_secs(30),
            lease_duration: Duration::from_secs(90),
        }
    }

    /// Set the secure port.
    pub fn with_secure_port(mut self, port: u16) -> Self {
        self.secure_port = port;
        self
    }

    /// Prefer the secure port and scheme when advertising URLs.
    pub fn with_ssl_preferred(mut self, preferred: bool) -> Self {
        self.ssl_preferred = preferred;
        self
    }

    /// Set the health check path.
    pub fn with_health_check_path(mut self, path: impl Into<String>) -> Self {
        self.health_check_path = path.into();
        self
    }

    /// Set the info (status page) path.
    pub fn with_info_path(mut self, path: impl Into<String>) -> Self {
        self.info_path = path.into();
        self
    }

    /// Set the data center label.
    pub fn with_data_center(mut self, label: impl Into<String>) -> Self {
        self.data_center = label.into();
        self
    }

    /// Set the lease renewal interval.
    pub fn with_lease_renewal_interval(mut self, interval: Duration) -> Self {
        self.lease_renewal_interval = interval;
        self
    }

    /// Set the lease duration.
    pub fn with_lease_duration(mut self, duration: Duration) -> Self {
        self.lease_duration = duration;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host_address(&self) -> &str {
        &self.host_address
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn secure_port(&self) -> u16 {
        self.secure_port
    }

    pub fn ssl_preferred(&self) -> bool {
        self.ssl_preferred
    }

    pub fn health_check_path(&self) -> &str {
        &self.health_check_path
    }

    pub fn info_path(&self) -> &str {
        &self.info_path
    }

    pub fn data_center(&self) -> &str {
        &self.data_center
    }

    pub fn lease_renewal_interval(&self) -> Duration {
        self.lease_renewal_interval
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    /// Registry instance identity: `{host}:{name}:{http_port}`.
    pub fn instance_id(&self) -> String {
        instance_id(&self.host_address, &self.name, self.http_port)
    }

    /// Virtual IP address advertised for both plain and secure traffic.
    pub fn vip_address(&self) -> String {
        self.name.to_lowercase()
    }

    /// URL scheme the instance is reached on.
    pub fn scheme(&self) -> &'static str {
        if self.ssl_preferred {
            "https"
        } else {
            "http"
        }
    }

    /// Port the advertised URLs point at.
    pub fn active_port(&self) -> u16 {
        if self.ssl_preferred {
            self.secure_port
        } else {
            self.http_port
        }
    }

    pub fn home_page_url(&self) -> String {
        format!("{}/", self.base_url())
    }

    pub fn status_page_url(&self) -> String {
        format!("{}{}", self.base_url(), self.info_path)
    }

    pub fn health_check_url(&self) -> String {
        format!("{}{}", self.base_url(), self.health_check_path)
    }

    fn base_url(&self) -> String {
        // IPv6 literals need brackets inside a URL authority.
        let host = if self.host_address.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", self.host_address)
        } else {
            self.host_address.clone()
        };
        format!("{}://{}:{}", self.scheme(), host, self.active_port())
    }
}

/// Normalize an instance name into its registry key form.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Derive the registry instance identity.
pub fn instance_id(host_address: &str, name: &str, http_port: u16) -> String {
    format!("{}:{}:{}", host_address, normalize_name(name), http_port)
}
