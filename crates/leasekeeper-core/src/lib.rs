pub mod config;
pub mod error;
pub mod failover;
pub mod instance;
pub mod metrics;
pub mod registry;
pub mod retry;

pub use config::{InstanceConfig, LeaseKeeperConfig};
pub use error::{LeaseError, Result};
pub use failover::FailoverSelector;
pub use instance::{LeaseState, ServiceInstance};
pub use metrics::{MetricsSnapshot, MetricsStore};
pub use registry::{HeartbeatResult, RegisterResult, RegistryClient, RegistryEndpoint};
pub use retry::{LinearBackoff, RetryPolicy};
