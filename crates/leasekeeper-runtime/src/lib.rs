pub mod lease;
pub mod manager;
pub mod observability;
pub mod registry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use lease::{LeaseExit, LeaseStatus, LeaseSupervisor};
pub use manager::{InstanceStatus, Manager, ManagerConfig};
pub use observability::{ObservabilityServer, ObservabilityState};
pub use registry::HttpRegistryClient;
