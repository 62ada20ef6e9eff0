mod endpoint;
mod payload;
mod traits;

pub use endpoint::{RegistryEndpoint, DEFAULT_REGISTRY_URL};
pub use payload::InstancePayload;
pub use traits::{HeartbeatResult, RegisterResult, RegistryClient};

/// Status the registry answers a successful register with.
pub const STATUS_CREATED: u16 = 204;

/// Status the registry answers a successful heartbeat or deregister with.
pub const STATUS_OK: u16 = 200;

/// Status the registry answers a heartbeat for an unknown instance with.
pub const STATUS_NOT_FOUND: u16 = 404;
