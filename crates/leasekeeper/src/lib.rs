//! LeaseKeeper - keeps service instances registered with a Eureka registry.
//!
//! Registers each configured instance, renews its lease on a fixed interval,
//! re-registers when the registry forgets it, and deregisters on shutdown.

mod logging;
mod runtime;

pub use leasekeeper_core;
pub use leasekeeper_runtime;

pub use logging::init_logging;
pub use runtime::{LeaseKeeper, LeaseKeeperBuilder};
