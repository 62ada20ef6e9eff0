mod status;
mod supervisor;

pub use status::{LeaseExit, LeaseStatus};
pub use supervisor::{HeartbeatOutcome, LeaseSupervisor, RegistrationOutcome};
