use serde::{Deserialize, Serialize};

/// Lease lifecycle state of one supervised instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    /// Supervisor created, nothing sent yet.
    Unregistered,
    /// A register call is in progress or being retried.
    Registering,
    /// Registered; heartbeats are renewing the lease.
    Active,
    /// The registry reported the lease unknown.
    AwaitingReregistration,
    /// The best-effort deregister call is in progress.
    Deregistering,
    /// Terminal.
    Stopped,
}

impl LeaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Registering => "registering",
            Self::Active => "active",
            Self::AwaitingReregistration => "awaiting_reregistration",
            Self::Deregistering => "deregistering",
            Self::Stopped => "stopped",
        }
    }

    /// Check if the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether the supervisor owning this state still counts as live.
    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for LeaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stopped_is_terminal() {
        assert!(LeaseState::Stopped.is_terminal());
        assert!(LeaseState::Active.is_live());
        assert!(LeaseState::Deregistering.is_live());
        assert!(!LeaseState::Unregistered.is_terminal());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&LeaseState::AwaitingReregistration).unwrap();
        assert_eq!(json, "\"awaiting_reregistration\"");
    }
}
