use std::time::Duration;

/// Capped linear backoff: `min(step × attempt, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub step: Duration,
    pub cap: Duration,
}

impl LinearBackoff {
    pub const fn new(step: Duration, cap: Duration) -> Self {
        Self { step, cap }
    }

    /// Delay after the given 1-based attempt failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.cap)
    }
}

/// Retry budgets and backoff curves for one supervised lease.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Register attempts before the instance gives up.
    pub max_registration_attempts: u32,
    /// Attempts within one heartbeat call.
    pub max_heartbeat_retries: u32,
    /// Wait between register attempts.
    pub registration_backoff: LinearBackoff,
    /// Wait between failed heartbeat attempts.
    pub heartbeat_backoff: LinearBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_registration_attempts: 10,
            max_heartbeat_retries: 3,
            registration_backoff: LinearBackoff::new(
                Duration::from_secs(5),
                Duration::from_secs(30),
            ),
            heartbeat_backoff: LinearBackoff::new(Duration::from_secs(2), Duration::from_secs(10)),
        }
    }
}
