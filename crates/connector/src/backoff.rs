use std::time::Duration;

/// Reconnect delay policy: start at `initial`, multiply on every consecutive
/// failure, never exceed `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    /// Same 1-2-4-...-60 shape in units of `unit`
    pub fn with_unit(unit: Duration) -> Self {
        Self {
            initial: unit,
            max: unit * 60,
            multiplier: 2,
        }
    }
}

/// Tracks consecutive failures for one connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            next: policy.initial,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before the next attempt.
    pub fn on_failure(&mut self) -> Duration {
        let delay = self.next.min(self.policy.max);
        self.failures = self.failures.saturating_add(1);
        self.next = delay
            .checked_mul(self.policy.multiplier)
            .unwrap_or(self.policy.max)
            .min(self.policy.max);
        delay
    }

    /// Record a successful connection; the next failure waits `initial` again.
    pub fn on_success(&mut self) {
        self.next = self.policy.initial;
        self.failures = 0;
    }

    /// Consecutive failures since the last success
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
