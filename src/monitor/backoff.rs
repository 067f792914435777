// Retry delay after a failed monitor cycle.
//
// Flat by default: every failure waits `base`. With escalation on, each
// consecutive failure doubles the wait up to `max`. Any successful cycle
// resets to `base`.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub escalate: bool,
}

impl BackoffPolicy {
    pub fn flat(base: Duration) -> Self {
        Self {
            base,
            max: base,
            escalate: false,
        }
    }

    pub fn escalating(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            escalate: true,
        }
    }

    /// Delay to use after the `failures`-th consecutive failure (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        if !self.escalate || failures <= 1 {
            return self.base;
        }
        let factor = 2u32.saturating_pow(failures - 1);
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffState {
    pub consecutive_failures: u32,
    pub next_delay: Duration,
}

impl BackoffState {
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self {
            consecutive_failures: 0,
            next_delay: policy.base,
        }
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn record_failure(&mut self, policy: &BackoffPolicy) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = policy.delay_for(self.consecutive_failures);
        self.next_delay = policy.delay_for(self.consecutive_failures.saturating_add(1));
        delay
    }

    pub fn record_success(&mut self, policy: &BackoffPolicy) {
        self.consecutive_failures = 0;
        self.next_delay = policy.base;
    }
}
