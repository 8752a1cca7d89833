use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

/// Connection lifecycle state, owned by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Backoff,
}

/// Exponential backoff policy: `delay = min(base * 2^attempt, cap)`
///
/// Pure arithmetic, independent of any timer, so the reconnect schedule is
/// testable without real delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Consecutive failures tolerated before giving up
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Saturate the shift so a large attempt count cannot overflow
        let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = (self.base.as_millis() as u64).saturating_mul(multiplier);
        Duration::from_millis(delay_ms).min(self.cap)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Attempt bookkeeping for one connection session
///
/// `record_failure` returns the delay to sleep before the next attempt, or
/// `None` once the budget is exhausted; `record_success` resets the counter.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: BackoffPolicy,
    attempt: u32,
}

impl RetrySchedule {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Register a consecutive failure; `None` means the budget is spent
    pub fn record_failure(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// A successful CONNECTED transition resets the counter
    pub fn record_success(&mut self) {
        self.attempt = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }
}
