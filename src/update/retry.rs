//! RetryPolicy - bounds and pacing for the conflict-retry loop.

use std::time::Duration;

use rand::Rng;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY_MS: u64 = 10;
const DEFAULT_MAX_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: f64 = 2.0;

/// How many times, and how patiently, to retry after a version conflict.
///
/// Only conflicts are retried. Transient backend failures are reported to
/// the caller straight away.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total read-modify-write cycles, including the first. At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Spread delays by ±10% so competing writers drift apart.
    pub jitter: bool,
    /// Give up once the next retry would start after this budget.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter: true,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, without sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
            deadline: None,
        }
    }

    /// Delay before retry number `attempt` (1 = the first retry).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = BACKOFF_FACTOR.powi(attempt.saturating_sub(1).min(32) as i32);
        let base = self.base_delay.as_secs_f64() * exp;
        let spread = if self.jitter {
            rand::rng().random_range(0.9..1.1)
        } else {
            1.0
        };
        let delay = Duration::try_from_secs_f64(base * spread).unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }
}
