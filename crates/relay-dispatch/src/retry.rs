//! Retry policy and the clock abstraction the dispatcher waits on.
//!
//! Backoff is deterministic: after the n-th failed attempt the dispatcher
//! waits `min(base_delay * 2^(n-1), max_delay)`. With the defaults (five
//! attempts, 250 ms base, 2 s cap) the delays are 250, 500, 1000 and 2000 ms.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_config::{
    Config, DEFAULT_ATTEMPT_TIMEOUT_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_MS,
};

/// Bounds for the send-with-retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    attempt_timeout: Duration,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS),
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self::new(
            config.max_attempts(),
            config.attempt_timeout(),
            config.retry_base_delay(),
            config.retry_max_delay(),
        )
    }
}

impl RetryPolicy {
    /// Builds a policy. `max_attempts` is clamped to at least one and
    /// `max_delay` to at least `base_delay`.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        attempt_timeout: Duration,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            attempt_timeout,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Maximum number of sends per command.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Reply deadline for each attempt.
    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1_u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Sum of every backoff delay a fully exhausted call waits.
    #[must_use]
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Upper bound on the wall-clock time of one call:
    /// `max_attempts * attempt_timeout + total_backoff`.
    #[must_use]
    pub fn worst_case_duration(&self) -> Duration {
        self.attempt_timeout
            .saturating_mul(self.max_attempts)
            .saturating_add(self.total_backoff())
    }
}

/// Time source for deadlines and backoff.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspends the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
