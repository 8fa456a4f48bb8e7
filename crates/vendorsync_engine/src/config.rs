//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for the sync controller.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet window after the last local change before a push starts.
    pub debounce: Duration,
    /// How long `SyncStatus::Success` is shown before decaying to `Idle`.
    pub success_decay: Duration,
    /// Retry configuration for failed pushes.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration with the default timings.
    pub fn new() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            success_decay: Duration::from_secs(2),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the success decay delay.
    pub fn with_success_decay(mut self, delay: Duration) -> Self {
        self.success_decay = delay;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// The delay before retry `n` (1-indexed) is `base_delay * n²`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Number of consecutive failures after which the push gives up.
    pub max_attempts: u32,
    /// Unit of the quadratic backoff.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs(1),
        }
    }

    /// Creates a configuration that gives up on the first failure.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Sets the backoff unit.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Calculates the delay before the given attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_mul(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
