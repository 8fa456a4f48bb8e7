//! Backoff state machine for failed pushes.

use crate::config::RetryConfig;
use std::time::Duration;

/// Disposition of the retry scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// No retry pending; the next push starts a fresh sequence.
    Ready,
    /// A retry is scheduled after the given delay.
    Waiting(Duration),
    /// The last sequence exhausted its attempts.
    GaveUp,
}

/// What the controller should do after a failed push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Push again once `delay` has elapsed.
    RetryAfter {
        /// Number of consecutive failures so far.
        attempt: u32,
        /// Backoff before the retry.
        delay: Duration,
    },
    /// Stop retrying and surface an error.
    GiveUp {
        /// Number of consecutive failures in the abandoned sequence.
        attempts: u32,
    },
}

/// Tracks consecutive push failures.
///
/// Failure `n` (1-indexed) waits `base_delay * n²` before retrying, until
/// `n == max_attempts`, at which point the scheduler gives up and resets the
/// counter so the next trigger starts from attempt 1 again.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    config: RetryConfig,
    attempt: u32,
    state: RetryState,
}

impl RetryScheduler {
    /// Creates a scheduler in the `Ready` state.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempt: 0,
            state: RetryState::Ready,
        }
    }

    /// Returns the number of consecutive failures in the current sequence.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the current state.
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Returns true while a retry is scheduled.
    pub fn is_waiting(&self) -> bool {
        matches!(self.state, RetryState::Waiting(_))
    }

    /// Records a failed push.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.attempt += 1;
        if self.attempt >= self.config.max_attempts {
            let attempts = self.attempt;
            self.attempt = 0;
            self.state = RetryState::GaveUp;
            return RetryDecision::GiveUp { attempts };
        }

        let delay = self.config.delay_for_attempt(self.attempt);
        self.state = RetryState::Waiting(delay);
        RetryDecision::RetryAfter {
            attempt: self.attempt,
            delay,
        }
    }

    /// Marks the scheduled delay as elapsed; the controller is about to push.
    pub fn retry_elapsed(&mut self) {
        if self.is_waiting() {
            self.state = RetryState::Ready;
        }
    }

    /// Records a successful push, from any state.
    pub fn record_success(&mut self) {
        self.reset();
    }

    /// Drops any sequence in progress.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.state = RetryState::Ready;
    }
}
