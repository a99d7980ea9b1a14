//! Retry policy.

use std::time::Duration;

/// How many times to retry a failed request and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Double the wait after every retry.
    pub exponential: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, exponential: bool) -> Self {
        Self {
            max_retries,
            initial_delay,
            exponential,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, false)
    }

    /// Total attempts a request may make.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// The waits between consecutive attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let exponential = self.exponential;
        std::iter::successors(Some(self.initial_delay), move |d| {
            Some(if exponential { d.saturating_mul(2) } else { *d })
        })
        .take(self.max_retries as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000), true)
    }
}
