//! Retry Policy
//!
//! Explicit retry parameters for a provider client: attempt budget,
//! exponential backoff schedule with a ceiling, and an overall deadline.
//! The retryable predicate is the error category's own classification.

use rand::Rng;
use std::time::Duration;

use crate::config::RetrySettings;
use crate::types::LlmError;

/// Retry policy parameterizing one provider client
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call, first try included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Bound on the whole call across all attempts and waits
    pub deadline: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_factor: settings.backoff_factor.max(1.0),
            deadline: Duration::from_secs(settings.deadline_secs),
            jitter: settings.jitter,
        }
    }

    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn should_retry(&self, error: &LlmError) -> bool {
        error.is_retryable()
    }

    /// Delay for a given backoff level (level 1 = first retry)
    ///
    /// `base * factor^(level-1)`, capped at `max_delay`. Non-decreasing in
    /// `level`, strictly increasing until the cap when factor > 1.
    pub fn backoff_delay(&self, level: u32) -> Duration {
        if level == 0 {
            return Duration::ZERO;
        }
        let exponent = (level - 1).min(63) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay to wait before the next attempt
    ///
    /// A provider-supplied retry-after hint takes precedence over the schedule.
    pub fn next_delay(&self, level: u32, error: &LlmError) -> Duration {
        if let Some(hint) = error.retry_after {
            return hint;
        }
        let delay = self.backoff_delay(level);
        if self.jitter {
            std::cmp::min(delay + random_jitter(delay), self.max_delay)
        } else {
            delay
        }
    }
}

/// Random jitter up to a quarter of the delay
fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    Duration::from_millis(jitter_ms)
}
