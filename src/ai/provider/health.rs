//! Provider Health Tracking
//!
//! Runtime health state for one provider client, shared by every caller
//! that uses the client concurrently.
//!
//! ## Status
//!
//! - **Healthy**: probe succeeded and recent attempts mostly succeed
//! - **Degraded**: probe succeeded but the recent failure rate or the
//!   consecutive failure count crossed its threshold
//! - **Unreachable**: probe failed or did not answer in time
//!
//! Every generation attempt records an outcome. A success resets the
//! consecutive failure count and backoff level; a failure increments both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;

use crate::config::HealthConfig;

/// Liveness status reported by health checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unreachable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Thresholds at which a reachable provider is reported degraded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    pub failure_rate: f64,
    pub consecutive_failures: u32,
    /// Number of recent attempts the failure rate is computed over
    pub window: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for HealthThresholds {
    fn from(config: &HealthConfig) -> Self {
        Self {
            failure_rate: config.degraded_failure_rate,
            consecutive_failures: config.degraded_consecutive_failures,
            window: config.window.max(1),
        }
    }
}

/// Unified internal state - all mutable state in single struct
/// so counters and the outcome window always move together
#[derive(Debug)]
struct HealthInner {
    consecutive_failures: u32,
    backoff_level: u32,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    total_successes: u64,
    total_failures: u64,
    /// true = success
    recent: VecDeque<bool>,
}

impl HealthInner {
    fn new(window: usize) -> Self {
        Self {
            consecutive_failures: 0,
            backoff_level: 0,
            last_success: None,
            last_failure: None,
            total_successes: 0,
            total_failures: 0,
            recent: VecDeque::with_capacity(window),
        }
    }

    fn push_outcome(&mut self, success: bool, window: usize) {
        if self.recent.len() >= window {
            self.recent.pop_front();
        }
        self.recent.push_back(success);
    }

    fn recent_failure_rate(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let failures = self.recent.iter().filter(|ok| !**ok).count();
        failures as f64 / self.recent.len() as f64
    }
}

/// Point-in-time copy of a provider's health counters
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub provider: String,
    pub consecutive_failures: u32,
    pub backoff_level: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub total_successes: u64,
    pub total_failures: u64,
    pub recent_failure_rate: f64,
}

/// Thread-safe health tracker with unified state management
pub struct HealthTracker {
    provider_name: String,
    thresholds: HealthThresholds,
    inner: RwLock<HealthInner>,
}

impl std::fmt::Debug for HealthTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthTracker")
            .field("provider_name", &self.provider_name)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl HealthTracker {
    pub fn new(provider_name: impl Into<String>, thresholds: HealthThresholds) -> Self {
        Self {
            provider_name: provider_name.into(),
            thresholds,
            inner: RwLock::new(HealthInner::new(thresholds.window)),
        }
    }

    pub fn with_defaults(provider_name: impl Into<String>) -> Self {
        Self::new(provider_name, HealthThresholds::default())
    }

    /// Record a successful attempt
    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if inner.consecutive_failures > 0 {
            tracing::info!(
                "Provider health [{}]: Recovered after {} consecutive failures",
                self.provider_name,
                inner.consecutive_failures
            );
        }
        inner.consecutive_failures = 0;
        inner.backoff_level = 0;
        inner.total_successes += 1;
        inner.last_success = Some(Utc::now());
        inner.push_outcome(true, self.thresholds.window);
    }

    /// Record a failed attempt, returning the new backoff level
    pub fn record_failure(&self) -> u32 {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.backoff_level = inner.backoff_level.saturating_add(1);
        inner.total_failures += 1;
        inner.last_failure = Some(Utc::now());
        inner.push_outcome(false, self.thresholds.window);

        if inner.consecutive_failures == self.thresholds.consecutive_failures {
            tracing::warn!(
                "Provider health [{}]: Degraded after {} consecutive failures",
                self.provider_name,
                inner.consecutive_failures
            );
        }
        inner.backoff_level
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .consecutive_failures
    }

    pub fn backoff_level(&self) -> u32 {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .backoff_level
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last_success
    }

    /// Whether recent attempts crossed a degradation threshold
    pub fn is_degraded(&self) -> bool {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.consecutive_failures >= self.thresholds.consecutive_failures
            || inner.recent_failure_rate() >= self.thresholds.failure_rate
    }

    /// Combine a probe outcome with recorded attempt history
    pub fn status(&self, probe_ok: bool) -> HealthStatus {
        if !probe_ok {
            HealthStatus::Unreachable
        } else if self.is_degraded() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        HealthSnapshot {
            provider: self.provider_name.clone(),
            consecutive_failures: inner.consecutive_failures,
            backoff_level: inner.backoff_level,
            last_success: inner.last_success,
            last_failure: inner.last_failure,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            recent_failure_rate: inner.recent_failure_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tracker() -> HealthTracker {
        HealthTracker::new(
            "test",
            HealthThresholds {
                failure_rate: 0.5,
                consecutive_failures: 3,
                window: 4,
            },
        )
    }

    #[test]
    fn test_failure_increments_and_success_resets() {
        let tracker = tracker();
        assert_eq!(tracker.record_failure(), 1);
        assert_eq!(tracker.record_failure(), 2);
        assert_eq!(tracker.consecutive_failures(), 2);
        assert_eq!(tracker.backoff_level(), 2);
        assert!(tracker.last_success().is_none());

        tracker.record_success();
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.backoff_level(), 0);
        assert!(tracker.last_success().is_some());
    }

    #[test]
    fn test_status_from_probe_and_history() {
        let tracker = tracker();
        assert_eq!(tracker.status(true), HealthStatus::Healthy);
        assert_eq!(tracker.status(false), HealthStatus::Unreachable);

        tracker.record_success();
        tracker.record_failure();
        // 1 of 2 recent attempts failed
        assert_eq!(tracker.status(true), HealthStatus::Degraded);
    }

    #[test]
    fn test_window_forgets_old_failures() {
        let tracker = tracker();
        tracker.record_failure();
        for _ in 0..4 {
            tracker.record_success();
        }
        assert_eq!(tracker.snapshot().recent_failure_rate, 0.0);
        assert_eq!(tracker.status(true), HealthStatus::Healthy);
        assert_eq!(tracker.snapshot().total_failures, 1);
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let tracker = Arc::new(HealthTracker::with_defaults("shared"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        tracker.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.consecutive_failures(), 2_000);
        assert_eq!(tracker.snapshot().total_failures, 2_000);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unreachable).unwrap(),
            "\"unreachable\""
        );
    }
}
