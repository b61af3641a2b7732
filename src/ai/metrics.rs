//! Generation Metrics Collection
//!
//! Metrics sink for provider calls: request counts, latency, tokens and
//! failure kinds, overall and per provider. Thread-safe for concurrent
//! cross-check fan-out.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = MetricsCollector::new("session-123");
//! metrics.record_success(&response);
//! let summary = metrics.summary();
//! ```

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::ai::provider::LlmResponse;
use crate::types::FailureKind;

// =============================================================================
// Metrics Collector
// =============================================================================

#[derive(Debug, Default)]
struct ProviderCounters {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_latency_ms: AtomicU64,
    max_latency_ms: AtomicU64,
}

impl ProviderCounters {
    fn observe_latency(&self, latency_ms: u64) {
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);
    }
}

/// Thread-safe metrics collector.
///
/// Atomic counters for totals and DashMap-sharded breakdowns keep
/// contention low when many provider tasks report at once.
pub struct MetricsCollector {
    session_id: String,
    start_time: Instant,
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
    providers: DashMap<String, ProviderCounters>,
    failure_kinds: DashMap<FailureKind, AtomicU64>,
}

/// Per-provider breakdown
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetrics {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
}

/// Summary statistics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub session_id: String,
    pub total_duration_ms: u64,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub avg_latency_ms: f64,
    pub providers: BTreeMap<String, ProviderMetrics>,
    pub failure_kinds: BTreeMap<String, u64>,
}

impl MetricsCollector {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            start_time: Instant::now(),
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            providers: DashMap::new(),
            failure_kinds: DashMap::new(),
        }
    }

    /// Record a successful call
    pub fn record_success(&self, response: &LlmResponse) {
        let latency_ms = response.timing.total_ms;
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        if let Some(usage) = response.usage {
            self.prompt_tokens
                .fetch_add(u64::from(usage.prompt_tokens), Ordering::Relaxed);
            self.completion_tokens
                .fetch_add(u64::from(usage.completion_tokens), Ordering::Relaxed);
        }

        let entry = self
            .providers
            .entry(response.metadata.provider.clone())
            .or_default();
        entry.requests.fetch_add(1, Ordering::Relaxed);
        entry.successes.fetch_add(1, Ordering::Relaxed);
        entry.observe_latency(latency_ms);
    }

    /// Record a failed call
    pub fn record_failure(&self, provider: &str, kind: FailureKind, latency_ms: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        {
            let entry = self.providers.entry(provider.to_string()).or_default();
            entry.requests.fetch_add(1, Ordering::Relaxed);
            entry.failures.fetch_add(1, Ordering::Relaxed);
            entry.observe_latency(latency_ms);
        }

        self.failure_kinds
            .entry(kind)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSummary {
        let requests = self.requests.load(Ordering::Relaxed);
        let prompt_tokens = self.prompt_tokens.load(Ordering::Relaxed);
        let completion_tokens = self.completion_tokens.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let providers = self
            .providers
            .iter()
            .map(|entry| {
                let c = entry.value();
                let requests = c.requests.load(Ordering::Relaxed);
                let metrics = ProviderMetrics {
                    requests,
                    successes: c.successes.load(Ordering::Relaxed),
                    failures: c.failures.load(Ordering::Relaxed),
                    avg_latency_ms: average(c.total_latency_ms.load(Ordering::Relaxed), requests),
                    max_latency_ms: c.max_latency_ms.load(Ordering::Relaxed),
                };
                (entry.key().clone(), metrics)
            })
            .collect();

        let failure_kinds = self
            .failure_kinds
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSummary {
            session_id: self.session_id.clone(),
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            requests,
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            avg_latency_ms: average(total_latency, requests),
            providers,
            failure_kinds,
        }
    }

    /// Get final summary
    pub fn summary(&self) -> MetricsSummary {
        self.snapshot()
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count > 0 {
        total as f64 / count as f64
    } else {
        0.0
    }
}

impl MetricsSummary {
    /// Format summary for display
    pub fn display(&self) -> String {
        format!(
            "Session: {}\n\
             Duration: {:.1}s\n\
             Requests: {} (ok: {}, failed: {})\n\
             Tokens: {} (prompt: {}, completion: {})\n\
             Avg Latency: {:.0}ms",
            self.session_id,
            self.total_duration_ms as f64 / 1000.0,
            self.requests,
            self.successes,
            self.failures,
            self.total_tokens,
            self.prompt_tokens,
            self.completion_tokens,
            self.avg_latency_ms,
        )
    }
}

// =============================================================================
// Shared Type
// =============================================================================

/// Shared metrics collector
pub type SharedMetrics = Arc<MetricsCollector>;

pub fn create_shared_metrics(session_id: impl Into<String>) -> SharedMetrics {
    Arc::new(MetricsCollector::new(session_id))
}

// =============================================================================
// Tests
// =============================================================================
