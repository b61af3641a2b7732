//! Attempt Audit Trail
//!
//! Every provider attempt produces one `AuditRecord` handed to an
//! `AuditSink`. The default sink writes a structured `tracing` event on the
//! `crosscheck::audit` target; the memory sink keeps records for inspection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Outcome of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// Failed; another attempt follows
    Retrying,
    /// Failed; no further attempt
    Failed,
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Retrying => write!(f, "retrying"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One provider attempt
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    /// 1-based attempt number within the call
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
    /// Delay scheduled before the next attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit/log collaborator
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Emits each record as a tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        match record.outcome {
            AttemptOutcome::Success => tracing::info!(
                target: "crosscheck::audit",
                provider = %record.provider,
                model = %record.model,
                attempt = record.attempt,
                outcome = %record.outcome,
                latency_ms = record.latency_ms,
                "provider attempt"
            ),
            AttemptOutcome::Retrying | AttemptOutcome::Failed => tracing::warn!(
                target: "crosscheck::audit",
                provider = %record.provider,
                model = %record.model,
                attempt = record.attempt,
                outcome = %record.outcome,
                latency_ms = record.latency_ms,
                backoff_ms = record.backoff_ms.unwrap_or(0),
                error = record.error.as_deref().unwrap_or(""),
                "provider attempt"
            ),
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn records_for(&self, provider: &str) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.provider == provider)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
    }
}
