//! AI Integration Layer
//!
//! Provider backends and clients, prompt templates, the LLM manager that
//! ties them together, and the audit/metrics collaborators.

pub mod audit;
pub mod manager;
pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod timeout;

pub use audit::{
    AttemptOutcome, AuditRecord, AuditSink, MemoryAuditSink, SharedAuditSink, TracingAuditSink,
};
pub use manager::{CodeReviewRequest, LlmManager, ProviderHealth};
pub use metrics::{
    MetricsCollector, MetricsSummary, ProviderMetrics, SharedMetrics, create_shared_metrics,
};
pub use prompt::{CacheStats, Template, TemplateContext, TemplateStore};
pub use provider::{
    ErrorCategory, ErrorClassifier, GenerationParams, HealthStatus, LlmError, LlmProvider,
    LlmResponse, ProviderClient, ProviderConfig, ProviderKind, ProviderRegistry, ResponseMetadata,
    ResponseTiming, RetryPolicy, TokenUsage,
};
pub use timeout::{TimeoutConfig, with_timeout, with_timeout_map};
