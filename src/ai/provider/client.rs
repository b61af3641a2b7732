//! Provider Client
//!
//! Wraps one backend with everything a generation call needs around the
//! raw request: parameter defaults and validation, local rate limiting,
//! per-attempt timeouts, retry with exponential backoff under an overall
//! deadline, health bookkeeping, audit records and metrics.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{
    GenerationParams, HealthStatus, HealthThresholds, HealthTracker, LlmProvider, LlmResponse,
    ProviderConfig, RateLimiter, RetryPolicy, SharedProvider, create_backend, deadline_from,
};
use crate::ai::audit::{AttemptOutcome, AuditRecord, SharedAuditSink, TracingAuditSink};
use crate::ai::metrics::SharedMetrics;
use crate::config::RetrySettings;
use crate::types::{ErrorCategory, LlmError, Result};

/// Live client for one configured provider, shared across concurrent callers
pub struct ProviderClient {
    name: String,
    config: ProviderConfig,
    backend: SharedProvider,
    policy: RetryPolicy,
    health: HealthTracker,
    limiter: RateLimiter,
    audit: SharedAuditSink,
    metrics: Option<SharedMetrics>,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ProviderClient {
    /// Build the backend named by `config` and wrap it
    ///
    /// Fails when the backend requires credentials that are not configured.
    pub fn from_config(config: &ProviderConfig, default_retry: &RetrySettings) -> Result<Self> {
        let backend = create_backend(config)?;
        let settings = config.retry.as_ref().unwrap_or(default_retry);
        Ok(Self::with_backend(config.clone(), backend)
            .with_retry_policy(RetryPolicy::from_settings(settings)))
    }

    /// Wrap an already constructed backend
    pub fn with_backend(config: ProviderConfig, backend: SharedProvider) -> Self {
        let name = config.logical_name();
        let policy = config
            .retry
            .as_ref()
            .map(RetryPolicy::from_settings)
            .unwrap_or_default();
        let limiter = RateLimiter::new(
            name.clone(),
            config.max_requests_per_minute,
            config.max_tokens_per_minute,
            config.rate_limit_mode,
        );
        Self {
            health: HealthTracker::with_defaults(name.clone()),
            name,
            config,
            backend,
            policy,
            limiter,
            audit: Arc::new(TracingAuditSink),
            metrics: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_health_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.health = HealthTracker::new(self.name.clone(), thresholds);
        self
    }

    pub fn with_audit_sink(mut self, sink: SharedAuditSink) -> Self {
        self.audit = sink;
        self
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub fn backend(&self) -> &dyn LlmProvider {
        self.backend.as_ref()
    }

    /// Generate a completion, retrying transient failures
    ///
    /// Non-retryable failures return after the first attempt. Transient
    /// failures that outlast the attempt budget or the deadline surface as
    /// `Unavailable`; rate limits and timeouts keep their own category.
    pub async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<LlmResponse> {
        let resolved = params.resolve(&self.config);
        if let Err(err) = resolved.validate(prompt, self.config.provider) {
            let err = err.provider(&self.name);
            self.record_metrics_failure(&err, Duration::ZERO);
            return Err(err.into());
        }
        if !self.config.supports_model(&resolved.model) {
            warn!(
                provider = %self.name,
                model = %resolved.model,
                "Model not in available_models, sending anyway"
            );
        }

        let started = Instant::now();
        let deadline = deadline_from(started, self.policy.deadline);
        let token_estimate = RateLimiter::estimate_tokens(prompt, resolved.max_tokens);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait_budget = resolved.timeout.min(remaining);
            if let Err(err) = self.limiter.acquire(token_estimate, wait_budget).await {
                warn!(provider = %self.name, attempt, "Rate limit ceiling reached");
                self.record_metrics_failure(&err, started.elapsed());
                return Err(err.into());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let err = LlmError::with_provider(
                    ErrorCategory::Timeout,
                    format!("Deadline of {:?} exceeded before attempt {}", self.policy.deadline, attempt),
                    &self.name,
                );
                self.record_metrics_failure(&err, started.elapsed());
                return Err(err.into());
            }
            let attempt_timeout = resolved.timeout.min(remaining);

            debug!(
                provider = %self.name,
                model = %resolved.model,
                attempt,
                timeout_ms = attempt_timeout.as_millis() as u64,
                "Dispatching attempt"
            );

            let attempt_start = Instant::now();
            let outcome =
                match tokio::time::timeout(attempt_timeout, self.backend.generate(prompt, &resolved))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::with_provider(
                        ErrorCategory::Timeout,
                        format!("Attempt timed out after {:?}", attempt_timeout),
                        &self.name,
                    )),
                };
            let latency = attempt_start.elapsed();

            match outcome {
                Ok(mut response) => {
                    self.health.record_success();
                    self.emit_audit(&resolved.model, attempt, AttemptOutcome::Success, latency, None, None);

                    response.metadata.provider = self.name.clone();
                    response.metadata.attempts = attempt;
                    response.timing.total_ms = started.elapsed().as_millis() as u64;
                    response.timing.api_ms = Some(latency.as_millis() as u64);

                    if let Some(metrics) = &self.metrics {
                        metrics.record_success(&response);
                    }
                    info!(
                        provider = %self.name,
                        model = %response.metadata.model,
                        attempts = attempt,
                        latency_ms = response.timing.total_ms,
                        "Generation succeeded"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    let err = if err.provider.is_none() {
                        err.provider(&self.name)
                    } else {
                        err
                    };
                    let level = self.health.record_failure();

                    let delay = (self.policy.should_retry(&err)
                        && attempt < self.policy.max_attempts)
                        .then(|| self.policy.next_delay(level, &err))
                        .filter(|delay| deadline_from(Instant::now(), *delay) < deadline);

                    match delay {
                        Some(delay) => {
                            self.emit_audit(
                                &resolved.model,
                                attempt,
                                AttemptOutcome::Retrying,
                                latency,
                                Some(delay),
                                Some(&err),
                            );
                            debug!(
                                provider = %self.name,
                                attempt,
                                backoff_ms = delay.as_millis() as u64,
                                error = %err,
                                "Retrying after backoff"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            self.emit_audit(
                                &resolved.model,
                                attempt,
                                AttemptOutcome::Failed,
                                latency,
                                None,
                                Some(&err),
                            );
                            let err = self.exhausted(err, attempt);
                            warn!(provider = %self.name, attempts = attempt, error = %err, "Generation failed");
                            self.record_metrics_failure(&err, started.elapsed());
                            return Err(err.into());
                        }
                    }
                }
            }
        }
    }

    /// Liveness probe; never touches the rate limiter or attempt counters
    pub async fn health_check(&self) -> HealthStatus {
        let probe = tokio::time::timeout(self.config.timeout(), self.backend.health_check()).await;
        let ok = match probe {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                debug!(provider = %self.name, error = %err, "Health probe failed");
                false
            }
            Err(_) => {
                debug!(provider = %self.name, "Health probe timed out");
                false
            }
        };
        self.health.status(ok)
    }

    /// Final error once no further attempt will be made
    fn exhausted(&self, err: LlmError, attempts: u32) -> LlmError {
        match err.category {
            ErrorCategory::Network | ErrorCategory::Transient => LlmError {
                category: ErrorCategory::Unavailable,
                message: format!(
                    "Provider unavailable after {} attempt(s): {}",
                    attempts, err.message
                ),
                ..err
            },
            _ => err,
        }
    }

    fn emit_audit(
        &self,
        model: &str,
        attempt: u32,
        outcome: AttemptOutcome,
        latency: Duration,
        backoff: Option<Duration>,
        error: Option<&LlmError>,
    ) {
        self.audit.record(&AuditRecord {
            timestamp: chrono::Utc::now(),
            provider: self.name.clone(),
            model: model.to_string(),
            attempt,
            outcome,
            latency_ms: latency.as_millis() as u64,
            backoff_ms: backoff.map(|d| d.as_millis() as u64),
            error: error.map(|e| e.to_string()),
        });
    }

    fn record_metrics_failure(&self, err: &LlmError, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(
                &self.name,
                err.category.failure_kind(),
                elapsed.as_millis() as u64,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::audit::MemoryAuditSink;
    use crate::ai::metrics::create_shared_metrics;
    use crate::ai::provider::mock::MockProvider;
    use crate::ai::provider::{ProviderKind, RateLimitMode};
    use crate::types::{CrossCheckError, FailureKind};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(attempts)
            .with_base_delay(Duration::from_millis(5))
            .with_max_delay(Duration::from_millis(200))
            .with_deadline(Duration::from_secs(10))
            .with_jitter(false)
    }

    fn make_client(mock: MockProvider, policy: RetryPolicy) -> (ProviderClient, Arc<MockProvider>) {
        let mock = Arc::new(mock);
        let config = ProviderConfig::new(ProviderKind::OpenAi).with_name(mock.name().to_string());
        let client = ProviderClient::with_backend(config, mock.clone()).with_retry_policy(policy);
        (client, mock)
    }

    fn llm_category(err: CrossCheckError) -> ErrorCategory {
        match err {
            CrossCheckError::Llm(e) => e.category,
            other => panic!("expected LLM error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let mock = MockProvider::new("openai")
            .then_err(ErrorCategory::Transient)
            .then_err(ErrorCategory::Network)
            .then_ok("done");
        let (client, mock) = make_client(mock, fast_policy(3));

        let response = client.generate("hello", &GenerationParams::default()).await.unwrap();
        assert_eq!(response.content, "done");
        assert_eq!(response.metadata.attempts, 3);
        assert_eq!(mock.calls(), 3);
        assert_eq!(client.health().consecutive_failures(), 0);
        assert_eq!(client.health().backoff_level(), 0);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let mock = MockProvider::new("openai").always_err(ErrorCategory::Auth, Duration::ZERO);
        let (client, mock) = make_client(mock, fast_policy(5));

        let err = client.generate("hello", &GenerationParams::default()).await.unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::AuthenticationError);
        assert_eq!(mock.calls(), 1);
        assert_eq!(client.health().consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_transient_becomes_unavailable() {
        let mock = MockProvider::new("openai").always_err(ErrorCategory::Transient, Duration::ZERO);
        let (client, mock) = make_client(mock, fast_policy(3));

        let err = client.generate("hello", &GenerationParams::default()).await.unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::ProviderUnavailable);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_reported_as_timeout() {
        let mock = MockProvider::new("slow").always_ok("late", Duration::from_millis(300));
        let (client, _mock) = make_client(mock, fast_policy(1));

        let params = GenerationParams::default().with_timeout(Duration::from_millis(30));
        let err = client.generate("hello", &params).await.unwrap_err();
        assert_eq!(llm_category(err), ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_backend() {
        let (client, mock) = make_client(MockProvider::new("openai"), fast_policy(3));

        let params = GenerationParams::default().with_max_tokens(40_000);
        let err = client.generate("hello", &params).await.unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::InvalidRequest);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_anthropic_temperature_rejected_before_dispatch() {
        let mock = Arc::new(MockProvider::new("anthropic").with_kind(ProviderKind::Anthropic));
        let config = ProviderConfig::new(ProviderKind::Anthropic).with_name("anthropic");
        let client =
            ProviderClient::with_backend(config, mock.clone()).with_retry_policy(fast_policy(3));

        let params = GenerationParams::default().with_temperature(1.5);
        let err = client.generate("hello", &params).await.unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::InvalidRequest);
        assert_eq!(mock.calls(), 0);

        let params = GenerationParams::default().with_temperature(1.0);
        assert!(client.generate("hello", &params).await.is_ok());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_huge_deadline_and_timeout_do_not_overflow() {
        let policy = fast_policy(2).with_deadline(Duration::from_secs(u64::MAX / 2));
        let mock = MockProvider::new("openai").then_err(ErrorCategory::Transient);
        let (client, mock) = make_client(mock, policy);

        let params = GenerationParams {
            timeout_secs: Some(1e19),
            ..Default::default()
        };
        let response = client.generate("hello", &params).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(response.metadata.attempts, 2);
        assert_eq!(mock.calls(), 2);

        let params = GenerationParams {
            timeout_secs: Some(1e20),
            ..Default::default()
        };
        assert!(client.generate("hello", &params).await.is_ok());
    }

    #[tokio::test]
    async fn test_backoff_grows_between_consecutive_failures() {
        let sink = Arc::new(MemoryAuditSink::new());
        let mock = MockProvider::new("openai").always_err(ErrorCategory::Transient, Duration::ZERO);
        let (client, _mock) = make_client(mock, fast_policy(5));
        let client = client.with_audit_sink(sink.clone());

        let _ = client.generate("hello", &GenerationParams::default()).await;

        let records = sink.records();
        assert_eq!(records.len(), 5);
        let backoffs: Vec<u64> = records.iter().filter_map(|r| r.backoff_ms).collect();
        assert_eq!(backoffs, vec![5, 10, 20, 40]);
        assert!(backoffs.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(records.last().map(|r| r.outcome), Some(AttemptOutcome::Failed));
        assert!(records.iter().enumerate().all(|(i, r)| r.attempt == i as u32 + 1));
    }

    #[tokio::test]
    async fn test_concurrent_calls_count_every_failure() {
        let mock = MockProvider::new("shared").always_err(ErrorCategory::Transient, Duration::from_millis(2));
        let (client, mock) = make_client(mock, fast_policy(3));
        let client = Arc::new(client);

        let a = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.generate("one", &GenerationParams::default()).await }
        });
        let b = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.generate("two", &GenerationParams::default()).await }
        });
        assert!(a.await.unwrap().is_err());
        assert!(b.await.unwrap().is_err());

        assert_eq!(mock.calls(), 6);
        assert_eq!(client.health().consecutive_failures(), 6);
    }

    #[tokio::test]
    async fn test_fail_fast_rate_limit() {
        let mock = Arc::new(MockProvider::new("limited"));
        let mut config = ProviderConfig::new(ProviderKind::OpenAi).with_name("limited");
        config.max_requests_per_minute = Some(1);
        config.rate_limit_mode = RateLimitMode::FailFast;
        let client = ProviderClient::with_backend(config, mock.clone()).with_retry_policy(fast_policy(1));

        client.generate("first", &GenerationParams::default()).await.unwrap();
        let err = client.generate("second", &GenerationParams::default()).await.unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::RateLimited);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let metrics = create_shared_metrics("client");
        let mock = MockProvider::new("openai")
            .then_err(ErrorCategory::Auth)
            .then_ok("fine");
        let (client, _mock) = make_client(mock, fast_policy(1));
        let client = client.with_metrics(metrics.clone());

        let _ = client.generate("a", &GenerationParams::default()).await;
        let _ = client.generate("b", &GenerationParams::default()).await;

        let summary = metrics.summary();
        assert_eq!(summary.successes, 1);
        assert_eq!(summary.failure_kinds["authentication_error"], 1);
    }

    #[tokio::test]
    async fn test_health_check_combines_probe_and_history() {
        let (client, _mock) = make_client(MockProvider::new("up"), fast_policy(1));
        assert_eq!(client.health_check().await, HealthStatus::Healthy);

        let (down, _mock) = make_client(MockProvider::new("down").unhealthy(), fast_policy(1));
        assert_eq!(down.health_check().await, HealthStatus::Unreachable);

        let flaky = MockProvider::new("flaky").always_err(ErrorCategory::Transient, Duration::ZERO);
        let (flaky, _mock) = make_client(flaky, fast_policy(3));
        let _ = flaky.generate("x", &GenerationParams::default()).await;
        assert_eq!(flaky.health_check().await, HealthStatus::Degraded);
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = ProviderConfig::new(ProviderKind::Ollama).with_name("local");
        let client = ProviderClient::from_config(&config, &RetrySettings::default()).unwrap();
        assert_eq!(client.name(), "local");
        assert_eq!(client.policy().max_attempts, RetrySettings::default().max_attempts);
    }
}
