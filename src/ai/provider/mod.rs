//! LLM Provider Abstraction
//!
//! Defines the `LlmProvider` trait implemented by every backend and the
//! normalized `LlmResponse` all backends return.
//!
//! ## Modules
//!
//! - `client`: Provider client wrapping one backend with retry, health and rate limiting
//! - `registry`: Name-keyed table of live provider clients
//! - `retry`: Explicit retry policy (attempts, backoff schedule, deadline)
//! - `health`: Concurrency-safe health tracking per provider
//! - `rate_limit`: Token-bucket request/token ceilings per provider

mod anthropic;
mod client;
mod health;
#[cfg(test)]
pub(crate) mod mock;
mod ollama;
mod openai;
mod rate_limit;
mod registry;
mod retry;

pub use anthropic::AnthropicProvider;
pub use client::ProviderClient;
pub use health::{HealthSnapshot, HealthStatus, HealthThresholds, HealthTracker};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use rate_limit::{RateLimitMode, RateLimiter};
pub use registry::ProviderRegistry;
pub use retry::RetryPolicy;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RetrySettings;
use crate::constants::{generation, network};
use crate::types::{CrossCheckError, Result};

// =============================================================================
// Provider Kind
// =============================================================================

/// Supported backend families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }

    /// Whether a client for this backend needs an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }

    /// Environment variable consulted when the config carries no key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Ollama => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-sonnet-latest",
            Self::Ollama => "llama3:latest",
        }
    }

    /// Upper bound of the temperature range the backend accepts
    pub fn max_temperature(&self) -> f32 {
        match self {
            Self::Anthropic => generation::ANTHROPIC_MAX_TEMPERATURE,
            Self::OpenAi | Self::Ollama => generation::MAX_TEMPERATURE,
        }
    }

    pub fn all() -> &'static [ProviderKind] {
        &[Self::OpenAi, Self::Anthropic, Self::Ollama]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            _ => Err(format!(
                "Unknown provider: {}. Supported: openai, anthropic, ollama",
                s
            )),
        }
    }
}

// =============================================================================
// LLM Response
// =============================================================================

/// Normalized response returned by every backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text
    pub content: String,
    /// Token usage, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub timing: ResponseTiming,
    pub metadata: ResponseMetadata,
    /// Backend-specific fields kept for audit, never interpreted
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub raw: Map<String, Value>,
}

impl LlmResponse {
    pub fn new(content: impl Into<String>, metadata: ResponseMetadata) -> Self {
        Self {
            content: content.into(),
            usage: None,
            timing: ResponseTiming::default(),
            metadata,
            raw: Map::new(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_timing(mut self, timing: ResponseTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_raw(mut self, raw: Map<String, Value>) -> Self {
        self.raw = raw;
        self
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResponseTiming {
    /// Wall-clock time for the whole call, retries and waits included
    pub total_ms: u64,
    /// Time spent in the successful attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_ms: Option<u64>,
}

impl ResponseTiming {
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
            api_ms: Some(duration.as_millis() as u64),
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Logical provider name
    pub provider: String,
    /// Model that produced the response
    pub model: String,
    /// Attempts used to obtain this response
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ResponseMetadata {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            attempts: 1,
            finish_reason: None,
        }
    }
}

// =============================================================================
// Generation Parameters
// =============================================================================

/// Caller-supplied generation parameters; unset fields fall back to provider defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Per-attempt timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
}

impl GenerationParams {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    /// Fill unset fields from `base`; fields set here win
    pub fn or(self, base: &GenerationParams) -> Self {
        Self {
            model: self.model.or_else(|| base.model.clone()),
            max_tokens: self.max_tokens.or(base.max_tokens),
            temperature: self.temperature.or(base.temperature),
            timeout_secs: self.timeout_secs.or(base.timeout_secs),
        }
    }

    /// Apply provider defaults for every unset parameter
    pub fn resolve(&self, config: &ProviderConfig) -> ResolvedParams {
        ResolvedParams {
            model: self.model.clone().unwrap_or_else(|| config.model()),
            max_tokens: self
                .max_tokens
                .or(config.max_tokens)
                .unwrap_or(generation::DEFAULT_MAX_TOKENS),
            temperature: self
                .temperature
                .or(config.temperature)
                .unwrap_or(generation::DEFAULT_TEMPERATURE),
            timeout: self
                .timeout_secs
                .and_then(secs_to_duration)
                .unwrap_or_else(|| config.timeout()),
        }
    }
}

/// Fully resolved parameters handed to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ResolvedParams {
    /// Reject requests the given backend would not accept
    pub fn validate(&self, prompt: &str, kind: ProviderKind) -> std::result::Result<(), LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::new(
                ErrorCategory::BadRequest,
                "Prompt must not be empty",
            ));
        }
        if self.max_tokens == 0 || self.max_tokens > generation::MAX_TOKENS_LIMIT {
            return Err(LlmError::new(
                ErrorCategory::BadRequest,
                format!(
                    "max_tokens must be between 1 and {}, got {}",
                    generation::MAX_TOKENS_LIMIT,
                    self.max_tokens
                ),
            ));
        }
        let max_temperature = kind.max_temperature();
        if !(0.0..=max_temperature).contains(&self.temperature) {
            return Err(LlmError::new(
                ErrorCategory::BadRequest,
                format!(
                    "temperature for {} must be between 0.0 and {:.1}, got {}",
                    kind, max_temperature, self.temperature
                ),
            ));
        }
        Ok(())
    }
}

/// Positive seconds that fit in a `Duration`; anything else is unset
fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

/// Stand-in for "no deadline" when `start + after` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + after`, saturating instead of overflowing on huge durations
pub(crate) fn deadline_from(start: Instant, after: Duration) -> Instant {
    start
        .checked_add(after)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration record for one provider
///
/// Note: API keys are never serialized and are redacted in debug output.
/// Each backend converts the key to `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Logical name used by the registry (defaults to the provider kind)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub provider: ProviderKind,
    /// Never serialized to output
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    pub available_models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_requests_per_minute: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens_per_minute: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    /// API base URL (for custom endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub rate_limit_mode: RateLimitMode,
    /// Provider-level generation defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Overrides the global retry settings for this provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("default_model", &self.default_model)
            .field("available_models", &self.available_models)
            .field("max_requests_per_minute", &self.max_requests_per_minute)
            .field("max_tokens_per_minute", &self.max_tokens_per_minute)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("base_url", &self.base_url)
            .field("rate_limit_mode", &self.rate_limit_mode)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: None,
            provider: ProviderKind::default(),
            api_key: None,
            default_model: None,
            available_models: Vec::new(),
            max_requests_per_minute: None,
            max_tokens_per_minute: None,
            timeout_seconds: None,
            base_url: None,
            rate_limit_mode: RateLimitMode::default(),
            max_tokens: None,
            temperature: None,
            retry: None,
        }
    }
}

impl ProviderConfig {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Logical name the registry stores this provider under
    pub fn logical_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.provider.as_str().to_string())
    }

    pub fn model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_seconds
            .and_then(secs_to_duration)
            .unwrap_or_else(|| Duration::from_secs_f64(network::DEFAULT_TIMEOUT_SECS))
    }

    /// Configured key, or the backend's environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.provider
                    .api_key_env()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.available_models.is_empty()
            || self.available_models.iter().any(|m| m == model)
            || self.model() == model
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.logical_name();
        if name.trim().is_empty() {
            return Err(CrossCheckError::Config(
                "provider name must not be empty".to_string(),
            ));
        }
        if let Some(secs) = self.timeout_seconds
            && (!secs.is_finite() || secs <= 0.0)
        {
            return Err(CrossCheckError::Config(format!(
                "provider '{}': timeout_seconds must be positive",
                name
            )));
        }
        if self.max_requests_per_minute == Some(0) || self.max_tokens_per_minute == Some(0) {
            return Err(CrossCheckError::Config(format!(
                "provider '{}': rate limits must be greater than zero",
                name
            )));
        }
        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(CrossCheckError::Config(format!(
                "provider '{}': temperature must be between 0.0 and 2.0",
                name
            )));
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        Ok(())
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// One LLM backend: a single attempt per call, no retries
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one request and normalize the response
    async fn generate(
        &self,
        prompt: &str,
        params: &ResolvedParams,
    ) -> std::result::Result<LlmResponse, LlmError>;

    /// Logical provider name for logging
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Default model name
    fn model(&self) -> &str;

    /// Cheap liveness probe
    async fn health_check(&self) -> std::result::Result<(), LlmError>;
}

/// Shared backend type for concurrent access
pub type SharedProvider = Arc<dyn LlmProvider>;

/// Create a backend from configuration
///
/// Fails when the backend needs credentials and none are configured.
pub fn create_backend(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider {
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::new(config)?)),
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::new(config)?)),
        ProviderKind::Ollama => Ok(Arc::new(OllamaProvider::new(config)?)),
    }
}

/// Shared HTTP client construction for backends
pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
        .build()
        .map_err(|e| CrossCheckError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-success HTTP response into a classified error
pub(crate) async fn error_from_response(response: reqwest::Response, provider: &str) -> LlmError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    ErrorClassifier::classify_http_status(status, &body, retry_after.as_deref(), provider)
}

/// Missing API key error for a backend
pub(crate) fn missing_key_error(config: &ProviderConfig) -> CrossCheckError {
    CrossCheckError::Config(format!(
        "{} API key not found for provider '{}'. Set {} or provide api_key in config",
        config.provider,
        config.logical_name(),
        config.provider.api_key_env().unwrap_or("api_key")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert!("palm".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serde() {
        let json = serde_json::to_string(&ProviderKind::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_params_resolve_uses_provider_defaults() {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi);
        config.default_model = Some("gpt-4o".to_string());
        config.timeout_seconds = Some(2.0);
        config.max_tokens = Some(512);

        let resolved = GenerationParams::default().resolve(&config);
        assert_eq!(resolved.model, "gpt-4o");
        assert_eq!(resolved.max_tokens, 512);
        assert_eq!(resolved.temperature, generation::DEFAULT_TEMPERATURE);
        assert_eq!(resolved.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_params_resolve_caller_wins() {
        let config = ProviderConfig::new(ProviderKind::Anthropic);
        let params = GenerationParams::default()
            .with_model("claude-3-haiku")
            .with_temperature(0.1)
            .with_timeout(Duration::from_millis(500));

        let resolved = params.resolve(&config);
        assert_eq!(resolved.model, "claude-3-haiku");
        assert_eq!(resolved.temperature, 0.1);
        assert_eq!(resolved.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_params_or_fills_unset() {
        let base = GenerationParams::default()
            .with_temperature(0.3)
            .with_max_tokens(2000);
        let merged = GenerationParams::default().with_temperature(0.9).or(&base);
        assert_eq!(merged.temperature, Some(0.9));
        assert_eq!(merged.max_tokens, Some(2000));
    }

    #[test]
    fn test_resolved_params_validation() {
        let ok = ResolvedParams {
            model: "m".to_string(),
            max_tokens: 100,
            temperature: 0.5,
            timeout: Duration::from_secs(1),
        };
        assert!(ok.validate("hello", ProviderKind::OpenAi).is_ok());
        assert!(ok.validate("   ", ProviderKind::OpenAi).is_err());

        let too_many = ResolvedParams {
            max_tokens: generation::MAX_TOKENS_LIMIT + 1,
            ..ok.clone()
        };
        let err = too_many.validate("hello", ProviderKind::OpenAi).unwrap_err();
        assert_eq!(err.category, ErrorCategory::BadRequest);

        let too_hot = ResolvedParams {
            temperature: 2.5,
            ..ok
        };
        assert!(too_hot.validate("hello", ProviderKind::OpenAi).is_err());
    }

    #[test]
    fn test_anthropic_temperature_ceiling() {
        let warm = ResolvedParams {
            model: "m".to_string(),
            max_tokens: 100,
            temperature: 1.5,
            timeout: Duration::from_secs(1),
        };
        assert!(warm.validate("hello", ProviderKind::OpenAi).is_ok());
        assert!(warm.validate("hello", ProviderKind::Ollama).is_ok());

        let err = warm.validate("hello", ProviderKind::Anthropic).unwrap_err();
        assert_eq!(err.category, ErrorCategory::BadRequest);
        assert!(err.message.contains("anthropic"));

        let at_limit = ResolvedParams {
            temperature: 1.0,
            ..warm
        };
        assert!(at_limit.validate("hello", ProviderKind::Anthropic).is_ok());
    }

    #[test]
    fn test_out_of_range_timeouts_fall_back() {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi);
        config.timeout_seconds = Some(3.0);

        for secs in [1e20, f64::MAX, f64::INFINITY, f64::NAN, -1.0, 0.0] {
            let params = GenerationParams {
                timeout_secs: Some(secs),
                ..Default::default()
            };
            assert_eq!(params.resolve(&config).timeout, Duration::from_secs(3));
        }

        config.timeout_seconds = Some(1e20);
        assert_eq!(
            config.timeout(),
            Duration::from_secs_f64(network::DEFAULT_TIMEOUT_SECS)
        );
    }

    #[tokio::test]
    async fn test_deadline_from_saturates() {
        let now = Instant::now();
        assert_eq!(
            deadline_from(now, Duration::from_secs(5)),
            now + Duration::from_secs(5)
        );

        let far = deadline_from(now, Duration::MAX);
        assert!(far >= now + FAR_FUTURE);
        assert!(!far.saturating_duration_since(Instant::now()).is_zero());
    }

    #[test]
    fn test_provider_config_debug_redacts_key() {
        let config = ProviderConfig::new(ProviderKind::OpenAi).with_api_key("sk-secret");
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_provider_config_never_serializes_key() {
        let config = ProviderConfig::new(ProviderKind::OpenAi).with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_logical_name_defaults_to_kind() {
        let config = ProviderConfig::new(ProviderKind::Anthropic);
        assert_eq!(config.logical_name(), "anthropic");
        assert_eq!(config.with_name("judge").logical_name(), "judge");
    }

    #[test]
    fn test_create_backend_requires_credentials() {
        let mut config = ProviderConfig::new(ProviderKind::Anthropic);
        config.name = Some("no-key".to_string());
        // Only meaningful when the environment does not provide a key
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            assert!(matches!(
                create_backend(&config),
                Err(CrossCheckError::Config(_))
            ));
        }
        assert!(create_backend(&ProviderConfig::new(ProviderKind::Ollama)).is_ok());
    }

    #[test]
    fn test_provider_config_validate() {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi);
        assert!(config.validate().is_ok());
        config.timeout_seconds = Some(0.0);
        assert!(config.validate().is_err());
    }
}
