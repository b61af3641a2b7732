//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/crosscheck/) and project (.crosscheck/) level configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::ai::provider::ProviderConfig;
use crate::constants::{cache, crosscheck, health, retry};
use crate::types::{CrossCheckError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    pub logging: LoggingConfig,

    /// Template directories and cache behavior
    pub templates: TemplateConfig,

    /// Default retry policy for every provider
    pub retry: RetrySettings,

    /// Health rollup and degradation thresholds
    pub health: HealthConfig,

    /// Cross-check orchestration defaults
    pub crosscheck: CrossCheckConfig,

    /// Configured providers
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            logging: LoggingConfig::default(),
            templates: TemplateConfig::default(),
            retry: RetrySettings::default(),
            health: HealthConfig::default(),
            crosscheck: CrossCheckConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `CrossCheckError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.templates.cache_size == 0 {
            return Err(CrossCheckError::Config(
                "templates.cache_size must be greater than 0".to_string(),
            ));
        }

        self.retry.validate()?;

        if self.health.timeout_secs == 0 {
            return Err(CrossCheckError::Config(
                "health.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.health.degraded_failure_rate) {
            return Err(CrossCheckError::Config(format!(
                "health.degraded_failure_rate must be between 0.0 and 1.0, got {}",
                self.health.degraded_failure_rate
            )));
        }

        if !(0.0..=2.0).contains(&self.crosscheck.temperature) {
            return Err(CrossCheckError::Config(format!(
                "crosscheck.temperature must be between 0.0 and 2.0, got {}",
                self.crosscheck.temperature
            )));
        }
        if self.crosscheck.deadline_secs == 0 {
            return Err(CrossCheckError::Config(
                "crosscheck.deadline_secs must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            provider.validate()?;
            let name = provider.logical_name();
            if !seen.insert(name.clone()) {
                return Err(CrossCheckError::Config(format!(
                    "Duplicate provider name: {}",
                    name
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}. Valid values: text, json", s)),
        }
    }
}

// =============================================================================
// Template Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directories searched in order; the first containing a template wins
    pub dirs: Vec<PathBuf>,

    /// Maximum compiled templates kept in memory
    pub cache_size: usize,

    /// Development mode: re-parse templates whose file changed
    pub auto_reload: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dirs: vec![PathBuf::from("prompts")],
            cache_size: cache::MAX_TEMPLATE_ENTRIES,
            auto_reload: false,
        }
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per call, first try included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    /// Overall deadline across all attempts (seconds)
    pub deadline_secs: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay_ms: retry::BASE_DELAY_MS,
            max_delay_ms: retry::MAX_DELAY_MS,
            backoff_factor: retry::BACKOFF_FACTOR,
            deadline_secs: retry::DEADLINE_SECS,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CrossCheckError::Config(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(CrossCheckError::Config(format!(
                "retry.backoff_factor must be at least 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(CrossCheckError::Config(
                "retry.max_delay_ms must not be smaller than retry.base_delay_ms".to_string(),
            ));
        }
        if self.deadline_secs == 0 {
            return Err(CrossCheckError::Config(
                "retry.deadline_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Health Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Bound for the whole health rollup (seconds)
    pub timeout_secs: u64,
    pub degraded_failure_rate: f64,
    pub degraded_consecutive_failures: u32,
    /// Recent attempts considered for the failure rate
    pub window: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_secs: health::ROLLUP_TIMEOUT_SECS,
            degraded_failure_rate: health::DEGRADED_FAILURE_RATE,
            degraded_consecutive_failures: health::DEGRADED_CONSECUTIVE_FAILURES,
            window: health::OUTCOME_WINDOW,
        }
    }
}

// =============================================================================
// Cross-check Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossCheckConfig {
    /// Template used when candidate responses are validated
    pub validation_template: String,

    /// Template used when the query is sent to every target directly
    pub comparison_template: String,

    /// Overall deadline for one cross-check (seconds)
    pub deadline_secs: u64,

    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CrossCheckConfig {
    fn default() -> Self {
        Self {
            validation_template: crosscheck::VALIDATION_TEMPLATE.to_string(),
            comparison_template: crosscheck::COMPARISON_TEMPLATE.to_string(),
            deadline_secs: crosscheck::DEADLINE_SECS,
            temperature: crosscheck::VALIDATION_TEMPERATURE,
            max_tokens: crosscheck::VALIDATION_MAX_TOKENS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{ProviderKind, RateLimitMode};

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.templates.cache_size, 100);
        assert!(!config.templates.auto_reload);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.crosscheck.validation_template, "crosscheck/response_validation");
        assert_eq!(config.crosscheck.max_tokens, 2000);
    }

    #[test]
    fn test_validate_rejects_zero_cache() {
        let mut config = Config::default();
        config.templates.cache_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_retry() {
        let mut config = Config::default();
        config.retry.backoff_factor = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_providers() {
        let mut config = Config::default();
        config.providers = vec![
            ProviderConfig::new(ProviderKind::OpenAi),
            ProviderConfig::new(ProviderKind::OpenAi),
        ];
        assert!(config.validate().is_err());

        config.providers[1].name = Some("openai-backup".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_of_provider_section() {
        let toml_str = r#"
            [templates]
            cache_size = 10
            auto_reload = true

            [[providers]]
            provider = "anthropic"
            name = "judge"
            default_model = "claude-3-haiku"
            available_models = ["claude-3-haiku", "claude-3-5-sonnet-latest"]
            max_requests_per_minute = 50
            timeout_seconds = 12.5
            rate_limit_mode = "fail_fast"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.templates.cache_size, 10);
        assert!(config.templates.auto_reload);
        let provider = &config.providers[0];
        assert_eq!(provider.provider, ProviderKind::Anthropic);
        assert_eq!(provider.logical_name(), "judge");
        assert_eq!(provider.max_requests_per_minute, Some(50));
        assert_eq!(provider.rate_limit_mode, RateLimitMode::FailFast);
        assert_eq!(provider.timeout().as_millis(), 12_500);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
