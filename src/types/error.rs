//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides error classification for retry decisions and a stable
//! failure taxonomy for aggregated cross-check results.
//!
//! ## Error Categories
//!
//! - **RateLimit**: API rate limiting (wait and retry)
//! - **Auth**: Authentication failures (fail fast)
//! - **Network**: Connectivity issues (retry with backoff)
//! - **Transient**: 5xx and overload responses (retry with backoff)
//! - **Timeout**: Attempt exceeded its time limit (retry within deadline)
//! - **BadRequest**: Invalid request or content policy rejection (fail fast)
//! - **Unavailable**: Retries exhausted, provider not serving
//! - **ParseError**: Unparseable backend response
//!
//! ## Design Principles
//!
//! - Single unified error type (CrossCheckError) for the entire application
//! - Structured error variants with context for better debugging
//! - Category-based routing for retry decisions
//! - Every error projects onto a serialisable `FailureKind`

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::retry as retry_constants;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories used for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry same provider
    RateLimit,
    /// Authentication failed - fail fast, don't retry
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Temporary server issues - retry with backoff
    Transient,
    /// Attempt timed out - retry while the deadline allows
    Timeout,
    /// Invalid request or policy rejection - don't retry
    BadRequest,
    /// Provider unavailable after retries
    Unavailable,
    /// Backend response could not be parsed
    ParseError,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retryable on the same provider
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::Timeout
        )
    }

    /// Surface kind reported to callers once retrying is over
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::RateLimit => FailureKind::RateLimited,
            Self::Auth => FailureKind::AuthenticationError,
            Self::Timeout => FailureKind::Timeout,
            Self::BadRequest => FailureKind::InvalidRequest,
            Self::Network | Self::Transient | Self::Unavailable => {
                FailureKind::ProviderUnavailable
            }
            Self::ParseError | Self::Unknown => FailureKind::UnknownProviderError,
        }
    }
}

// =============================================================================
// Failure Kind
// =============================================================================

/// Failure taxonomy surfaced in aggregated results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AuthenticationError,
    RateLimited,
    Timeout,
    InvalidRequest,
    ProviderUnavailable,
    UnknownProviderError,
    ProviderNotFound,
    TemplateNotFound,
    TemplateParseError,
    MissingVariable,
    Cancelled,
    InvalidInput,
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AuthenticationError => "authentication_error",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::InvalidRequest => "invalid_request",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::UnknownProviderError => "unknown_provider_error",
            Self::ProviderNotFound => "provider_not_found",
            Self::TemplateNotFound => "template_not_found",
            Self::TemplateParseError => "template_parse_error",
            Self::MissingVariable => "missing_variable",
            Self::Cancelled => "cancelled",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// LLM error with category, context, and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if the provider sent one)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add provider context to existing error
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps backend responses and transport errors onto error categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an HTTP status code together with the response body
    pub fn classify_http_status(
        status: u16,
        body: &str,
        retry_after_header: Option<&str>,
        provider: &str,
    ) -> LlmError {
        let message = format!("HTTP {}: {}", status, body);
        match status {
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            429 => {
                let err = LlmError::with_provider(ErrorCategory::RateLimit, message, provider);
                match retry_after_header
                    .and_then(parse_retry_after_header)
                    .or_else(|| parse_rate_limit_delay(body))
                {
                    Some(wait) => err.retry_after(wait),
                    None => err,
                }
            }
            408 => LlmError::with_provider(ErrorCategory::Timeout, message, provider),
            400 | 404 | 413 | 422 => {
                LlmError::with_provider(ErrorCategory::BadRequest, message, provider)
            }
            500..=599 => {
                // Anthropic signals overload with 529
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
            }
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }

    /// Classify a transport-level error from the HTTP client
    pub fn classify_reqwest(err: &reqwest::Error, provider: &str) -> LlmError {
        let category = if err.is_timeout() {
            ErrorCategory::Timeout
        } else if err.is_connect() || err.is_request() {
            ErrorCategory::Network
        } else if err.is_decode() || err.is_body() {
            ErrorCategory::ParseError
        } else {
            ErrorCategory::Unknown
        };
        LlmError::with_provider(category, err.to_string(), provider)
    }
}

/// Parse a `Retry-After` header value given in seconds
fn parse_retry_after_header(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        secs.min(retry_constants::MAX_RETRY_AFTER_SECS as f64),
    ))
}

/// Parse rate limit delay from error message
///
/// Extracts retry-after seconds from common rate limit error formats.
pub fn parse_rate_limit_delay(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();

    // Pattern: "retry after N seconds" or "retry-after: N"
    for pattern in &["retry", "wait ", "in "] {
        if let Some(idx) = lower.find(pattern) {
            let after = &lower[idx + pattern.len()..];
            for word in after.split_whitespace() {
                let word = word.trim_matches(|c: char| !c.is_ascii_digit() && c != '.');
                if let Ok(secs) = word.parse::<f64>()
                    && secs.is_finite()
                    && secs >= 0.0
                {
                    return Some(Duration::from_secs_f64(
                        secs.min(retry_constants::MAX_RETRY_AFTER_SECS as f64),
                    ));
                }
            }
        }
    }

    None
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CrossCheckError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Provider Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    // -------------------------------------------------------------------------
    // Template Errors
    // -------------------------------------------------------------------------
    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("Template parse error in {name}: {message}")]
    TemplateParse { name: String, message: String },

    #[error("Missing required variable '{variable}' for template {template}")]
    MissingVariable { template: String, variable: String },

    // -------------------------------------------------------------------------
    // Orchestration Errors
    // -------------------------------------------------------------------------
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<LlmError> for CrossCheckError {
    fn from(err: LlmError) -> Self {
        CrossCheckError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, CrossCheckError>;

impl CrossCheckError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an LLM error with category
    pub fn llm(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Llm(LlmError::new(category, message))
    }

    /// Project this error onto the surface failure taxonomy
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Llm(e) => e.category.failure_kind(),
            Self::ProviderNotFound(_) => FailureKind::ProviderNotFound,
            Self::TemplateNotFound { .. } => FailureKind::TemplateNotFound,
            Self::TemplateParse { .. } => FailureKind::TemplateParseError,
            Self::MissingVariable { .. } => FailureKind::MissingVariable,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Cancelled(_) => FailureKind::Cancelled,
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::Io(_) | Self::Json(_) | Self::Config(_) => FailureKind::Internal,
        }
    }

    /// Check if this error may succeed on retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Timeout.to_string(), "TIMEOUT");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
        assert!(!ErrorCategory::ParseError.is_retryable());
    }

    #[test]
    fn test_failure_kind_projection() {
        assert_eq!(
            ErrorCategory::Network.failure_kind(),
            FailureKind::ProviderUnavailable
        );
        assert_eq!(
            ErrorCategory::Transient.failure_kind(),
            FailureKind::ProviderUnavailable
        );
        assert_eq!(
            ErrorCategory::ParseError.failure_kind(),
            FailureKind::UnknownProviderError
        );
        assert_eq!(
            CrossCheckError::ProviderNotFound("x".into()).failure_kind(),
            FailureKind::ProviderNotFound
        );
        assert_eq!(
            CrossCheckError::MissingVariable {
                template: "t".into(),
                variable: "v".into()
            }
            .failure_kind(),
            FailureKind::MissingVariable
        );
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::ProviderUnavailable).unwrap();
        assert_eq!(json, "\"provider_unavailable\"");
        assert_eq!(FailureKind::RateLimited.to_string(), "rate_limited");
    }

    #[test]
    fn test_classify_http_status() {
        let auth = ErrorClassifier::classify_http_status(401, "bad key", None, "openai");
        assert_eq!(auth.category, ErrorCategory::Auth);
        assert!(!auth.is_retryable());

        let bad = ErrorClassifier::classify_http_status(400, "content policy", None, "openai");
        assert_eq!(bad.category, ErrorCategory::BadRequest);

        let server = ErrorClassifier::classify_http_status(503, "overloaded", None, "anthropic");
        assert_eq!(server.category, ErrorCategory::Transient);

        let overloaded = ErrorClassifier::classify_http_status(529, "overloaded", None, "anthropic");
        assert_eq!(overloaded.category, ErrorCategory::Transient);
    }

    #[test]
    fn test_classify_rate_limit_retry_after() {
        let header = ErrorClassifier::classify_http_status(429, "slow down", Some("7"), "openai");
        assert_eq!(header.category, ErrorCategory::RateLimit);
        assert_eq!(header.retry_after, Some(Duration::from_secs(7)));

        let body = ErrorClassifier::classify_http_status(
            429,
            "Rate limit reached. Please retry after 20 seconds.",
            None,
            "openai",
        );
        assert_eq!(body.retry_after, Some(Duration::from_secs(20)));

        let none = ErrorClassifier::classify_http_status(429, "Rate limit reached", None, "x");
        assert_eq!(none.retry_after, None);
    }

    #[test]
    fn test_parse_rate_limit_delay() {
        let msg = "Too many requests. Please wait 60 seconds before trying again.";
        assert_eq!(parse_rate_limit_delay(msg), Some(Duration::from_secs(60)));

        let capped = "Retry after 1000 seconds";
        assert_eq!(
            parse_rate_limit_delay(capped),
            Some(Duration::from_secs(retry_constants::MAX_RETRY_AFTER_SECS))
        );

        assert_eq!(parse_rate_limit_delay("Rate limit exceeded"), None);
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::with_provider(ErrorCategory::RateLimit, "Too many requests", "openai");
        assert_eq!(err.to_string(), "[openai:RATE_LIMIT] Too many requests");

        let err_no_provider = LlmError::new(ErrorCategory::Network, "Connection failed");
        assert_eq!(err_no_provider.to_string(), "[NETWORK] Connection failed");
    }
}
