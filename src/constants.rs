//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Retry policy constants
pub mod retry {
    /// Maximum attempts per generation call (first try included)
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (milliseconds)
    pub const MAX_DELAY_MS: u64 = 30_000;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f64 = 2.0;

    /// Overall deadline for one generation call across all attempts (seconds)
    pub const DEADLINE_SECS: u64 = 120;

    /// Upper bound for a provider-supplied retry-after hint (seconds)
    pub const MAX_RETRY_AFTER_SECS: u64 = 300;
}

/// Provider health constants
pub mod health {
    /// Overall bound for a health rollup across all providers (seconds)
    pub const ROLLUP_TIMEOUT_SECS: u64 = 10;

    /// Recent failure rate at which a provider is reported degraded
    pub const DEGRADED_FAILURE_RATE: f64 = 0.25;

    /// Consecutive failures at which a provider is reported degraded
    pub const DEGRADED_CONSECUTIVE_FAILURES: u32 = 3;

    /// Number of recent attempts considered for the failure rate
    pub const OUTCOME_WINDOW: usize = 20;
}

/// Rate limiting constants
pub mod rate_limit {
    /// Default requests per minute when a provider declares none
    pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

    /// Default tokens per minute when a provider declares none
    pub const DEFAULT_TOKENS_PER_MINUTE: u32 = 150_000;

    /// Rough characters-per-token ratio used to estimate prompt size
    pub const CHARS_PER_TOKEN: usize = 4;
}

/// Template cache constants
pub mod cache {
    /// Maximum compiled templates kept in memory
    pub const MAX_TEMPLATE_ENTRIES: usize = 100;

    /// Template file extension
    pub const TEMPLATE_EXTENSION: &str = "hbs";

    /// Default template version when the header declares none
    pub const DEFAULT_TEMPLATE_VERSION: &str = "1.0.0";
}

/// Generation request limits
pub mod generation {
    /// Hard ceiling on requested completion tokens
    pub const MAX_TOKENS_LIMIT: u32 = 32_000;

    /// Highest sampling temperature accepted by OpenAI and Ollama
    pub const MAX_TEMPERATURE: f32 = 2.0;

    /// Anthropic rejects temperatures above 1.0
    pub const ANTHROPIC_MAX_TEMPERATURE: f32 = 1.0;

    /// Completion tokens used when neither caller nor provider set one
    pub const DEFAULT_MAX_TOKENS: u32 = 1_000;

    /// Temperature used when neither caller nor provider set one
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
}

/// Cross-check orchestration constants
pub mod crosscheck {
    /// Template used to validate a candidate response
    pub const VALIDATION_TEMPLATE: &str = "crosscheck/response_validation";

    /// Template used to ask every target the query directly
    pub const COMPARISON_TEMPLATE: &str = "crosscheck/direct_query";

    /// Template used for code review tasks
    pub const CODE_REVIEW_TEMPLATE: &str = "tasks/code_review";

    /// Overall deadline for one cross-check call (seconds)
    pub const DEADLINE_SECS: u64 = 120;

    /// Validation temperature (lower for consistent analysis)
    pub const VALIDATION_TEMPERATURE: f32 = 0.3;

    /// Validation completion budget
    pub const VALIDATION_MAX_TOKENS: u32 = 2_000;

    /// Code review temperature
    pub const CODE_REVIEW_TEMPERATURE: f32 = 0.2;

    /// Code review completion budget
    pub const CODE_REVIEW_MAX_TOKENS: u32 = 3_000;
}

/// HTTP/Network constants
pub mod network {
    /// Default per-attempt request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
}
