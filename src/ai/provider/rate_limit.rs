//! Per-provider rate limiting
//!
//! Two token buckets per provider client: requests per minute and tokens
//! per minute. Both refill continuously. A call consumes from both buckets
//! at once or from neither.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::deadline_from;
use crate::constants::rate_limit as rl_constants;
use crate::types::{ErrorCategory, LlmError};

/// What a call does when a ceiling would be exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// Wait for capacity, bounded by the caller's timeout
    #[default]
    Block,
    /// Fail immediately with `RateLimited`
    FailFast,
}

impl std::fmt::Display for RateLimitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::FailFast => write!(f, "fail_fast"),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    per_second: f64,
}

impl Bucket {
    fn per_minute(limit: u32) -> Self {
        let capacity = f64::from(limit.max(1));
        Self {
            capacity,
            tokens: capacity,
            per_second: capacity / 60.0,
        }
    }

    fn refill(&mut self, elapsed: Duration) {
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.per_second).min(self.capacity);
    }

    /// Time until `cost` tokens are available
    fn wait_for(&self, cost: f64) -> Duration {
        if self.tokens >= cost {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((cost - self.tokens) / self.per_second)
        }
    }
}

#[derive(Debug)]
struct Buckets {
    requests: Bucket,
    tokens: Bucket,
    last_refill: Instant,
}

/// Token-bucket limiter for one provider client
#[derive(Debug)]
pub struct RateLimiter {
    provider_name: String,
    mode: RateLimitMode,
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    pub fn new(
        provider_name: impl Into<String>,
        requests_per_minute: Option<u32>,
        tokens_per_minute: Option<u32>,
        mode: RateLimitMode,
    ) -> Self {
        let rpm = requests_per_minute.unwrap_or(rl_constants::DEFAULT_REQUESTS_PER_MINUTE);
        let tpm = tokens_per_minute.unwrap_or(rl_constants::DEFAULT_TOKENS_PER_MINUTE);
        Self {
            provider_name: provider_name.into(),
            mode,
            buckets: Mutex::new(Buckets {
                requests: Bucket::per_minute(rpm),
                tokens: Bucket::per_minute(tpm),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn mode(&self) -> RateLimitMode {
        self.mode
    }

    /// Rough token estimate for a request: prompt size plus completion budget
    pub fn estimate_tokens(prompt: &str, max_tokens: u32) -> u32 {
        let prompt_tokens = prompt.chars().count().div_ceil(rl_constants::CHARS_PER_TOKEN);
        u32::try_from(prompt_tokens)
            .unwrap_or(u32::MAX)
            .saturating_add(max_tokens)
    }

    /// Consume one request and `tokens` tokens if both are available now
    ///
    /// Returns the wait until both would be available otherwise.
    pub fn try_acquire(&self, tokens: u32) -> Result<(), Duration> {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Instant::now();
        let elapsed = now.duration_since(buckets.last_refill);
        buckets.requests.refill(elapsed);
        buckets.tokens.refill(elapsed);
        buckets.last_refill = now;

        // A request larger than the whole bucket waits for a full bucket
        let token_cost = f64::from(tokens).min(buckets.tokens.capacity);
        let wait = std::cmp::max(
            buckets.requests.wait_for(1.0),
            buckets.tokens.wait_for(token_cost),
        );
        if wait.is_zero() {
            buckets.requests.tokens -= 1.0;
            buckets.tokens.tokens -= token_cost;
            Ok(())
        } else {
            Err(wait)
        }
    }

    /// Acquire capacity according to the configured mode
    ///
    /// In block mode waits at most `max_wait`; if the required wait is
    /// longer, fails with `RateLimited` carrying the wait as retry-after.
    pub async fn acquire(&self, tokens: u32, max_wait: Duration) -> Result<(), LlmError> {
        let deadline = deadline_from(Instant::now(), max_wait);
        loop {
            let wait = match self.try_acquire(tokens) {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if self.mode == RateLimitMode::FailFast || wait > remaining {
                return Err(LlmError::with_provider(
                    ErrorCategory::RateLimit,
                    format!(
                        "Local rate limit reached (mode: {}, wait: {:?})",
                        self.mode, wait
                    ),
                    &self.provider_name,
                )
                .retry_after(wait));
            }

            debug!(
                provider = %self.provider_name,
                wait_ms = wait.as_millis() as u64,
                "Waiting for rate limit capacity"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(RateLimiter::estimate_tokens("abcdefgh", 100), 102);
        assert_eq!(RateLimiter::estimate_tokens("abcde", 0), 2);
    }

    #[test]
    fn test_try_acquire_drains_request_bucket() {
        let limiter = RateLimiter::new("test", Some(2), None, RateLimitMode::FailFast);
        assert!(limiter.try_acquire(1).is_ok());
        assert!(limiter.try_acquire(1).is_ok());
        let wait = limiter.try_acquire(1).unwrap_err();
        assert!(wait > Duration::from_secs(20));
    }

    #[test]
    fn test_token_bucket_is_not_consumed_on_rejection() {
        let limiter = RateLimiter::new("test", Some(100), Some(1_000), RateLimitMode::FailFast);
        assert!(limiter.try_acquire(900).is_ok());
        assert!(limiter.try_acquire(200).is_err());
        // Rejected call left the remaining 100 tokens in place
        assert!(limiter.try_acquire(90).is_ok());
    }

    #[tokio::test]
    async fn test_fail_fast_returns_rate_limited() {
        let limiter = RateLimiter::new("test", Some(1), None, RateLimitMode::FailFast);
        limiter.acquire(10, Duration::from_secs(60)).await.unwrap();

        let err = limiter.acquire(10, Duration::from_secs(600)).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert!(err.retry_after.is_some());
    }

    #[tokio::test]
    async fn test_block_fails_when_wait_exceeds_timeout() {
        let limiter = RateLimiter::new("test", Some(1), None, RateLimitMode::Block);
        limiter.acquire(10, Duration::from_secs(1)).await.unwrap();

        let started = std::time::Instant::now();
        let err = limiter.acquire(10, Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_block_waits_for_refill() {
        // 600 rpm refills one request every 100ms
        let limiter = RateLimiter::new("test", Some(600), None, RateLimitMode::Block);
        for _ in 0..600 {
            limiter.try_acquire(1).unwrap();
        }

        let started = std::time::Instant::now();
        limiter.acquire(1, Duration::from_secs(2)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
