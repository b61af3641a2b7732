//! Unified Timeout Configuration
//!
//! Operation-specific timeout defaults and helpers for bounding async work
//! with a consistent `CrossCheckError::Timeout`.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, with_timeout};
//!
//! let config = TimeoutConfig::from(&app_config);
//! let response = with_timeout(
//!     config.provider_request,
//!     manager.generate_from_template(name, &ctx, "openai", &params),
//!     "openai",
//! )
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::constants::{crosscheck, health, network};
use crate::types::{CrossCheckError, Result};

/// Timeouts for each kind of bounded operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutConfig {
    /// Single provider request when the provider sets none (default: 30 seconds)
    pub provider_request: Duration,
    /// Whole health rollup across providers (default: 10 seconds)
    pub health_rollup: Duration,
    /// Whole cross-check fan-out (default: 2 minutes)
    pub crosscheck: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            provider_request: Duration::from_secs_f64(network::DEFAULT_TIMEOUT_SECS),
            health_rollup: Duration::from_secs(health::ROLLUP_TIMEOUT_SECS),
            crosscheck: Duration::from_secs(crosscheck::DEADLINE_SECS),
        }
    }
}

impl From<&Config> for TimeoutConfig {
    fn from(config: &Config) -> Self {
        Self {
            health_rollup: Duration::from_secs(config.health.timeout_secs),
            crosscheck: Duration::from_secs(config.crosscheck.deadline_secs),
            ..Self::default()
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns `CrossCheckError::Timeout` naming `operation_name` if the
/// future does not finish in time; the future is dropped.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(CrossCheckError::timeout(operation_name, timeout)),
    }
}

/// Execute an infallible async operation with a timeout
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(CrossCheckError::timeout(operation_name, timeout)),
    }
}
