//! Cross-check request and result types
//!
//! Plain data in and out: no transport format is assumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

use crate::ai::prompt::TemplateContext;
use crate::ai::provider::{GenerationParams, LlmResponse};
use crate::types::{CrossCheckError, FailureKind, Result};

// =============================================================================
// Request
// =============================================================================

/// What each target provider is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossCheckMode {
    /// Judge the candidate responses
    #[default]
    Validate,
    /// Answer the query directly, for side-by-side comparison
    Compare,
}

impl std::fmt::Display for CrossCheckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Compare => write!(f, "compare"),
        }
    }
}

/// Response under review, optionally attributed to the model that wrote it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CandidateResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
        }
    }

    pub fn from_source(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: Some(source.into()),
        }
    }
}

/// One provider consulted by a cross-check
#[derive(Debug, Clone, Default)]
pub struct Target {
    /// Registered provider name
    pub provider: String,
    /// Name the provider is addressed by inside the prompt
    pub display_name: Option<String>,
    /// Context entries that win over the shared fields for this target only
    pub overrides: TemplateContext,
    /// Fields set here win over the request-wide parameters
    pub params: GenerationParams,
    /// Bound on the whole invocation, retries included
    pub timeout: Option<Duration>,
}

impl Target {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Self::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key, value);
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl From<&str> for Target {
    fn from(provider: &str) -> Self {
        Self::new(provider)
    }
}

impl From<String> for Target {
    fn from(provider: String) -> Self {
        Self::new(provider)
    }
}

/// One logical cross-check
#[derive(Debug, Clone, Default)]
pub struct CrossCheckRequest {
    pub query: String,
    pub mode: CrossCheckMode,
    /// Candidates under review (validate mode)
    pub responses: Vec<CandidateResponse>,
    /// Consulted providers; results follow this order
    pub targets: Vec<Target>,
    /// Extra aspects the targets should pay attention to
    pub criteria: Vec<String>,
    pub params: GenerationParams,
    /// Template overriding the configured one for this mode
    pub template: Option<String>,
    /// Overall bound; the configured deadline applies when unset
    pub deadline: Option<Duration>,
}

impl CrossCheckRequest {
    /// Have every target judge `responses` to `query`
    pub fn validate(query: impl Into<String>, responses: Vec<CandidateResponse>) -> Self {
        Self {
            query: query.into(),
            mode: CrossCheckMode::Validate,
            responses,
            ..Self::default()
        }
    }

    /// Send `query` itself to every target
    pub fn compare(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: CrossCheckMode::Compare,
            ..Self::default()
        }
    }

    pub fn with_targets<T: Into<Target>>(mut self, targets: impl IntoIterator<Item = T>) -> Self {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target(mut self, target: impl Into<Target>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn with_criteria(mut self, criteria: Vec<String>) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Reject requests that cannot produce a meaningful result
    pub fn validate_input(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(CrossCheckError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }
        if self.targets.is_empty() {
            return Err(CrossCheckError::InvalidInput(
                "at least one target provider is required".to_string(),
            ));
        }
        if self.mode == CrossCheckMode::Validate && self.responses.is_empty() {
            return Err(CrossCheckError::InvalidInput(
                "validate mode needs at least one response to check".to_string(),
            ));
        }
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(CrossCheckError::InvalidInput(
                "deadline must be greater than zero".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.provider.is_empty() {
                return Err(CrossCheckError::InvalidInput(
                    "target provider name must not be empty".to_string(),
                ));
            }
            if !seen.insert(target.provider.as_str()) {
                return Err(CrossCheckError::InvalidInput(format!(
                    "target provider listed twice: {}",
                    target.provider
                )));
            }
        }
        Ok(())
    }

    /// Context fields shared by every target
    pub(crate) fn shared_context(&self) -> TemplateContext {
        let mut ctx = TemplateContext::new();
        match self.mode {
            CrossCheckMode::Validate => {
                ctx.insert("original_query", self.query.clone());
                ctx.insert("llm_response", joined_responses(&self.responses));
                if let [single] = self.responses.as_slice()
                    && let Some(source) = &single.source
                {
                    ctx.insert("response_provider", source.clone());
                }
                if !self.criteria.is_empty() {
                    ctx.insert("validation_aspects", self.criteria.clone());
                }
            }
            CrossCheckMode::Compare => {
                ctx.insert("query", self.query.clone());
                if !self.criteria.is_empty() {
                    ctx.insert("criteria", self.criteria.clone());
                }
            }
        }
        ctx
    }
}

/// A single response verbatim; several as numbered, attributed sections
fn joined_responses(responses: &[CandidateResponse]) -> String {
    if let [single] = responses {
        return single.content.clone();
    }
    responses
        .iter()
        .enumerate()
        .map(|(i, r)| match &r.source {
            Some(source) => format!("### Response {} (from {})\n{}", i + 1, source, r.content),
            None => format!("### Response {}\n{}", i + 1, r.content),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// =============================================================================
// Result
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossCheckStatus {
    /// Every target succeeded
    Complete,
    /// At least one target succeeded and at least one failed
    Partial,
    /// No target succeeded
    Failed,
}

impl CrossCheckStatus {
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if total > 0 && succeeded == total {
            Self::Complete
        } else if succeeded > 0 {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

impl std::fmt::Display for CrossCheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Captured failure of one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&CrossCheckError> for TargetFailure {
    fn from(err: &CrossCheckError) -> Self {
        Self {
            kind: err.failure_kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
    Success { response: LlmResponse },
    Failure { failure: TargetFailure },
}

/// Outcome for one requested target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossCheckEntry {
    pub provider: String,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
    /// Time from dispatch until this target reached a terminal state
    pub latency_ms: u64,
}

impl CrossCheckEntry {
    pub fn success(provider: impl Into<String>, response: LlmResponse, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            outcome: TargetOutcome::Success { response },
            latency_ms,
        }
    }

    pub fn failure(provider: impl Into<String>, failure: TargetFailure, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            outcome: TargetOutcome::Failure { failure },
            latency_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TargetOutcome::Success { .. })
    }

    pub fn response(&self) -> Option<&LlmResponse> {
        match &self.outcome {
            TargetOutcome::Success { response } => Some(response),
            TargetOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_info(&self) -> Option<&TargetFailure> {
        match &self.outcome {
            TargetOutcome::Success { .. } => None,
            TargetOutcome::Failure { failure } => Some(failure),
        }
    }
}

/// Aggregate of one cross-check, one entry per requested target in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossCheckResult {
    pub id: Uuid,
    pub query: String,
    pub mode: CrossCheckMode,
    pub template: String,
    pub status: CrossCheckStatus,
    pub entries: Vec<CrossCheckEntry>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CrossCheckResult {
    pub fn successes(&self) -> impl Iterator<Item = &CrossCheckEntry> {
        self.entries.iter().filter(|e| e.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CrossCheckEntry> {
        self.entries.iter().filter(|e| !e.is_success())
    }

    pub fn entry(&self, provider: &str) -> Option<&CrossCheckEntry> {
        self.entries.iter().find(|e| e.provider == provider)
    }

    pub fn succeeded(&self) -> usize {
        self.successes().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(CrossCheckStatus::from_counts(3, 3), CrossCheckStatus::Complete);
        assert_eq!(CrossCheckStatus::from_counts(1, 3), CrossCheckStatus::Partial);
        assert_eq!(CrossCheckStatus::from_counts(0, 3), CrossCheckStatus::Failed);
        assert_eq!(CrossCheckStatus::from_counts(0, 0), CrossCheckStatus::Failed);
    }

    #[test]
    fn test_validate_input() {
        let base = CrossCheckRequest::validate("q", vec![CandidateResponse::new("a")]);
        assert!(matches!(
            base.clone().validate_input(),
            Err(CrossCheckError::InvalidInput(_))
        ));

        let ok = base.clone().with_targets(["openai", "anthropic"]);
        assert!(ok.validate_input().is_ok());

        let dup = base.clone().with_targets(["openai", "openai"]);
        assert!(dup.validate_input().is_err());

        let no_responses = CrossCheckRequest::validate("q", vec![]).with_target("openai");
        assert!(no_responses.validate_input().is_err());

        let compare = CrossCheckRequest::compare("q").with_target("openai");
        assert!(compare.validate_input().is_ok());

        let blank = CrossCheckRequest::compare("  ").with_target("openai");
        assert!(blank.validate_input().is_err());
    }

    #[test]
    fn test_shared_context_single_response() {
        let request = CrossCheckRequest::validate(
            "Q",
            vec![CandidateResponse::from_source("A", "openai")],
        );
        let ctx = request.shared_context();
        assert_eq!(ctx.get("original_query"), Some(&Value::from("Q")));
        assert_eq!(ctx.get("llm_response"), Some(&Value::from("A")));
        assert_eq!(ctx.get("response_provider"), Some(&Value::from("openai")));
        assert!(!ctx.contains("validation_aspects"));
    }

    #[test]
    fn test_shared_context_multiple_responses() {
        let request = CrossCheckRequest::validate(
            "Q",
            vec![
                CandidateResponse::from_source("first", "openai"),
                CandidateResponse::new("second"),
            ],
        )
        .with_criteria(vec!["tone".into()]);
        let ctx = request.shared_context();
        assert_eq!(
            ctx.get("llm_response"),
            Some(&Value::from(
                "### Response 1 (from openai)\nfirst\n\n### Response 2\nsecond"
            ))
        );
        assert!(!ctx.contains("response_provider"));
        assert!(ctx.contains("validation_aspects"));
    }

    #[test]
    fn test_compare_context() {
        let ctx = CrossCheckRequest::compare("Q").shared_context();
        assert_eq!(ctx.get("query"), Some(&Value::from("Q")));
        assert!(!ctx.contains("original_query"));
    }

    #[test]
    fn test_entry_serialization_shape() {
        let entry = CrossCheckEntry::failure(
            "anthropic",
            TargetFailure {
                kind: FailureKind::Timeout,
                message: "slow".into(),
            },
            2000,
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["provider"], "anthropic");
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["failure"]["kind"], "timeout");
    }
}
