//! LLM Manager
//!
//! Single entry point for "render a template, send it to one provider".
//! Every generation request flows through [`LlmManager::generate_from_template`],
//! so retry, rate limiting and health bookkeeping apply the same way no
//! matter who calls.
//!
//! Also rolls up health across all registered providers under one bound.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ai::prompt::{TemplateContext, TemplateStore};
use crate::ai::provider::{
    GenerationParams, HealthSnapshot, HealthStatus, LlmResponse, ProviderRegistry,
};
use crate::ai::timeout::{TimeoutConfig, with_timeout_map};
use crate::config::{Config, CrossCheckConfig};
use crate::constants::crosscheck as defaults;
use crate::types::Result;

/// Health of one provider with its attempt counters
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    #[serde(flatten)]
    pub snapshot: HealthSnapshot,
}

/// Inputs for a code review request
#[derive(Debug, Clone, Default)]
pub struct CodeReviewRequest {
    pub code: String,
    pub language: String,
    pub focus_areas: Vec<String>,
    pub severity_threshold: Option<String>,
    pub include_suggestions: bool,
}

impl CodeReviewRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            focus_areas: Vec::new(),
            severity_threshold: None,
            include_suggestions: true,
        }
    }

    pub fn with_focus_areas(mut self, areas: Vec<String>) -> Self {
        self.focus_areas = areas;
        self
    }

    pub fn with_severity_threshold(mut self, threshold: impl Into<String>) -> Self {
        self.severity_threshold = Some(threshold.into());
        self
    }

    pub fn with_suggestions(mut self, include: bool) -> Self {
        self.include_suggestions = include;
        self
    }

    fn context(&self) -> TemplateContext {
        let mut ctx = TemplateContext::new()
            .with("code", self.code.clone())
            .with("language", self.language.clone())
            .with("include_suggestions", self.include_suggestions);
        if !self.focus_areas.is_empty() {
            ctx.insert("focus_areas", self.focus_areas.clone());
        }
        if let Some(threshold) = &self.severity_threshold {
            ctx.insert("severity_threshold", threshold.clone());
        }
        ctx
    }
}

pub struct LlmManager {
    templates: Arc<TemplateStore>,
    registry: Arc<ProviderRegistry>,
    timeouts: TimeoutConfig,
    crosscheck: CrossCheckConfig,
}

impl std::fmt::Debug for LlmManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmManager")
            .field("templates", &self.templates)
            .field("registry", &self.registry)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl LlmManager {
    pub fn new(templates: Arc<TemplateStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            templates,
            registry,
            timeouts: TimeoutConfig::default(),
            crosscheck: CrossCheckConfig::default(),
        }
    }

    /// Template store and provider registry built from `config`, in that order
    pub fn from_config(config: &Config) -> Result<Self> {
        let templates = Arc::new(TemplateStore::new(&config.templates));
        let registry = Arc::new(ProviderRegistry::from_config(config)?);
        info!(
            providers = registry.len(),
            template_dirs = config.templates.dirs.len(),
            "Initialized LLM manager"
        );
        Ok(Self::new(templates, registry)
            .with_timeouts(TimeoutConfig::from(config))
            .with_crosscheck_config(config.crosscheck.clone()))
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_crosscheck_config(mut self, crosscheck: CrossCheckConfig) -> Self {
        self.crosscheck = crosscheck;
        self
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    pub fn crosscheck_config(&self) -> &CrossCheckConfig {
        &self.crosscheck
    }

    /// Render `template_name` and send the result to `provider`
    ///
    /// Rendering and provider errors are returned unchanged.
    pub async fn generate_from_template(
        &self,
        template_name: &str,
        context: &TemplateContext,
        provider: &str,
        params: &GenerationParams,
    ) -> Result<LlmResponse> {
        let prompt = self.templates.render(template_name, context)?;
        let client = self.registry.get(provider)?;

        debug!(
            template = %template_name,
            provider = %provider,
            prompt_len = prompt.len(),
            "Generating from template"
        );
        let response = client.generate(&prompt, params).await?;
        debug!(
            template = %template_name,
            provider = %provider,
            latency_ms = response.timing.total_ms,
            "Generated from template"
        );
        Ok(response)
    }

    /// Ask `checker` to validate a response another model produced
    pub async fn cross_check_response(
        &self,
        original_query: &str,
        response: &str,
        response_provider: Option<&str>,
        validation_aspects: &[String],
        checker: &str,
    ) -> Result<LlmResponse> {
        let mut ctx = TemplateContext::new()
            .with("original_query", original_query)
            .with("llm_response", response);
        if let Some(source) = response_provider {
            ctx.insert("response_provider", source);
        }
        if !validation_aspects.is_empty() {
            ctx.insert("validation_aspects", validation_aspects.to_vec());
        }

        let params = GenerationParams::default()
            .with_temperature(self.crosscheck.temperature)
            .with_max_tokens(self.crosscheck.max_tokens);
        self.generate_from_template(&self.crosscheck.validation_template, &ctx, checker, &params)
            .await
    }

    pub async fn code_review(
        &self,
        request: &CodeReviewRequest,
        provider: &str,
    ) -> Result<LlmResponse> {
        let params = GenerationParams::default()
            .with_temperature(defaults::CODE_REVIEW_TEMPERATURE)
            .with_max_tokens(defaults::CODE_REVIEW_MAX_TOKENS);
        self.generate_from_template(
            defaults::CODE_REVIEW_TEMPLATE,
            &request.context(),
            provider,
            &params,
        )
        .await
    }

    /// Health of every registered provider
    ///
    /// Probes run concurrently; any provider that has not answered when
    /// the rollup timeout expires is reported unreachable.
    pub async fn health(&self) -> BTreeMap<String, HealthStatus> {
        self.health_report()
            .await
            .into_iter()
            .map(|h| (h.snapshot.provider, h.status))
            .collect()
    }

    /// Health of every registered provider with attempt counters, sorted by name
    pub async fn health_report(&self) -> Vec<ProviderHealth> {
        let bound = self.timeouts.health_rollup;
        let probes = self.registry.clients().into_iter().map(|client| async move {
            let status = match with_timeout_map(bound, client.health_check(), client.name()).await
            {
                Ok(status) => status,
                Err(_) => {
                    warn!(provider = %client.name(), "Health probe did not answer in time");
                    HealthStatus::Unreachable
                }
            };
            ProviderHealth {
                status,
                snapshot: client.health().snapshot(),
            }
        });
        join_all(probes).await
    }

    pub fn available_providers(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn list_templates(&self, category: Option<&str>) -> Vec<String> {
        self.templates.list_templates(category)
    }
}
