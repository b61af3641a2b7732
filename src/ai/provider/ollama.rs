//! Ollama Local LLM Provider
//!
//! Backend for locally-running Ollama models. Needs no credentials.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, warn};

use super::{
    ErrorClassifier, LlmProvider, LlmResponse, ProviderConfig, ProviderKind, ResolvedParams,
    ResponseMetadata, ResponseTiming, TokenUsage, build_http_client, error_from_response,
};
use crate::types::{CrossCheckError, ErrorCategory, LlmError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:11434";

/// Ollama Local LLM Provider
#[derive(Debug)]
pub struct OllamaProvider {
    name: String,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_base = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        // Validate endpoint URL for security (SSRF prevention)
        let api_base = Self::validate_endpoint(&api_base)?;

        Ok(Self {
            name: config.logical_name(),
            api_base,
            model: config.model(),
            client: build_http_client()?,
        })
    }

    /// Validate endpoint URL for security (SSRF prevention)
    ///
    /// Only allows http/https schemes and warns for non-localhost endpoints.
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            CrossCheckError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CrossCheckError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
        {
            warn!(
                "Ollama endpoint is not localhost: {}. Ensure this is intentional.",
                host
            );
        }

        Ok(endpoint.trim_end_matches('/').to_string())
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &ResolvedParams,
    ) -> std::result::Result<LlmResponse, LlmError> {
        debug!(
            provider = %self.name,
            model = %params.model,
            temperature = params.temperature,
            "Sending request to Ollama API"
        );

        let start_time = Instant::now();
        let request = OllamaRequest {
            model: params.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };
        let url = format!("{}/api/generate", self.api_base);

        let response = self
            .client
            .post(&url)
            .timeout(params.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let mut err = ErrorClassifier::classify_reqwest(&e, &self.name);
                if e.is_connect() {
                    err.message = format!(
                        "Failed to connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                        self.api_base
                    );
                }
                err
            })?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &self.name).await);
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, &self.name))?;
        let elapsed = start_time.elapsed();

        if body.response.is_empty() && !body.done {
            return Err(LlmError::with_provider(
                ErrorCategory::ParseError,
                "Incomplete Ollama response",
                &self.name,
            ));
        }

        let mut metadata = ResponseMetadata::new(&self.name, body.model.unwrap_or_else(|| params.model.clone()));
        metadata.finish_reason = body.done_reason;

        let mut raw = Map::new();
        if let Some(ns) = body.total_duration {
            raw.insert("total_duration_ns".to_string(), Value::from(ns));
        }

        let mut llm_response = LlmResponse::new(body.response, metadata)
            .with_timing(ResponseTiming::from_duration(elapsed))
            .with_raw(raw);
        if body.prompt_eval_count.is_some() || body.eval_count.is_some() {
            llm_response = llm_response.with_usage(TokenUsage::new(
                body.prompt_eval_count.unwrap_or(0),
                body.eval_count.unwrap_or(0),
            ));
        }
        Ok(llm_response)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> std::result::Result<(), LlmError> {
        let url = format!("{}/api/tags", self.api_base);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, &self.name))?;

        if !response.status().is_success() {
            warn!(provider = %self.name, status = %response.status(), "Ollama API check failed");
            return Err(error_from_response(response, &self.name).await);
        }

        if let Ok(tags) = response.json::<OllamaTagsResponse>().await {
            let base = self.model.trim_end_matches(":latest");
            let model_available = tags
                .models
                .iter()
                .any(|m| m.name == self.model || m.name.starts_with(base));
            if !model_available {
                warn!(
                    "Ollama is running but model '{}' not found. Pull with: ollama pull {}",
                    self.model, self.model
                );
            }
        }
        Ok(())
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: Option<String>,
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}
