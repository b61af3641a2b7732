//! OpenAI API Provider
//!
//! Backend using OpenAI's Chat Completions API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, warn};

use super::{
    ErrorClassifier, LlmProvider, LlmResponse, ProviderConfig, ProviderKind, ResolvedParams,
    ResponseMetadata, ResponseTiming, TokenUsage, build_http_client, error_from_response,
    missing_key_error,
};
use crate::types::{ErrorCategory, LlmError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    name: String,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.name)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| missing_key_error(config))?;

        let api_base = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            name: config.logical_name(),
            api_key: SecretString::from(api_key),
            api_base,
            model: config.model(),
            client: build_http_client()?,
        })
    }

    fn build_request(&self, prompt: &str, params: &ResolvedParams) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: params.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: params.temperature,
            max_tokens: Some(params.max_tokens),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &ResolvedParams,
    ) -> std::result::Result<LlmResponse, LlmError> {
        debug!(
            provider = %self.name,
            model = %params.model,
            temperature = params.temperature,
            "Sending request to OpenAI API"
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, params);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .timeout(params.timeout)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, &self.name))?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &self.name).await);
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, &self.name))?;
        let elapsed = start_time.elapsed();

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                "No choices in OpenAI response",
                &self.name,
            )
        })?;
        let content = choice.message.content.ok_or_else(|| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                "No content in OpenAI response",
                &self.name,
            )
        })?;

        let mut metadata = ResponseMetadata::new(&self.name, body.model.unwrap_or_else(|| params.model.clone()));
        metadata.finish_reason = choice.finish_reason;

        let mut raw = Map::new();
        if let Some(id) = body.id {
            raw.insert("id".to_string(), Value::String(id));
        }
        if let Some(fingerprint) = body.system_fingerprint {
            raw.insert("system_fingerprint".to_string(), Value::String(fingerprint));
        }

        let mut llm_response = LlmResponse::new(content, metadata)
            .with_timing(ResponseTiming::from_duration(elapsed))
            .with_raw(raw);
        if let Some(usage) = body.usage {
            llm_response = llm_response.with_usage(TokenUsage::new(
                usage.prompt_tokens,
                usage.completion_tokens,
            ));
        }
        Ok(llm_response)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> std::result::Result<(), LlmError> {
        let url = format!("{}/models", self.api_base);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, &self.name))?;

        if response.status().is_success() {
            debug!(provider = %self.name, "OpenAI API is available");
            Ok(())
        } else {
            warn!(provider = %self.name, status = %response.status(), "OpenAI API check failed");
            Err(error_from_response(response, &self.name).await)
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    system_fingerprint: Option<String>,
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let config = ProviderConfig::new(ProviderKind::OpenAi)
            .with_api_key("sk-test")
            .with_base_url(server.uri());
        OpenAiProvider::new(&config).unwrap()
    }

    fn params() -> ResolvedParams {
        ResolvedParams {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 100,
            temperature: 0.2,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_generate_normalizes_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o-mini",
                "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            })))
            .mount(&server)
            .await;

        let response = provider_for(&server).generate("hi", &params()).await.unwrap();
        assert_eq!(response.content, "hello");
        assert_eq!(response.metadata.provider, "openai");
        assert_eq!(response.metadata.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
        assert_eq!(response.raw.get("id"), Some(&json!("chatcmpl-1")));
    }

    #[tokio::test]
    async fn test_generate_classifies_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = provider_for(&server).generate("hi", &params()).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Auth);
        assert_eq!(err.provider.as_deref(), Some("openai"));
    }

    #[tokio::test]
    async fn test_generate_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "7")
                    .set_body_string("slow down"),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server).generate("hi", &params()).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        assert!(provider_for(&server).health_check().await.is_ok());
    }
}
