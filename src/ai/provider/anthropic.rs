//! Anthropic API Provider
//!
//! Backend using Anthropic's Messages API.

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

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic API Provider with secure API key handling
pub struct AnthropicProvider {
    name: String,
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("name", &self.name)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicProvider {
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

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &ResolvedParams,
    ) -> std::result::Result<LlmResponse, LlmError> {
        debug!(
            provider = %self.name,
            model = %params.model,
            temperature = params.temperature,
            "Sending request to Anthropic API"
        );

        let start_time = Instant::now();
        let request = MessagesRequest {
            model: params.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: params.max_tokens,
            temperature: Some(params.temperature),
        };

        let response = self
            .request(self.client.post(format!("{}/messages", self.api_base)))
            .timeout(params.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, &self.name))?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &self.name).await);
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, &self.name))?;
        let elapsed = start_time.elapsed();

        // Concatenate text blocks; tool-use blocks carry no text
        let content: String = body
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if content.is_empty() {
            return Err(LlmError::with_provider(
                ErrorCategory::ParseError,
                "No text content in Anthropic response",
                &self.name,
            ));
        }

        let mut metadata =
            ResponseMetadata::new(&self.name, body.model.unwrap_or_else(|| params.model.clone()));
        metadata.finish_reason = body.stop_reason;

        let mut raw = Map::new();
        if let Some(id) = body.id {
            raw.insert("id".to_string(), Value::String(id));
        }

        Ok(LlmResponse::new(content, metadata)
            .with_usage(TokenUsage::new(
                body.usage.input_tokens,
                body.usage.output_tokens,
            ))
            .with_timing(ResponseTiming::from_duration(elapsed))
            .with_raw(raw))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> std::result::Result<(), LlmError> {
        let response = self
            .request(self.client.get(format!("{}/models", self.api_base)))
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, &self.name))?;

        // 404/405 still prove the endpoint is reachable with valid credentials
        let status = response.status();
        if status.is_success() || status == 404 || status == 405 {
            debug!(provider = %self.name, "Anthropic API is available");
            Ok(())
        } else {
            warn!(provider = %self.name, status = %status, "Anthropic API check failed");
            Err(error_from_response(response, &self.name).await)
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Usage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> AnthropicProvider {
        let config = ProviderConfig::new(ProviderKind::Anthropic)
            .with_name("claude")
            .with_api_key("ak-test")
            .with_base_url(server.uri());
        AnthropicProvider::new(&config).unwrap()
    }

    fn params() -> ResolvedParams {
        ResolvedParams {
            model: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 200,
            temperature: 0.3,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_generate_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "model": "claude-3-5-sonnet-latest",
                "content": [{"type": "text", "text": "Looks "}, {"type": "text", "text": "correct"}],
                "usage": {"input_tokens": 20, "output_tokens": 4},
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let response = provider_for(&server).generate("check", &params()).await.unwrap();
        assert_eq!(response.content, "Looks correct");
        assert_eq!(response.metadata.provider, "claude");
        assert_eq!(response.metadata.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage, Some(TokenUsage::new(20, 4)));
    }

    #[tokio::test]
    async fn test_overloaded_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider_for(&server).generate("check", &params()).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Transient);
    }

    #[tokio::test]
    async fn test_empty_content_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [],
                "usage": {"input_tokens": 1, "output_tokens": 0}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).generate("check", &params()).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::ParseError);
    }

    #[tokio::test]
    async fn test_health_check_rejects_bad_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider_for(&server).health_check().await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Auth);
    }
}
