//! Scripted backend for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use super::{LlmProvider, LlmResponse, ProviderKind, ResolvedParams, ResponseMetadata, TokenUsage};
use crate::types::{ErrorCategory, LlmError};

#[derive(Debug, Clone)]
struct Step {
    delay: Duration,
    result: Result<String, ErrorCategory>,
}

/// Backend that replays scripted outcomes, then repeats a fallback
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    kind: ProviderKind,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    healthy: AtomicBool,
    probe_delay: Duration,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ProviderKind::OpenAi,
            script: Mutex::new(VecDeque::new()),
            fallback: Step {
                delay: Duration::ZERO,
                result: Ok("ok".to_string()),
            },
            healthy: AtomicBool::new(true),
            probe_delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Every unscripted call succeeds with `content` after `delay`
    pub fn always_ok(mut self, content: impl Into<String>, delay: Duration) -> Self {
        self.fallback = Step {
            delay,
            result: Ok(content.into()),
        };
        self
    }

    /// Every unscripted call fails with `category` after `delay`
    pub fn always_err(mut self, category: ErrorCategory, delay: Duration) -> Self {
        self.fallback = Step {
            delay,
            result: Err(category),
        };
        self
    }

    pub fn then_ok(self, content: impl Into<String>) -> Self {
        self.push(Step {
            delay: Duration::ZERO,
            result: Ok(content.into()),
        });
        self
    }

    pub fn then_err(self, category: ErrorCategory) -> Self {
        self.push(Step {
            delay: Duration::ZERO,
            result: Err(category),
        });
        self
    }

    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn push(&self, step: Step) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(step);
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &ResolvedParams,
    ) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        let step = self.next_step();
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.result {
            Ok(content) => Ok(LlmResponse::new(
                content,
                ResponseMetadata::new(&self.name, &params.model),
            )
            .with_usage(TokenUsage::new(10, 5))),
            Err(category) => Err(LlmError::with_provider(
                category,
                format!("scripted {} failure", category),
                &self.name,
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LlmError::with_provider(
                ErrorCategory::Network,
                "connection refused",
                &self.name,
            ))
        }
    }
}
