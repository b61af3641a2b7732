//! crosscheck - Multi-Provider LLM Cross-Checking
//!
//! Sends one prompt to several LLM providers at once and gathers their
//! answers into a single structured result, so that one model's output can
//! be validated by others or compared side by side.
//!
//! ## Core Features
//!
//! - **Provider Abstraction**: OpenAI, Anthropic and Ollama behind one trait
//! - **Resilience**: retry with backoff, rate limiting and health tracking per provider
//! - **Prompt Templates**: Handlebars files with header metadata and a cached compiler
//! - **Concurrent Cross-Check**: per-target timeouts, overall deadline, cancellation
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use crosscheck::{CandidateResponse, ConfigLoader, CrossCheckOrchestrator, CrossCheckRequest, LlmManager};
//!
//! let config = ConfigLoader::load()?;
//! let manager = Arc::new(LlmManager::from_config(&config)?);
//! let orchestrator = CrossCheckOrchestrator::new(manager);
//!
//! let request = CrossCheckRequest::validate(
//!     "What is the capital of Australia?",
//!     vec![CandidateResponse::from_source("Sydney", "gpt-4o")],
//! )
//! .with_targets(["anthropic", "ollama"]);
//!
//! let result = orchestrator.cross_check(request).await?;
//! println!("{} of {} providers answered", result.succeeded(), result.entries.len());
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: providers, prompt templates, the LLM manager
//! - [`crosscheck`]: concurrent fan-out and result aggregation
//! - [`config`]: layered configuration
//! - [`types`]: error taxonomy

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod crosscheck;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::{CrossCheckError, ErrorCategory, FailureKind, Result};

pub use ai::{
    GenerationParams, HealthStatus, LlmManager, LlmProvider, LlmResponse, ProviderClient,
    ProviderConfig, ProviderKind, ProviderRegistry, TemplateContext, TemplateStore, TimeoutConfig,
};

pub use crosscheck::{
    CandidateResponse, CrossCheckEntry, CrossCheckMode, CrossCheckOrchestrator,
    CrossCheckRequest, CrossCheckResult, CrossCheckStatus, Target, TargetOutcome,
};
