//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::ai::manager::LlmManager;
use crate::ai::prompt::TemplateContext;
use crate::config::{Config, ConfigLoader};
use crate::crosscheck::CrossCheckOrchestrator;
use crate::types::{CrossCheckError, Result};

/// Output format shared by every command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == Self::Json
    }
}

/// Command execution context
///
/// Configuration plus the template store and provider registry built
/// from it, wired into one manager.
pub struct CommandContext {
    pub config: Config,
    pub manager: Arc<LlmManager>,
}

impl CommandContext {
    /// Load configuration (with an optional explicit file on top) and build the manager
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = ConfigLoader::load_with(config_path)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let manager = Arc::new(LlmManager::from_config(&config)?);
        Ok(Self { config, manager })
    }

    pub fn orchestrator(&self) -> CrossCheckOrchestrator {
        CrossCheckOrchestrator::new(Arc::clone(&self.manager))
    }
}

/// Runtime for commands that talk to providers
pub fn runtime() -> Result<Runtime> {
    Ok(Runtime::new()?)
}

/// Pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Build a render context from `key=value` pairs
///
/// Values that parse as JSON (numbers, booleans, arrays, objects, quoted
/// strings) keep their type; anything else is taken as a plain string.
pub fn parse_vars(pairs: &[String]) -> Result<TemplateContext> {
    let mut ctx = TemplateContext::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            CrossCheckError::InvalidInput(format!("Expected key=value, got '{}'", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CrossCheckError::InvalidInput(format!(
                "Empty variable name in '{}'",
                pair
            )));
        }
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        ctx.insert(key, value);
    }
    Ok(ctx)
}
