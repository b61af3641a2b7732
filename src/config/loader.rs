//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/crosscheck/config.toml)
//! 3. Project config (.crosscheck/config.toml)
//! 4. Explicit config file (--config)
//! 5. Environment variables (CROSSCHECK_* prefix, `__` separates sections)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{CrossCheckError, Result};

const ENV_PREFIX: &str = "CROSSCHECK_";
const CONFIG_FILE: &str = "config.toml";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_with(None)
    }

    /// Load configuration, layering `explicit` over the project config
    pub fn load_with(explicit: Option<&Path>) -> Result<Config> {
        let mut files = Vec::new();

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            files.push(global_path);
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            files.push(project_path);
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(CrossCheckError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!("Loading config from: {}", path.display());
            files.push(path.to_path_buf());
        }

        let figment = Self::layered(&files).merge(Self::env(ENV_PREFIX));
        Self::extract(figment)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        Self::extract(Self::layered(&[path.to_path_buf()]))
    }

    /// Defaults with each file merged in order
    fn layered(files: &[PathBuf]) -> Figment {
        files.iter().fold(
            Figment::new().merge(Serialized::defaults(Config::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
    }

    /// Environment provider, e.g. CROSSCHECK_RETRY__MAX_ATTEMPTS -> retry.max_attempts
    fn env(prefix: &str) -> Env {
        Env::prefixed(prefix).split("__").lowercase(true)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| CrossCheckError::Config(format!("Configuration error: {}", e)))?;

        // Validate configuration after loading
        config.validate()?;

        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/crosscheck/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("crosscheck"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Get project config directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".crosscheck")
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join(CONFIG_FILE)
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            CrossCheckError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_default(&global_dir, force)
    }

    /// Initialize project configuration
    pub fn init_project(force: bool) -> Result<PathBuf> {
        Self::write_default(&Self::project_dir(), force)
    }

    fn write_default(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Default config content (TOML)
    pub fn default_config() -> &'static str {
        r#"# crosscheck configuration
# Project settings in .crosscheck/config.toml override ~/.config/crosscheck/config.toml.
# Environment variables override both, e.g. CROSSCHECK_RETRY__MAX_ATTEMPTS=5

version = "1.0"

[logging]
level = "warn"
format = "text"   # text | json

[templates]
dirs = ["prompts"]
cache_size = 100
auto_reload = false   # re-read edited templates without restarting

[retry]
max_attempts = 3
base_delay_ms = 500
max_delay_ms = 30000
backoff_factor = 2.0
deadline_secs = 120
jitter = true

[health]
timeout_secs = 10
degraded_failure_rate = 0.25
degraded_consecutive_failures = 3

[crosscheck]
validation_template = "crosscheck/response_validation"
comparison_template = "crosscheck/direct_query"
deadline_secs = 120
temperature = 0.3
max_tokens = 2000

# API keys fall back to OPENAI_API_KEY / ANTHROPIC_API_KEY.
[[providers]]
provider = "openai"
default_model = "gpt-4o-mini"
available_models = ["gpt-4o-mini", "gpt-4o"]
max_requests_per_minute = 60
max_tokens_per_minute = 150000
timeout_seconds = 30.0
rate_limit_mode = "block"   # block | fail_fast

[[providers]]
provider = "anthropic"
default_model = "claude-3-5-sonnet-latest"
max_requests_per_minute = 50
timeout_seconds = 30.0
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::ProviderKind;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config_template_parses() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", ConfigLoader::default_config());

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].provider, ProviderKind::Anthropic);
    }

    #[test]
    fn test_later_files_override_earlier() {
        let dir = TempDir::new().unwrap();
        let global = write(&dir, "global.toml", "[retry]\nmax_attempts = 5\nbase_delay_ms = 100\n");
        let project = write(&dir, "project.toml", "[retry]\nmax_attempts = 2\n");

        let config = ConfigLoader::extract(ConfigLoader::layered(&[global, project])).unwrap();
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.retry.max_delay_ms, 30_000);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "[templates]\ncache_size = 0\n");
        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(CrossCheckError::Config(_))
        ));
    }

    #[test]
    fn test_env_override() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("CROSSCHECK_LOADERTEST_RETRY__MAX_ATTEMPTS", "7");
        }
        let figment = ConfigLoader::layered(&[]).merge(ConfigLoader::env("CROSSCHECK_LOADERTEST_"));
        let config = ConfigLoader::extract(figment).unwrap();
        assert_eq!(config.retry.max_attempts, 7);
        unsafe {
            std::env::remove_var("CROSSCHECK_LOADERTEST_RETRY__MAX_ATTEMPTS");
        }
    }

    #[test]
    fn test_init_writes_default() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(".crosscheck");
        let path = ConfigLoader::write_default(&target, false).unwrap();
        assert!(path.exists());

        fs::write(&path, "version = \"2.0\"\n").unwrap();
        ConfigLoader::write_default(&target, false).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("2.0"));

        ConfigLoader::write_default(&target, true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("[retry]"));
    }
}
