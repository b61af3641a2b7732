//! Config Command
//!
//! Usage:
//!   crosscheck config show [-f json]
//!   crosscheck config path
//!   crosscheck config init [-g] [--force]

use crate::cli::ui::Output;
use crate::cli::util::{OutputFormat, print_json};
use crate::config::{Config, ConfigLoader};
use crate::types::{CrossCheckError, Result};

/// Show the effective configuration (all sources merged, API keys omitted)
pub fn show(config: &Config, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        return print_json(config);
    }
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| CrossCheckError::Config(format!("Cannot render config: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

/// Show configuration file locations and whether they exist
pub fn path() -> Result<()> {
    let out = Output::new();
    out.header("Configuration files");
    match ConfigLoader::global_config_path() {
        Some(global) => out.field("global", describe(&global)),
        None => out.field("global", "(no config directory on this platform)"),
    }
    out.field("project", describe(&ConfigLoader::project_config_path()));
    Ok(())
}

/// Write the default configuration globally or for the current project
pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };
    let scope = if global { "global" } else { "project" };
    Output::new().success(&format!("Initialized {} configuration", scope));
    println!("  Config: {}", path.display());
    Ok(())
}

fn describe(path: &std::path::Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found)", path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_renders_as_toml() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[crosscheck]"));
        assert!(rendered.contains("[logging]"));
    }
}
