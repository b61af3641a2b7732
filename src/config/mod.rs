//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/crosscheck/config.toml)
//! 3. Project config (.crosscheck/config.toml)
//! 4. Explicit file (--config)
//! 5. Environment variables (CROSSCHECK_*)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
