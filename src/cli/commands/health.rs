//! Health Command
//!
//! Probe every configured provider concurrently.
//!
//! Usage:
//!   crosscheck health [-f json]

use crate::ai::provider::HealthStatus;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, print_json, runtime};
use crate::types::Result;

/// Returns `true` when no provider is unreachable
pub fn run(ctx: &CommandContext, format: OutputFormat) -> Result<bool> {
    let rt = runtime()?;
    let report = rt.block_on(ctx.manager.health_report());

    if format.is_json() {
        print_json(&report)?;
    } else {
        Output::new().health(&report);
    }

    Ok(report
        .iter()
        .all(|h| h.status != HealthStatus::Unreachable))
}
