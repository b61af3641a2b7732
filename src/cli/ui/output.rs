use console::{StyledObject, style};

use crate::ai::manager::ProviderHealth;
use crate::ai::metrics::MetricsSummary;
use crate::ai::provider::HealthStatus;
use crate::crosscheck::{CrossCheckResult, CrossCheckStatus, TargetOutcome};

/// Characters of each response shown in the text summary
const PREVIEW_CHARS: usize = 400;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<12} {}", style(label).dim(), value);
    }

    pub fn cross_check(&self, result: &CrossCheckResult) {
        self.header(&format!("Cross-check ({})", result.mode));
        self.field("id", result.id);
        self.field("template", &result.template);
        self.field("status", crosscheck_status(result.status));
        self.field(
            "providers",
            format!("{}/{} succeeded", result.succeeded(), result.entries.len()),
        );
        self.field("duration", format!("{} ms", result.duration_ms));

        for entry in &result.entries {
            match &entry.outcome {
                TargetOutcome::Success { response } => {
                    self.section(&format!(
                        "{} {} · {} · {} ms",
                        style("✓").green(),
                        entry.provider,
                        response.metadata.model,
                        entry.latency_ms
                    ));
                    println!("{}", preview(&response.content));
                    if let Some(usage) = response.usage {
                        println!(
                            "{}",
                            style(format!(
                                "tokens: {} prompt + {} completion",
                                usage.prompt_tokens, usage.completion_tokens
                            ))
                            .dim()
                        );
                    }
                }
                TargetOutcome::Failure { failure } => {
                    self.section(&format!(
                        "{} {} · {} · {} ms",
                        style("✗").red(),
                        entry.provider,
                        failure.kind,
                        entry.latency_ms
                    ));
                    println!("{}", style(&failure.message).red());
                }
            }
        }
        println!();
    }

    pub fn metrics(&self, summary: &MetricsSummary) {
        if summary.requests == 0 {
            return;
        }
        self.section("Session");
        println!("{}", style(summary.display()).dim());
    }

    pub fn health(&self, report: &[ProviderHealth]) {
        self.header("Provider health");
        if report.is_empty() {
            self.warning("No providers configured");
            return;
        }
        for health in report {
            let snapshot = &health.snapshot;
            println!(
                "  {:<16} {:<20} {} ok / {} failed, {} consecutive",
                snapshot.provider,
                health_status(health.status),
                snapshot.total_successes,
                snapshot.total_failures,
                snapshot.consecutive_failures
            );
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

fn crosscheck_status(status: CrossCheckStatus) -> StyledObject<String> {
    let text = status.to_string();
    match status {
        CrossCheckStatus::Complete => style(text).green().bold(),
        CrossCheckStatus::Partial => style(text).yellow().bold(),
        CrossCheckStatus::Failed => style(text).red().bold(),
    }
}

fn health_status(status: HealthStatus) -> StyledObject<String> {
    let text = status.to_string();
    match status {
        HealthStatus::Healthy => style(text).green(),
        HealthStatus::Degraded => style(text).yellow(),
        HealthStatus::Unreachable => style(text).red(),
    }
}

fn preview(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    format!("{}…", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(PREVIEW_CHARS + 10);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 1);
        assert!(shown.ends_with('…'));
        assert_eq!(preview("  short  "), "short");
    }
}
