//! Templates Command
//!
//! Usage:
//!   crosscheck templates [--category <name>] [-f json]

use serde::Serialize;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, print_json};
use crate::types::Result;

#[derive(Debug, Serialize)]
struct TemplateSummary {
    name: String,
    version: Option<String>,
    description: Option<String>,
    valid: bool,
}

pub fn run(ctx: &CommandContext, category: Option<&str>, format: OutputFormat) -> Result<()> {
    let store = ctx.manager.templates();
    let summaries: Vec<TemplateSummary> = store
        .list_templates(category)
        .into_iter()
        .map(|name| match store.load(&name) {
            Ok(template) => TemplateSummary {
                valid: store.validate_template(&name),
                version: Some(template.version),
                description: template.description,
                name,
            },
            Err(_) => TemplateSummary {
                name,
                version: None,
                description: None,
                valid: false,
            },
        })
        .collect();

    if format.is_json() {
        return print_json(&summaries);
    }

    let out = Output::new();
    if summaries.is_empty() {
        match category {
            Some(category) => out.warning(&format!("No templates in category '{}'", category)),
            None => out.warning("No templates found"),
        }
        for dir in store.dirs() {
            out.info(&format!("Searched {}", dir.display()));
        }
        return Ok(());
    }

    out.header("Templates");
    for summary in &summaries {
        let version = summary.version.as_deref().unwrap_or("-");
        let description = summary.description.as_deref().unwrap_or("");
        let marker = if summary.valid { " " } else { "!" };
        println!(
            "{} {:<36} {:<8} {}",
            marker, summary.name, version, description
        );
    }
    if summaries.iter().any(|s| !s.valid) {
        out.warning("Templates marked with ! fail to compile");
    }
    Ok(())
}
