//! Render Command
//!
//! Render a template locally without contacting any provider.
//!
//! Usage:
//!   crosscheck render <template> [--var key=value]... [--metadata]

use serde_json::json;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, parse_vars, print_json};
use crate::types::Result;

pub fn run(
    ctx: &CommandContext,
    name: &str,
    vars: &[String],
    metadata: bool,
    format: OutputFormat,
) -> Result<()> {
    let context = parse_vars(vars)?;
    let templates = ctx.manager.templates();
    let rendered = templates.render(name, &context)?;

    if format.is_json() {
        let template = templates.load(name)?;
        return print_json(&json!({
            "template": name,
            "version": template.version,
            "rendered": rendered,
        }));
    }

    if metadata {
        let template = templates.load(name)?;
        let out = Output::new();
        out.header(&template.name);
        if let Some(description) = &template.description {
            out.field("description", description);
        }
        out.field("version", &template.version);
        if let Some(category) = &template.category {
            out.field("category", category);
        }
        if !template.tags.is_empty() {
            out.field("tags", template.tags.join(", "));
        }
        out.field("required", template.required_variables.join(", "));
        let optional: Vec<&str> = template
            .optional_variables
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        out.field("optional", optional.join(", "));
        out.section("Rendered");
    }

    println!("{}", rendered);
    Ok(())
}
