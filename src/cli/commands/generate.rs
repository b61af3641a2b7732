//! Generate Command
//!
//! Render a template and send it to a single provider.
//!
//! Usage:
//!   crosscheck generate <template> -p <provider> [--var key=value]... [--model m]

use crate::ai::provider::GenerationParams;
use crate::cli::util::{CommandContext, OutputFormat, parse_vars, print_json, runtime};
use crate::types::Result;

pub fn run(
    ctx: &CommandContext,
    template: &str,
    provider: &str,
    vars: &[String],
    params: GenerationParams,
    format: OutputFormat,
) -> Result<()> {
    let context = parse_vars(vars)?;

    let rt = runtime()?;
    let response = rt.block_on(
        ctx.manager
            .generate_from_template(template, &context, provider, &params),
    )?;

    if format.is_json() {
        print_json(&response)?;
    } else {
        println!("{}", response.content);
    }
    Ok(())
}
