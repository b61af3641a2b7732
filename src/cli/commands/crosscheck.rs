//! Cross-Check Commands
//!
//! Usage:
//!   crosscheck validate -Q <query> -r <response> [-t provider]... [--criterion text]...
//!   crosscheck compare -Q <query> [-t provider]...
//!
//! Without `--target`, every configured provider takes part. Ctrl-C cancels
//! the run and still prints the partial result.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ai::provider::GenerationParams;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, print_json, runtime};
use crate::crosscheck::{
    CandidateResponse, CrossCheckMode, CrossCheckRequest, CrossCheckStatus, Target,
};
use crate::types::{CrossCheckError, Result};

/// Options shared by `validate` and `compare`
#[derive(Debug, Clone, Default)]
pub struct CrossCheckOptions {
    pub mode: CrossCheckMode,
    pub query: String,
    /// Candidate responses given inline
    pub responses: Vec<String>,
    /// Candidate responses read from files
    pub response_files: Vec<PathBuf>,
    /// Model that produced the candidate responses
    pub source: Option<String>,
    pub targets: Vec<String>,
    pub criteria: Vec<String>,
    pub template: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub deadline_secs: Option<f64>,
    /// Cap applied to every target
    pub timeout_secs: Option<f64>,
    pub format: OutputFormat,
}

/// Run a cross-check and print the aggregated result
pub fn run(ctx: &CommandContext, options: CrossCheckOptions) -> Result<CrossCheckStatus> {
    let available = ctx.manager.available_providers();
    let request = build_request(&options, &available)?;
    let orchestrator = ctx.orchestrator();

    let rt = runtime()?;
    let result = rt.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling outstanding providers");
                on_interrupt.cancel();
            }
        });
        let result = orchestrator.cross_check_with_cancel(request, cancel).await;
        watcher.abort();
        result
    })?;

    if options.format.is_json() {
        print_json(&result)?;
    } else {
        let out = Output::new();
        out.cross_check(&result);
        if let Some(metrics) = ctx.manager.registry().metrics() {
            out.metrics(&metrics.summary());
        }
    }

    Ok(result.status)
}

/// Turn command-line options into a request
///
/// `available` is used when no target was named explicitly.
pub fn build_request(
    options: &CrossCheckOptions,
    available: &[String],
) -> Result<CrossCheckRequest> {
    let timeout = options.timeout_secs.map(secs).transpose()?;
    let names: Vec<String> = if options.targets.is_empty() {
        available.to_vec()
    } else {
        options.targets.clone()
    };
    let targets = names.into_iter().map(|name| {
        let target = Target::new(name);
        match timeout {
            Some(timeout) => target.with_timeout(timeout),
            None => target,
        }
    });

    let mut request = match options.mode {
        CrossCheckMode::Validate => {
            CrossCheckRequest::validate(options.query.clone(), collect_responses(options)?)
        }
        CrossCheckMode::Compare => CrossCheckRequest::compare(options.query.clone()),
    }
    .with_targets(targets)
    .with_criteria(options.criteria.clone());

    let params = GenerationParams {
        model: options.model.clone(),
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        timeout_secs: None,
    };
    request = request.with_params(params);

    if let Some(template) = &options.template {
        request = request.with_template(template.clone());
    }
    if let Some(deadline) = options.deadline_secs {
        request = request.with_deadline(secs(deadline)?);
    }

    Ok(request)
}

fn collect_responses(options: &CrossCheckOptions) -> Result<Vec<CandidateResponse>> {
    let mut contents = options.responses.clone();
    for path in &options.response_files {
        contents.push(std::fs::read_to_string(path)?);
    }
    Ok(contents
        .into_iter()
        .map(|content| match &options.source {
            Some(source) => CandidateResponse::from_source(content, source.clone()),
            None => CandidateResponse::new(content),
        })
        .collect())
}

fn secs(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| {
            CrossCheckError::InvalidInput(format!(
                "Expected a positive number of seconds, got {}",
                value
            ))
        })
}
