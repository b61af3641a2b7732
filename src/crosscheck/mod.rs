//! Cross-Check Orchestrator
//!
//! Fans one request out to every target provider concurrently and gathers
//! the outcomes into a single [`CrossCheckResult`].
//!
//! ## Guarantees
//!
//! - One target failing never affects the others
//! - All targets reach a terminal state before the result is built
//! - Entries follow the request's target order, not completion order
//! - When the overall deadline passes or the caller cancels, unfinished
//!   targets are aborted and recorded as `timeout` / `cancelled`
//! - Dropping the returned future aborts every outstanding target

mod types;

pub use types::{
    CandidateResponse, CrossCheckEntry, CrossCheckMode, CrossCheckRequest, CrossCheckResult,
    CrossCheckStatus, Target, TargetFailure, TargetOutcome,
};

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai::manager::LlmManager;
use crate::ai::prompt::TemplateContext;
use crate::ai::provider::GenerationParams;
use crate::ai::timeout::with_timeout;
use crate::types::{FailureKind, Result};

/// Why the fan-out stopped waiting
#[derive(Debug, Clone, Copy)]
enum Interrupt {
    Deadline(Duration),
    Cancelled,
}

impl Interrupt {
    fn failure(self) -> TargetFailure {
        match self {
            Self::Deadline(deadline) => TargetFailure {
                kind: FailureKind::Timeout,
                message: format!("Cross-check deadline of {:?} passed before completion", deadline),
            },
            Self::Cancelled => TargetFailure {
                kind: FailureKind::Cancelled,
                message: "Cross-check cancelled before completion".to_string(),
            },
        }
    }
}

pub struct CrossCheckOrchestrator {
    manager: Arc<LlmManager>,
}

impl std::fmt::Debug for CrossCheckOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossCheckOrchestrator")
            .field("manager", &self.manager)
            .finish()
    }
}

impl CrossCheckOrchestrator {
    pub fn new(manager: Arc<LlmManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<LlmManager> {
        &self.manager
    }

    pub async fn cross_check(&self, request: CrossCheckRequest) -> Result<CrossCheckResult> {
        self.cross_check_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Run a cross-check that also stops when `cancel` fires
    ///
    /// Fails only for unusable input or a template that cannot be loaded;
    /// every provider-side problem is captured in the result entries.
    pub async fn cross_check_with_cancel(
        &self,
        request: CrossCheckRequest,
        cancel: CancellationToken,
    ) -> Result<CrossCheckResult> {
        request.validate_input()?;

        let config = self.manager.crosscheck_config();
        let template = request.template.clone().unwrap_or_else(|| match request.mode {
            CrossCheckMode::Validate => config.validation_template.clone(),
            CrossCheckMode::Compare => config.comparison_template.clone(),
        });
        // Template errors fail the whole request
        self.manager.templates().load(&template)?;

        let id = Uuid::new_v4();
        let deadline = request.deadline.unwrap_or(self.manager.timeouts().crosscheck);
        let started_at = Utc::now();
        let started = Instant::now();

        info!(
            id = %id,
            mode = %request.mode,
            template = %template,
            targets = request.targets.len(),
            "Starting cross-check"
        );

        let shared = request.shared_context();
        let base_params = match request.mode {
            CrossCheckMode::Validate => request.params.clone().or(
                &GenerationParams::default()
                    .with_temperature(config.temperature)
                    .with_max_tokens(config.max_tokens),
            ),
            CrossCheckMode::Compare => request.params.clone(),
        };

        let mut handles: Vec<AbortOnDropHandle<CrossCheckEntry>> = request
            .targets
            .iter()
            .map(|target| {
                let mut context = shared.clone();
                if let Some(display_name) = &target.display_name {
                    let key = match request.mode {
                        CrossCheckMode::Validate => "validator_name",
                        CrossCheckMode::Compare => "provider_name",
                    };
                    context.insert(key, display_name.clone());
                }
                let context = context.merge(&target.overrides);
                let params = target.params.clone().or(&base_params);

                self.dispatch(
                    target.provider.clone(),
                    template.clone(),
                    context,
                    params,
                    target.timeout,
                    started,
                )
            })
            .collect();

        let mut slots: Vec<Option<CrossCheckEntry>> = vec![None; handles.len()];
        let interrupt = {
            let mut pending: FuturesUnordered<_> = handles
                .iter_mut()
                .enumerate()
                .map(|(index, handle)| async move { (index, handle.await) })
                .collect();
            let expiry = tokio::time::sleep(deadline);
            tokio::pin!(expiry);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Some(Interrupt::Cancelled),
                    _ = &mut expiry => break Some(Interrupt::Deadline(deadline)),
                    next = pending.next() => match next {
                        Some((index, joined)) => {
                            slots[index] = Some(joined.unwrap_or_else(|e| {
                                let provider = request.targets[index].provider.clone();
                                warn!(provider = %provider, error = %e, "Cross-check task failed");
                                CrossCheckEntry::failure(
                                    provider,
                                    TargetFailure {
                                        kind: FailureKind::Internal,
                                        message: format!("Task failed: {}", e),
                                    },
                                    elapsed_ms(started),
                                )
                            }));
                        }
                        None => break None,
                    },
                }
            }
        };

        let mut entries = Vec::with_capacity(slots.len());
        for ((slot, handle), target) in slots.into_iter().zip(&handles).zip(&request.targets) {
            match (slot, interrupt) {
                (Some(entry), _) => entries.push(entry),
                (None, Some(interrupt)) => {
                    handle.abort();
                    debug!(provider = %target.provider, ?interrupt, "Abandoned unfinished target");
                    entries.push(CrossCheckEntry::failure(
                        target.provider.clone(),
                        interrupt.failure(),
                        elapsed_ms(started),
                    ));
                }
                (None, None) => entries.push(CrossCheckEntry::failure(
                    target.provider.clone(),
                    TargetFailure {
                        kind: FailureKind::Internal,
                        message: "Target finished without an outcome".to_string(),
                    },
                    elapsed_ms(started),
                )),
            }
        }

        let succeeded = entries.iter().filter(|e| e.is_success()).count();
        let status = CrossCheckStatus::from_counts(succeeded, entries.len());
        let result = CrossCheckResult {
            id,
            query: request.query,
            mode: request.mode,
            template,
            status,
            entries,
            started_at,
            duration_ms: elapsed_ms(started),
        };

        info!(
            id = %id,
            status = %status,
            succeeded,
            failed = result.entries.len() - succeeded,
            duration_ms = result.duration_ms,
            "Cross-check finished"
        );
        Ok(result)
    }

    /// Spawn one target invocation; the task always yields an entry
    ///
    /// The task is aborted when its handle is dropped.
    fn dispatch(
        &self,
        provider: String,
        template: String,
        context: TemplateContext,
        params: GenerationParams,
        timeout: Option<Duration>,
        started: Instant,
    ) -> AbortOnDropHandle<CrossCheckEntry> {
        let manager = Arc::clone(&self.manager);
        AbortOnDropHandle::new(tokio::spawn(async move {
            let call = manager.generate_from_template(&template, &context, &provider, &params);
            let outcome = match timeout {
                Some(limit) => with_timeout(limit, call, &provider).await,
                None => call.await,
            };
            let latency_ms = elapsed_ms(started);
            match outcome {
                Ok(response) => {
                    debug!(provider = %provider, latency_ms, "Target succeeded");
                    CrossCheckEntry::success(provider, response, latency_ms)
                }
                Err(err) => {
                    warn!(provider = %provider, error = %err, latency_ms, "Target failed");
                    let failure = TargetFailure::from(&err);
                    CrossCheckEntry::failure(provider, failure, latency_ms)
                }
            }
        }))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
