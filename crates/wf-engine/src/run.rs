//! Per-step execution loop (spec §4.8 steps 3-4): await speculative
//! resolution, pre-validate, execute, post-validate, recover-and-retry on
//! failure, record outcome. Cancellation is threaded into every suspending
//! call via [`cancellable`] (spec §5).

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wf_core_types::{ActionTag, PlannedStep, RunContext, SiteProfile, StepId, StepResult};
use wf_driver::Page;
use wf_error_recovery::{ErrorRecovery, RecoveryDecision, RecoveryRequest};
use wf_locator_resolver::Resolution;
use wf_pattern_tracker::PatternTracker;
use wf_site_profiler::SiteProfiler;
use wf_step_validator::StepValidator;

use crate::dispatch;
use crate::speculative::SpeculativeTasks;
use crate::validate;

/// Race `fut` against cancellation; `None` means the token fired first.
async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        result = fut => Some(result),
    }
}

fn cancelled_result(step_id: StepId) -> StepResult {
    StepResult::failure(step_id, Duration::ZERO, "cancelled", "run cancelled")
}

pub struct StepRunner<'a> {
    pub validator: &'a StepValidator,
    pub recovery: &'a ErrorRecovery,
    pub tracker: &'a PatternTracker,
    pub profiler: &'a SiteProfiler,
    pub max_attempts: u32,
    pub locator_timeout_ms: u64,
}

impl<'a> StepRunner<'a> {
    async fn recover(&self, page: &dyn Page, ctx: &mut RunContext, step_id: &str, selector: Option<&str>, message: &str) -> RecoveryDecision {
        let request = RecoveryRequest { step_id, selector, current_timeout_ms: self.locator_timeout_ms };
        self.recovery.recover(message, page, ctx, request).await
    }

    /// Run one [`PlannedStep`] to completion: resolve (or reuse a
    /// speculative result), pre-validate, execute, post-validate, retrying
    /// through the recovery ladder up to `max_attempts` times.
    pub async fn run_step(
        &self,
        page: &dyn Page,
        step: &PlannedStep,
        ctx: &mut RunContext,
        profile: &SiteProfile,
        speculative: &mut SpeculativeTasks,
        domain: &str,
        cancel: &CancellationToken,
    ) -> StepResult {
        let started = Instant::now();
        let needs_element = !step.locators.is_empty();
        let mut attempt: u32 = 0;
        let mut resolution: Option<Resolution> = None;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return cancelled_result(step.id.clone());
            }

            if needs_element && resolution.is_none() {
                let Some(outcome) = cancellable(cancel, self.resolve_for(page, step, profile, speculative, domain)).await else {
                    return cancelled_result(step.id.clone());
                };
                match outcome {
                    Ok(resolved) => resolution = Some(resolved),
                    Err(err) => {
                        debug!(step_id = %step.id, %err, "locator resolution failed");
                        return StepResult::failure(step.id.clone(), started.elapsed(), "locator_unresolvable", err.to_string());
                    }
                }
            }

            if needs_element {
                let selector = resolution.as_ref().expect("resolved above").selector_used.clone();
                let Some(pre) = cancellable(cancel, self.validator.pre_validate(page, &selector)).await else {
                    return cancelled_result(step.id.clone());
                };
                if !pre.success {
                    let Some(decision) = cancellable(cancel, self.recover(page, ctx, &step.id.0, Some(&selector), &pre.message)).await else {
                        return cancelled_result(step.id.clone());
                    };
                    if decision.should_retry && attempt < self.max_attempts {
                        ctx.take_flag("re_resolve");
                        resolution = None;
                        continue;
                    }
                    return StepResult::failure(step.id.clone(), started.elapsed(), "pre_validate_failed", pre.message);
                }
            }

            let url_before = page.url();
            let dom_before = if step.action == ActionTag::Click {
                wf_step_validator::dom_fingerprint(page).await
            } else {
                String::new()
            };

            let Some(execute_result) = cancellable(cancel, dispatch::execute(page, step, resolution.as_ref(), profile, ctx)).await else {
                return cancelled_result(step.id.clone());
            };
            let extracted_text = match execute_result {
                Ok(text) => text,
                Err(err) => {
                    let selector = resolution.as_ref().map(|r| r.selector_used.clone());
                    let Some(decision) = cancellable(cancel, self.recover(page, ctx, &step.id.0, selector.as_deref(), &err.to_string())).await else {
                        return cancelled_result(step.id.clone());
                    };
                    if decision.should_retry && attempt < self.max_attempts {
                        ctx.take_flag("re_resolve");
                        resolution = None;
                        continue;
                    }
                    return StepResult::failure(step.id.clone(), started.elapsed(), "execute_failed", err.to_string());
                }
            };

            if let (Some(text), Some(key)) = (&extracted_text, &step.value) {
                ctx.clipboard_set(key.clone(), text.clone());
            }

            let selector_for_validation = resolution.as_ref().map(|r| r.selector_used.clone()).unwrap_or_default();
            let Some(validation) = cancellable(cancel, validate::post_validate(self.validator, page, step, &selector_for_validation, &url_before, &dom_before)).await else {
                return cancelled_result(step.id.clone());
            };

            if validation.success {
                if let Some(resolution) = &resolution {
                    self.tracker.record_success(domain, &step.target, resolution.strategy_used, &resolution.selector_used);
                    self.profiler.record_outcome(domain, resolution.strategy_used, true);
                    return StepResult::success(step.id.clone(), started.elapsed(), resolution.strategy_used, resolution.selector_used.clone())
                        .with_alternatives(resolution.attempted_alternatives.clone());
                }
                return StepResult {
                    step_id: step.id.clone(),
                    success: true,
                    duration: started.elapsed(),
                    strategy_used: None,
                    selector_used: None,
                    error_kind: None,
                    error_message: None,
                    attempted_alternatives: Vec::new(),
                };
            }

            if let Some(resolution) = &resolution {
                self.tracker.record_failure(domain, &step.target, resolution.strategy_used);
                self.profiler.record_outcome(domain, resolution.strategy_used, false);
            }

            let message = validate::synthetic_recovery_message(step, &validation);
            let selector = resolution.as_ref().map(|r| r.selector_used.clone());
            let Some(decision) = cancellable(cancel, self.recover(page, ctx, &step.id.0, selector.as_deref(), &message)).await else {
                return cancelled_result(step.id.clone());
            };
            if decision.should_retry && attempt < self.max_attempts {
                ctx.take_flag("re_resolve");
                resolution = None;
                continue;
            }
            warn!(step_id = %step.id, message = %validation.message, "step validation failed, not retrying further");
            return StepResult::failure(step.id.clone(), started.elapsed(), "validation_failed", validation.message);
        }
    }

    async fn resolve_for(
        &self,
        page: &dyn Page,
        step: &PlannedStep,
        profile: &SiteProfile,
        speculative: &mut SpeculativeTasks,
        domain: &str,
    ) -> Result<Resolution, wf_core_types::WayfinderError> {
        if let Some(outcome) = speculative.take(&step.id).await {
            return outcome;
        }
        wf_locator_resolver::resolve(page, &step.locators, profile, &step.target, domain, Some(self.tracker), &step.id.0).await
    }
}
