//! Lookahead speculative locator resolution (spec §4.8 step 3, §5).
//!
//! Grounded on `original_source/engine/adaptive_engine.py`'s
//! `_speculative_resolve` task pool: resolution for the next `LOOKAHEAD`
//! steps runs concurrently with execution of the current one, keyed by step
//! id, consumed at most once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use wf_core_types::{PlannedStep, SiteProfile, StepId, WayfinderError};
use wf_driver::Page;
use wf_locator_resolver::{resolve, Resolution};
use wf_pattern_tracker::PatternTracker;

/// How long the engine waits for an already-spawned speculative task before
/// falling back to a synchronous resolve. Speculation is expected to have
/// finished well before the step is reached; this is a short grace window,
/// not the resolver's own per-locator timeout.
const SPECULATIVE_GRACE: Duration = Duration::from_millis(50);

pub struct SpeculativeTasks {
    pending: HashMap<StepId, JoinHandle<Result<Resolution, WayfinderError>>>,
}

impl SpeculativeTasks {
    pub fn new() -> Self {
        Self { pending: HashMap::new() }
    }

    /// Spawn resolution for `step`, if it needs one (carries locators) and
    /// isn't already in flight.
    pub fn spawn(&mut self, step: &PlannedStep, page: Arc<dyn Page>, profile: SiteProfile, tracker: Arc<PatternTracker>, domain: String) {
        if step.locators.is_empty() || self.pending.contains_key(&step.id) {
            return;
        }
        let locators = step.locators.clone();
        let target = step.target.clone();
        let step_id = step.id.clone();
        let handle = tokio::spawn(async move { resolve(page.as_ref(), &locators, &profile, &target, &domain, Some(tracker.as_ref()), &step_id.0).await });
        self.pending.insert(step.id.clone(), handle);
    }

    /// Consume the speculative result for `step_id`, if any, waiting at most
    /// [`SPECULATIVE_GRACE`] for an in-flight task to finish. `None` means
    /// the caller should fall back to resolving synchronously.
    pub async fn take(&mut self, step_id: &StepId) -> Option<Result<Resolution, WayfinderError>> {
        let handle = self.pending.remove(step_id)?;
        match tokio::time::timeout(SPECULATIVE_GRACE, handle).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(_join_err)) => None,
            Err(_elapsed) => None,
        }
    }

    /// Abort every in-flight task without recording any outcome (spec §5:
    /// speculative tasks are cancelled on Engine shutdown and never
    /// propagate their error).
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}

impl Default for SpeculativeTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SpeculativeTasks {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
