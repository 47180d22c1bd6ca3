//! [`AdaptiveResult`] — the Engine's summary of one run (spec §4.8 step 5).

use std::collections::HashMap;
use std::time::Duration;

use wf_core_types::{RunId, StepResult, WayfinderError};

/// Outcome of one [`crate::Engine::run`] call.
#[derive(Debug, Clone)]
pub struct AdaptiveResult {
    pub run_id: RunId,
    /// `true` iff every non-skipped step succeeded (spec §9 Open Questions:
    /// "a run with any skipped-but-optional step is still a success" is the
    /// weaker reading; this crate takes the stricter one — `failed == 0` —
    /// documented in `DESIGN.md`).
    pub success: bool,
    pub cancelled: bool,
    pub framework: String,
    pub duration: Duration,
    pub step_results: Vec<StepResult>,
    /// Clipboard contents written by `extract` steps, surfaced to the caller
    /// without requiring a `RunContext` handle.
    pub extracted: HashMap<String, String>,
    pub first_fatal_error: Option<WayfinderError>,
}

impl AdaptiveResult {
    pub fn steps_succeeded(&self) -> usize {
        self.step_results.iter().filter(|r| r.success).count()
    }

    pub fn steps_failed(&self) -> usize {
        self.step_results.iter().filter(|r| !r.success).count()
    }
}
