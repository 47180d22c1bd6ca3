//! Error taxonomy shared across component boundaries (spec §7).
//!
//! Component-local errors (e.g. `LocatorError` in `wf-locator-resolver`)
//! are mapped onto these variants wherever they cross into the engine, so
//! the engine and the Error Recovery ladder can reason over a single closed
//! set rather than every crate's private error type.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum WayfinderError {
    /// The planner returned zero steps after every fallback. Fatal for the run.
    #[error("planner produced an empty plan")]
    PlanEmpty,

    /// All locator strategies were exhausted for a required step.
    #[error("could not resolve any locator for step {step_id}: {detail}")]
    LocatorUnresolvable { step_id: String, detail: String },

    /// Post-action checks did not confirm the expected effect.
    #[error("validation failed for step {step_id}: {detail}")]
    ValidationFailed { step_id: String, detail: String },

    /// The per-(step, kind) recovery attempt cap was reached.
    #[error("recovery exhausted for step {step_id} ({kind}) after {attempts} attempts")]
    RecoveryExhausted {
        step_id: String,
        kind: String,
        attempts: u32,
    },

    /// LLM transport timed out waiting for a response.
    #[error("llm transport timed out after {0}s")]
    TransportTimeout(u64),

    /// The persistent transport's connection dropped mid-flight.
    #[error("llm transport disconnected: {0}")]
    TransportDisconnect(String),

    /// The LLM response could not be parsed into the expected schema.
    #[error("llm response parse error: {0}")]
    TransportParseError(String),

    /// The LLM endpoint signalled a rate limit.
    #[error("llm transport rate limited: {0}")]
    TransportRateLimit(String),

    /// Any suspend-point failure raised by the page driver.
    #[error("driver error: {0}")]
    DriverError(String),

    /// Surfaced by an external policy collaborator; never retried.
    #[error("policy denied: {0}")]
    PolicyDenied(String),

    /// The run was cancelled cooperatively (spec §5 Cancellation).
    #[error("run cancelled")]
    Cancelled,
}

impl WayfinderError {
    /// Transport-layer faults the Planner is allowed to retry once on reconnect.
    pub fn is_retryable_transport(&self) -> bool {
        matches!(
            self,
            WayfinderError::TransportTimeout(_) | WayfinderError::TransportDisconnect(_)
        )
    }

    /// Whether this error, if left unresolved, must terminate the whole run
    /// (as opposed to just the current step, when the step is optional).
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            WayfinderError::PlanEmpty | WayfinderError::PolicyDenied(_) | WayfinderError::Cancelled
        )
    }
}
