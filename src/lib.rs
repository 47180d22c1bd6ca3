//! Wayfinder: adaptive LLM-driven web automation core.
//!
//! This crate is a facade over the workspace's component crates — the
//! planner, site profiler, pattern tracker, locator resolver, step
//! validator, error recovery ladder, event bus, and the engine that wires
//! them together. Most applications only need [`Engine`] plus a concrete
//! [`Page`] implementation; the rest of the re-exports exist for callers
//! that want to observe or override one component directly.

pub use wf_core_types::{
    domain_of, ActionTag, Event, EventKind, ExecutionPlan, Framework, Locator, LocatorStrategy,
    PlannedStep, RunContext, RunId, SiteProfile, StepId, StepResult, WaitPolicy, WayfinderError,
};
pub use wf_driver::{DriverError, Element, ElementSnapshot, Page, WaitUntil};
pub use wf_engine::{AdaptiveResult, Engine, EngineConfig};
pub use wf_error_recovery::{ErrorKind, ErrorRecovery};
pub use wf_event_bus::{EventPublisher, InMemoryEventBus, Subscription};
pub use wf_llm_transport::{CompletionRequest, CompletionResponse, LlmTransport, Message};
pub use wf_locator_resolver::Resolution;
pub use wf_pattern_tracker::{DomainStats, PatternTracker};
pub use wf_planner::Planner;
pub use wf_site_profiler::SiteProfiler;
pub use wf_step_validator::{StepValidator, ValidationResult};

/// Install a `tracing` subscriber reading `RUST_LOG`, falling back to
/// `level` when the environment variable is unset or invalid.
pub fn init_tracing(level: &str) -> Result<(), anyhow::Error> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fallback = level.parse::<tracing::Level>().map_err(|_| anyhow::anyhow!("invalid log level '{level}'"))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback.to_string())))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
}
