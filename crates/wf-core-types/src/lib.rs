#![allow(dead_code)]

//! Shared data model for the Wayfinder adaptive execution pipeline.
//!
//! Every other crate in the workspace depends on this one for the types
//! that cross component boundaries: the planner's output, the resolver's
//! input/output, the profiler's and pattern tracker's persisted knowledge,
//! the per-run mutable context, and the error taxonomy components map their
//! local failures onto.

pub mod context;
pub mod errors;
pub mod event;
pub mod locator;
pub mod pattern;
pub mod profile;
pub mod result;
pub mod step;

pub use context::RunContext;
pub use errors::WayfinderError;
pub use event::{Event, EventKind};
pub use locator::{Locator, LocatorStrategy};
pub use pattern::{ExactMatchCache, LearnedPattern};
pub use profile::{Framework, SiteProfile, WaitPolicy};
pub use result::StepResult;
pub use step::{ActionTag, ExecutionPlan, PlannedStep};

/// Process-unique identifier for one run of the adaptive engine.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for one [`PlannedStep`] within an [`ExecutionPlan`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_index(index: usize) -> Self {
        Self(format!("step-{index}"))
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract a registrable domain from a URL, tolerant of malformed input.
///
/// Mirrors the reference implementation's `urlparse(url).netloc` fallback:
/// an unparsable URL yields `"unknown"` rather than propagating an error,
/// since domain extraction is advisory (used as a cache key) not load-bearing.
pub fn domain_of(url: &str) -> String {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let host = host.rsplit('@').next().unwrap_or(host);
    if host.is_empty() {
        "unknown".to_string()
    } else {
        host.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_extraction_handles_scheme_and_path() {
        assert_eq!(domain_of("https://www.saucedemo.com/login"), "www.saucedemo.com");
        assert_eq!(domain_of("http://example.com:8080/a?b=1"), "example.com:8080");
        assert_eq!(domain_of("not a url"), "not a url");
        assert_eq!(domain_of(""), "unknown");
    }
}
