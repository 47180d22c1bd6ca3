//! [`EngineConfig`] — tunables for one [`crate::Engine`] (spec §9).
//!
//! Defaults mirror `original_source/engine/adaptive_engine.py`'s module
//! constants (`LOOKAHEAD`, `STEP_TIMEOUT_MS`, `LOCATOR_TIMEOUT_MS`,
//! `LLM_TIMEOUT_SEC`, `MAX_RECOVERY_ATTEMPTS`) plus the cache paths
//! `wf-site-profiler`/`wf-pattern-tracker` already default to via their own
//! `shared()` constructors.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one [`crate::Engine`] instance (spec §9 ambient stack).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many steps ahead the Engine speculatively resolves locators for.
    pub lookahead: usize,
    /// Per-step deadline covering resolve + execute + validate + one retry.
    pub step_timeout: Duration,
    /// Per-locator-attempt deadline inside the resolver.
    pub locator_timeout: Duration,
    /// Planner LLM call deadline.
    pub llm_timeout: Duration,
    /// Prefer a persistent (e.g. websocket) transport over request/response
    /// HTTP when both are available (spec §6, scenario S3).
    pub prefer_persistent_transport: bool,
    /// Cap on recovery attempts per (step, error kind).
    pub max_recovery_attempts: u32,
    pub profile_cache_path: Option<PathBuf>,
    pub pattern_cache_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead: 2,
            step_timeout: Duration::from_millis(30_000),
            locator_timeout: Duration::from_millis(2_000),
            llm_timeout: Duration::from_secs(120),
            prefer_persistent_transport: true,
            max_recovery_attempts: 3,
            profile_cache_path: dirs::home_dir().map(|home| home.join(".wayfinder/site_profiles.json")),
            pattern_cache_path: dirs::home_dir().map(|home| home.join(".wayfinder/selector_patterns.json")),
        }
    }
}
