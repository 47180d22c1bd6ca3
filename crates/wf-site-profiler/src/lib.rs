//! Dynamic framework detection and learned selector-priority profiles
//! (spec §4.2). Grounded on `original_source/engine/site_profiler.py`
//! (`SiteProfiler`, `DETECT_SITE_JS`) for detection heuristics, and on the
//! teacher's `src/self_heal.rs` for the `parking_lot::RwLock` in-memory
//! cache plus atomic write-then-rename persistence idiom.

mod detect;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use wf_core_types::{domain_of, LocatorStrategy, SiteProfile};
use wf_driver::Page;

pub use detect::DETECT_SITE_JS;
use store::ProfileStore;

pub struct SiteProfiler {
    profiles: RwLock<ProfileStore>,
    cache_path: Option<PathBuf>,
}

impl SiteProfiler {
    pub fn new(cache_path: Option<PathBuf>) -> Self {
        let store = cache_path
            .as_ref()
            .map(|path| ProfileStore::load(path))
            .unwrap_or_default();
        Self { profiles: RwLock::new(store), cache_path }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Return the cached profile for `url`'s domain, or run detection if
    /// absent or `force_refresh` is set.
    pub async fn get_profile(&self, page: &dyn Page, force_refresh: bool) -> SiteProfile {
        let domain = domain_of(&page.url());

        if !force_refresh {
            if let Some(profile) = self.profiles.read().get(&domain) {
                debug!(%domain, "using cached site profile");
                return profile;
            }
        }

        let profile = self.detect(page, &domain).await;
        self.profiles.write().put(profile.clone());
        self.persist();
        profile
    }

    async fn detect(&self, page: &dyn Page, domain: &str) -> SiteProfile {
        info!(%domain, "detecting site profile");
        match page.evaluate(DETECT_SITE_JS).await {
            Ok(value) => detect::profile_from_js(domain, &value),
            Err(err) => {
                tracing::warn!(%domain, ?err, "site detection failed, defaulting to unknown");
                SiteProfile::new(domain)
            }
        }
    }

    /// Nudge a domain's selector priority list toward or away from a
    /// strategy that just succeeded or failed (spec §4.2 "learns from each
    /// resolution").
    pub fn record_outcome(&self, domain: &str, strategy: LocatorStrategy, success: bool) {
        let mut guard = self.profiles.write();
        let Some(mut profile) = guard.get(domain) else { return };
        profile.nudge(strategy, success);
        guard.put(profile);
        drop(guard);
        self.persist();
    }

    pub fn clear(&self, domain: Option<&str>) {
        match domain {
            Some(domain) => self.profiles.write().remove(domain),
            None => self.profiles.write().clear(),
        }
        self.persist();
    }

    fn persist(&self) {
        if let Some(path) = &self.cache_path {
            self.profiles.read().save(path);
        }
    }
}

impl Default for SiteProfiler {
    fn default() -> Self {
        Self::in_memory()
    }
}

pub fn shared() -> Arc<SiteProfiler> {
    let path = dirs::home_dir().map(|home| home.join(".wayfinder/site_profiles.json"));
    Arc::new(SiteProfiler::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wf_driver::fixture::FixturePage;

    #[tokio::test]
    async fn detects_and_caches_next_js() {
        let page = FixturePage::new("https://shop.example/cart").with_evaluate_result(json!({
            "framework": "next.js",
            "rootSelector": "#__next",
            "selectorPriorities": ["testid", "role", "text"],
            "usesShadowDom": false,
            "needsHydrationWait": true,
            "detectionConfidence": 0.95,
        }));

        let profiler = SiteProfiler::in_memory();
        let profile = profiler.get_profile(&page, false).await;
        assert_eq!(profile.domain, "shop.example");
        assert_eq!(profile.framework.label(), "next.js");
        assert!(profile.needs_hydration_wait);

        let cached = profiler.get_profile(&page, false).await;
        assert_eq!(cached.detection_confidence, 0.95);
    }

    #[tokio::test]
    async fn detection_failure_falls_back_to_unknown_profile() {
        struct FailingPage;
        #[async_trait::async_trait]
        impl Page for FailingPage {
            fn url(&self) -> String {
                "https://broken.example".into()
            }
            fn title(&self) -> String {
                String::new()
            }
            async fn goto(&self, _url: &str, _w: wf_driver::WaitUntil) -> Result<(), wf_driver::DriverError> {
                Ok(())
            }
            async fn reload(&self) -> Result<(), wf_driver::DriverError> {
                Ok(())
            }
            async fn go_back(&self) -> Result<(), wf_driver::DriverError> {
                Ok(())
            }
            async fn wait_for_load_state(&self, _w: wf_driver::WaitUntil, _t: std::time::Duration) -> Result<(), wf_driver::DriverError> {
                Ok(())
            }
            async fn query_selector(&self, _s: &str) -> Result<Option<Box<dyn wf_driver::Element>>, wf_driver::DriverError> {
                Ok(None)
            }
            async fn query_selector_all(&self, _s: &str) -> Result<Vec<Box<dyn wf_driver::Element>>, wf_driver::DriverError> {
                Ok(Vec::new())
            }
            async fn wait_for_selector(&self, _s: &str, _t: std::time::Duration) -> Result<Option<Box<dyn wf_driver::Element>>, wf_driver::DriverError> {
                Ok(None)
            }
            async fn evaluate(&self, _s: &str) -> Result<serde_json::Value, wf_driver::DriverError> {
                Err(wf_driver::DriverError::Failed("boom".into()))
            }
            async fn press_key(&self, _k: &str) -> Result<(), wf_driver::DriverError> {
                Ok(())
            }
        }

        let profiler = SiteProfiler::in_memory();
        let profile = profiler.get_profile(&FailingPage, false).await;
        assert_eq!(profile.framework.label(), "unknown");
    }
}
