//! [`SiteProfile`] — per-domain learned knowledge (spec §3, §4.2).

use serde::{Deserialize, Serialize};

use crate::locator::LocatorStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    React,
    Next,
    Angular,
    AngularJs,
    Vue,
    Nuxt,
    Svelte,
    Vanilla,
    Unknown,
}

impl Framework {
    pub fn label(&self) -> &'static str {
        match self {
            Framework::React => "react",
            Framework::Next => "next.js",
            Framework::Angular => "angular",
            Framework::AngularJs => "angularjs",
            Framework::Vue => "vue",
            Framework::Nuxt => "nuxt",
            Framework::Svelte => "svelte",
            Framework::Vanilla => "vanilla",
            Framework::Unknown => "unknown",
        }
    }
}

/// Post-navigation wait policy, selected by detected framework (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    NetworkIdle,
    DomContentLoaded,
    Load,
}

impl WaitPolicy {
    pub fn for_framework(framework: Framework) -> Self {
        match framework {
            Framework::React | Framework::Next | Framework::Vue | Framework::Nuxt => {
                WaitPolicy::NetworkIdle
            }
            Framework::Angular | Framework::AngularJs => WaitPolicy::DomContentLoaded,
            Framework::Svelte | Framework::Vanilla | Framework::Unknown => WaitPolicy::Load,
        }
    }
}

/// Per-domain knowledge about front-end framework and selector availability
/// (spec §3). Created on first visit, mutated on every recorded resolution
/// outcome, persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub domain: String,
    pub framework: Framework,
    pub root_selector: String,
    /// Invariant: always contains `LocatorStrategy::Text` (spec §3, §8).
    pub selector_priorities: Vec<LocatorStrategy>,
    pub uses_shadow_dom: bool,
    pub needs_hydration_wait: bool,
    pub detected_at: chrono::DateTime<chrono::Utc>,
    pub detection_confidence: f64,
}

impl SiteProfile {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            framework: Framework::Unknown,
            root_selector: "body".to_string(),
            selector_priorities: vec![LocatorStrategy::UNIVERSAL],
            uses_shadow_dom: false,
            needs_hydration_wait: false,
            detected_at: chrono::Utc::now(),
            detection_confidence: 0.0,
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::for_framework(self.framework)
    }

    /// Move `strategy` one slot toward the front (`success = true`) or back
    /// (`success = false`) of the priority list. One slot per event, to
    /// avoid oscillation (spec §4.2 "Learning").
    pub fn nudge(&mut self, strategy: LocatorStrategy, success: bool) {
        let Some(idx) = self.selector_priorities.iter().position(|s| *s == strategy) else {
            return;
        };
        if success {
            if idx > 0 {
                self.selector_priorities.swap(idx, idx - 1);
            }
        } else if idx + 1 < self.selector_priorities.len() {
            self.selector_priorities.swap(idx, idx + 1);
        }
    }

    /// Enforce the invariant that `text` is always present, appending it as
    /// the universal last resort if detection omitted it (spec §4.2).
    pub fn ensure_universal_fallback(&mut self) {
        if !self.selector_priorities.contains(&LocatorStrategy::UNIVERSAL) {
            self.selector_priorities.push(LocatorStrategy::UNIVERSAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dom_profile_defaults_to_text_only() {
        let profile = SiteProfile::new("example.com");
        assert_eq!(profile.selector_priorities, vec![LocatorStrategy::Text]);
    }

    #[test]
    fn nudge_moves_one_slot_toward_front_on_success() {
        let mut profile = SiteProfile::new("example.com");
        profile.selector_priorities = vec![
            LocatorStrategy::Css,
            LocatorStrategy::Text,
            LocatorStrategy::Role,
        ];
        profile.nudge(LocatorStrategy::Role, true);
        assert_eq!(
            profile.selector_priorities,
            vec![LocatorStrategy::Css, LocatorStrategy::Role, LocatorStrategy::Text]
        );
    }

    #[test]
    fn nudge_moves_one_slot_toward_back_on_failure() {
        let mut profile = SiteProfile::new("example.com");
        profile.selector_priorities = vec![
            LocatorStrategy::Css,
            LocatorStrategy::Text,
            LocatorStrategy::Role,
        ];
        profile.nudge(LocatorStrategy::Css, false);
        assert_eq!(
            profile.selector_priorities,
            vec![LocatorStrategy::Text, LocatorStrategy::Css, LocatorStrategy::Role]
        );
    }

    #[test]
    fn wait_policy_matches_framework() {
        assert_eq!(WaitPolicy::for_framework(Framework::React), WaitPolicy::NetworkIdle);
        assert_eq!(WaitPolicy::for_framework(Framework::Angular), WaitPolicy::DomContentLoaded);
        assert_eq!(WaitPolicy::for_framework(Framework::Vanilla), WaitPolicy::Load);
    }
}
