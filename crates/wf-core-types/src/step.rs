//! [`PlannedStep`] and [`ExecutionPlan`] — the Planner's output and the
//! Engine's unit of work (spec §3).
//!
//! `action: ActionTag` plus a flat set of `Option`/`Vec` fields, validated
//! per-variant by [`PlannedStep::validate_invariants`] rather than encoded
//! in the type via one enum variant per action. REDESIGN FLAGS (spec §9)
//! asks for the latter; tracked as an open gap against this crate rather
//! than implemented, since every consumer (`wf-planner`'s `build_step`,
//! `wf-engine`'s `dispatch`/`validate`) currently matches on `action` and
//! reads the shared fields directly — see `DESIGN.md`.

use serde::{Deserialize, Serialize};

use crate::locator::Locator;
use crate::StepId;

/// The closed set of action tags a [`PlannedStep`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    Navigate,
    Click,
    Fill,
    Type,
    Select,
    Hover,
    Scroll,
    Wait,
    PressKey,
    Extract,
}

impl ActionTag {
    pub fn name(&self) -> &'static str {
        match self {
            ActionTag::Navigate => "navigate",
            ActionTag::Click => "click",
            ActionTag::Fill => "fill",
            ActionTag::Type => "type",
            ActionTag::Select => "select",
            ActionTag::Hover => "hover",
            ActionTag::Scroll => "scroll",
            ActionTag::Wait => "wait",
            ActionTag::PressKey => "press_key",
            ActionTag::Extract => "extract",
        }
    }
}

/// Directive for how long/what to wait for after a step completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WaitAfter {
    Millis { ms: u64 },
    NetworkIdle,
    DomContentLoaded,
    Load,
    Selector { locator: Locator },
}

/// One unit of work produced by the Planner, consumed by the Engine.
/// Immutable once produced (spec §3 Lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStep {
    pub id: StepId,
    pub action: ActionTag,
    /// Free-text description of the target, e.g. "Sign In button".
    pub target: String,
    /// Text to type, URL to navigate to, option to select, or extraction key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Ordered preference list of resolution strategies, as produced by the
    /// LLM; the Engine may reorder this using profile/tracker knowledge.
    #[serde(default)]
    pub locators: Vec<Locator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after: Option<WaitAfter>,
    /// If true, a resolution/validation failure on this step does not fail
    /// the run (spec §4.8 step b, scenario S6).
    #[serde(default)]
    pub optional: bool,
}

impl PlannedStep {
    pub fn new(action: ActionTag, target: impl Into<String>) -> Self {
        Self {
            id: StepId::new(),
            action,
            target: target.into(),
            value: None,
            locators: Vec::new(),
            wait_after: None,
            optional: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_locators(mut self, locators: Vec<Locator>) -> Self {
        self.locators = locators;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Invariant check from spec §8: non-navigate steps must carry at least
    /// one locator; navigate/extract steps have their own invariants.
    pub fn validate_invariants(&self) -> Result<(), String> {
        match self.action {
            ActionTag::Navigate => {
                let value = self
                    .value
                    .as_deref()
                    .ok_or_else(|| "navigate step missing value/URL".to_string())?;
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(format!("navigate value '{value}' is not an absolute URL"));
                }
                if !(self.target.starts_with("http://") || self.target.starts_with("https://")) {
                    // Per spec §3: navigate steps carry the absolute URL in
                    // both target and value. We tolerate a human-readable
                    // target (normalised separately by the planner) but the
                    // value is load-bearing here.
                }
                Ok(())
            }
            ActionTag::Extract => {
                if self.value.is_none() {
                    return Err("extract step missing storage key in value".to_string());
                }
                Ok(())
            }
            _ => {
                if self.locators.is_empty() {
                    return Err(format!(
                        "{} step '{}' carries no locators",
                        self.action.name(),
                        self.target
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Framework hint surfaced by the Planner (spec §3 ExecutionPlan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopLevelStrategy {
    AccessibilityFirst,
    CssFirst,
    TextOnly,
}

/// Ordered list of [`PlannedStep`] plus optional framework hints (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<PlannedStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_strategy: Option<TopLevelStrategy>,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<PlannedStep>) -> Self {
        Self {
            steps,
            framework_hint: None,
            recommended_strategy: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::LocatorStrategy;

    #[test]
    fn navigate_step_requires_absolute_url_value() {
        let step = PlannedStep::new(ActionTag::Navigate, "Go to saucedemo");
        assert!(step.validate_invariants().is_err());

        let step = step.with_value("https://www.saucedemo.com");
        assert!(step.validate_invariants().is_ok());
    }

    #[test]
    fn non_navigate_step_requires_locator() {
        let step = PlannedStep::new(ActionTag::Click, "Sign In button");
        assert!(step.validate_invariants().is_err());

        let step = step.with_locators(vec![Locator::new(LocatorStrategy::Text, "Sign In")]);
        assert!(step.validate_invariants().is_ok());
    }

    #[test]
    fn extract_step_requires_storage_key() {
        let step = PlannedStep::new(ActionTag::Extract, "product price");
        assert!(step.validate_invariants().is_err());
        let step = step.with_value("price");
        assert!(step.validate_invariants().is_ok());
    }
}
