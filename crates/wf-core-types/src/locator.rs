//! [`Locator`] — one element-resolution strategy, and the closed set of
//! strategy tags the Accessibility Resolver tries in order (spec §3, §4.5).

use serde::{Deserialize, Serialize};

/// Closed set of locator strategies, ordered here in the Resolver's default
/// intrinsic-confidence order (spec §4.5 step 4). A [`crate::SiteProfile`]
/// or [`crate::LearnedPattern`] may reorder this at use time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    Testid,
    Role,
    Label,
    Placeholder,
    Text,
    Aria,
    Css,
    Xpath,
}

impl LocatorStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Testid => "testid",
            LocatorStrategy::Role => "role",
            LocatorStrategy::Label => "label",
            LocatorStrategy::Placeholder => "placeholder",
            LocatorStrategy::Text => "text",
            LocatorStrategy::Aria => "aria",
            LocatorStrategy::Css => "css",
            LocatorStrategy::Xpath => "xpath",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "testid" => Some(Self::Testid),
            "role" => Some(Self::Role),
            "label" => Some(Self::Label),
            "placeholder" => Some(Self::Placeholder),
            "text" => Some(Self::Text),
            "aria" => Some(Self::Aria),
            "css" => Some(Self::Css),
            "xpath" => Some(Self::Xpath),
            _ => None,
        }
    }

    /// Strategy-intrinsic confidence, absent any learned adjustment
    /// (spec §4.5 step 4).
    pub fn intrinsic_confidence(&self) -> f64 {
        match self {
            LocatorStrategy::Testid => 0.98,
            LocatorStrategy::Role => 0.95,
            LocatorStrategy::Label => 0.92,
            LocatorStrategy::Aria => 0.90,
            LocatorStrategy::Placeholder => 0.85,
            LocatorStrategy::Text => 0.80,
            LocatorStrategy::Css => 0.60,
            LocatorStrategy::Xpath => 0.50,
        }
    }

    /// Universal baseline strategy every [`crate::SiteProfile`] must carry.
    pub const UNIVERSAL: LocatorStrategy = LocatorStrategy::Text;

    /// The full closed set, in default fallback order.
    pub fn all() -> [LocatorStrategy; 8] {
        [
            LocatorStrategy::Testid,
            LocatorStrategy::Role,
            LocatorStrategy::Label,
            LocatorStrategy::Placeholder,
            LocatorStrategy::Text,
            LocatorStrategy::Aria,
            LocatorStrategy::Css,
            LocatorStrategy::Xpath,
        ]
    }

    /// Infer the strategy that most likely produced a cached raw selector
    /// string (spec §4.3's `get_exact_match`, grounded on
    /// `selector_pattern_tracker.py`'s `_infer_type_from_selector`). Lives
    /// here rather than in `wf-locator-resolver` so `wf-pattern-tracker` can
    /// use it in `suggest()` without depending on the resolver crate.
    pub fn infer_from_selector(selector: &str) -> LocatorStrategy {
        let lower = selector.to_lowercase();
        if lower.contains("testid") {
            LocatorStrategy::Testid
        } else if lower.starts_with("role=") {
            LocatorStrategy::Role
        } else if lower.starts_with("label=") {
            LocatorStrategy::Label
        } else if lower.starts_with("placeholder=") {
            LocatorStrategy::Placeholder
        } else if lower.starts_with("text=") {
            LocatorStrategy::Text
        } else if lower.contains("aria-label") {
            LocatorStrategy::Aria
        } else if lower.starts_with("xpath=") {
            LocatorStrategy::Xpath
        } else {
            LocatorStrategy::Css
        }
    }
}

/// One resolution strategy plus the data it needs to attempt a bind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub value: String,
    /// Accessible-name qualifier, meaningful only for [`LocatorStrategy::Role`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessible_name: Option<String>,
    /// Whether [`LocatorStrategy::Text`] matching requires an exact match.
    #[serde(default)]
    pub exact: bool,
}

impl Locator {
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
            accessible_name: None,
            exact: false,
        }
    }

    pub fn role(role: impl Into<String>, accessible_name: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::Role,
            value: role.into(),
            accessible_name: Some(accessible_name.into()),
            exact: false,
        }
    }

    pub fn text(content: impl Into<String>, exact: bool) -> Self {
        Self {
            strategy: LocatorStrategy::Text,
            value: content.into(),
            accessible_name: None,
            exact,
        }
    }
}
