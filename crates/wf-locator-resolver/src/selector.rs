//! [`Locator`] → driver selector string. Kept a separate mapping (rather
//! than folded into `wf-driver`) since the mapping is resolver policy, not
//! a driver capability — grounded on
//! `original_source/engine/accessibility_resolver.py`'s `_try_locator` /
//! `_build_locator`, which pick a distinct Playwright locator method per
//! [`LocatorStrategy`].

use wf_core_types::{Locator, LocatorStrategy};

pub fn to_driver_selector(locator: &Locator) -> String {
    match locator.strategy {
        LocatorStrategy::Testid => format!("[data-testid=\"{}\"]", locator.value),
        LocatorStrategy::Role => match &locator.accessible_name {
            Some(name) => format!("role={}[name=\"{}\"]", locator.value, name),
            None => format!("role={}", locator.value),
        },
        LocatorStrategy::Label => format!("label={}", locator.value),
        LocatorStrategy::Placeholder => format!("placeholder={}", locator.value),
        LocatorStrategy::Text => {
            if locator.exact {
                format!("text=\"{}\"", locator.value)
            } else {
                format!("text={}", locator.value)
            }
        }
        LocatorStrategy::Aria => format!("[aria-label*=\"{}\" i]", locator.value),
        LocatorStrategy::Css => locator.value.clone(),
        LocatorStrategy::Xpath => format!("xpath={}", locator.value),
    }
}

/// Infer the locator strategy that most likely produced a cached raw
/// selector string. Thin re-export of [`LocatorStrategy::infer_from_selector`]
/// kept here so existing callers of this module don't need to change;
/// `wf-pattern-tracker` calls the `wf-core-types` version directly since it
/// sits below this crate in the dependency graph.
pub fn infer_strategy_from_selector(selector: &str) -> LocatorStrategy {
    LocatorStrategy::infer_from_selector(selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_role_with_accessible_name() {
        let locator = Locator::role("button", "Login");
        assert_eq!(to_driver_selector(&locator), "role=button[name=\"Login\"]");
    }

    #[test]
    fn infers_testid_from_cached_selector() {
        assert_eq!(infer_strategy_from_selector("[data-testid=\"login-btn\"]"), LocatorStrategy::Testid);
        assert_eq!(infer_strategy_from_selector("#login"), LocatorStrategy::Css);
    }
}
