//! Accessibility-first element resolver (spec §4.5).
//!
//! Grounded on `original_source/engine/accessibility_resolver.py`'s
//! `AccessibilityResolver` (per-locator timeout, visible-candidate scan,
//! profile/pattern-based reordering, wait-then-fuzzy fallback tier) and on
//! the teacher's `action-locator/src/resolver.rs` fallback-chain loop shape.

mod selector;

use std::time::Duration;

use tracing::{debug, warn};
use wf_core_types::{Locator, LocatorStrategy, SiteProfile, WayfinderError};
use wf_driver::{Element, Page};
use wf_pattern_tracker::PatternTracker;

pub use selector::{infer_strategy_from_selector, to_driver_selector};

/// Per-locator-attempt deadline (spec §4.5; `LOCATOR_TIMEOUT_MS` in the
/// reference implementation).
const LOCATOR_ATTEMPT_DEADLINE: Duration = Duration::from_millis(2000);
/// Wait-for-visible deadline used by the fallback tier.
const FALLBACK_WAIT_DEADLINE: Duration = Duration::from_millis(3000);
/// How many candidates from `query_selector_all` are scanned for the first
/// visible one before giving up on a strategy.
const VISIBLE_SCAN_LIMIT: usize = 5;
/// How many locators (in priority order) the wait-fallback tier retries.
const WAIT_FALLBACK_LOCATOR_LIMIT: usize = 3;
/// Tags the fuzzy-text fallback tier will bind to (spec §4.5 step 5(b)).
const FUZZY_MATCH_TAGS: &[&str] = &["button", "a", "input", "select", "textarea"];

pub struct Resolution {
    pub element: Box<dyn Element>,
    pub strategy_used: LocatorStrategy,
    pub selector_used: String,
    pub confidence: f64,
    pub attempted_alternatives: Vec<String>,
}

/// Reorder `locators` by combining strategy-intrinsic confidence with the
/// site profile's learned priority list and the pattern tracker's
/// per-target suggestions (spec §4.5 step 4, §4.2, §4.3).
fn prioritize(locators: &[Locator], profile: &SiteProfile, suggestions: &[(LocatorStrategy, f64)]) -> Vec<Locator> {
    let mut scored: Vec<(f64, Locator)> = locators
        .iter()
        .cloned()
        .map(|locator| {
            let profile_rank = profile.selector_priorities.iter().position(|s| *s == locator.strategy);
            let profile_score = profile_rank.map(|idx| 1.0 - (idx as f64 * 0.05).min(0.9)).unwrap_or(0.0);
            let learned_score = suggestions
                .iter()
                .find(|(strategy, _)| *strategy == locator.strategy)
                .map(|(_, confidence)| *confidence)
                .unwrap_or(0.0);
            let score = locator.strategy.intrinsic_confidence() * 0.5 + profile_score * 0.3 + learned_score * 0.2;
            (score, locator)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    scored.into_iter().map(|(_, locator)| locator).collect()
}

async fn first_visible(page: &dyn Page, selector: &str) -> Result<Option<Box<dyn Element>>, WayfinderError> {
    let candidates = page.query_selector_all(selector).await?;
    for candidate in candidates.into_iter().take(VISIBLE_SCAN_LIMIT) {
        if candidate.is_visible().await.unwrap_or(true) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

async fn try_locator(page: &dyn Page, locator: &Locator) -> Result<Option<(Box<dyn Element>, String)>, WayfinderError> {
    let selector = to_driver_selector(locator);
    let outcome = tokio::time::timeout(LOCATOR_ATTEMPT_DEADLINE, first_visible(page, &selector)).await;
    match outcome {
        Ok(Ok(Some(element))) => Ok(Some((element, selector))),
        Ok(Ok(None)) => Ok(None),
        Ok(Err(err)) => {
            debug!(?err, %selector, "locator attempt errored");
            Ok(None)
        }
        Err(_) => {
            debug!(%selector, "locator attempt timed out");
            Ok(None)
        }
    }
}

/// Resolve `target` against `locators` on `page`, trying the exact-match
/// cache first, then the reordered strategy chain, then a wait/fuzzy
/// fallback tier (spec §4.5).
pub async fn resolve(
    page: &dyn Page,
    locators: &[Locator],
    profile: &SiteProfile,
    target: &str,
    domain: &str,
    tracker: Option<&PatternTracker>,
    step_id: &str,
) -> Result<Resolution, WayfinderError> {
    if locators.is_empty() {
        return Err(WayfinderError::LocatorUnresolvable {
            step_id: step_id.to_string(),
            detail: "no locators supplied".to_string(),
        });
    }

    let mut attempted = Vec::new();

    if let Some(tracker) = tracker {
        if let Some(cached_selector) = tracker.exact_match(domain, target) {
            if let Ok(Some(element)) = first_visible(page, &cached_selector).await {
                let strategy = infer_strategy_from_selector(&cached_selector);
                return Ok(Resolution {
                    element,
                    strategy_used: strategy,
                    selector_used: cached_selector,
                    // spec §4.5: an exact-match cache hit raises confidence to
                    // 0.99, not 1.0 — 1.0 is reserved for the Suggest tier's
                    // own exact-match signal (spec §4.3).
                    confidence: 0.99,
                    attempted_alternatives: attempted,
                });
            }
        }
    }

    let suggestions = tracker.map(|tracker| tracker.suggest(domain, target)).unwrap_or_default();
    let ordered = prioritize(locators, profile, &suggestions);

    for locator in &ordered {
        match try_locator(page, locator).await? {
            Some((element, selector)) => {
                return Ok(Resolution {
                    element,
                    strategy_used: locator.strategy,
                    selector_used: selector,
                    confidence: locator.strategy.intrinsic_confidence(),
                    attempted_alternatives: attempted,
                });
            }
            None => attempted.push(to_driver_selector(locator)),
        }
    }

    // Fallback tier 1: wait for one of the top locators to become visible.
    for locator in ordered.iter().take(WAIT_FALLBACK_LOCATOR_LIMIT) {
        let selector = to_driver_selector(locator);
        if let Ok(Some(element)) = page.wait_for_selector(&selector, FALLBACK_WAIT_DEADLINE).await {
            return Ok(Resolution {
                element,
                strategy_used: locator.strategy,
                selector_used: selector,
                confidence: 0.75,
                attempted_alternatives: attempted,
            });
        }
    }

    // Fallback tier 2: fuzzy substring text match on individual target words.
    // Only binds interactive elements (spec §4.5 step 5(b); original
    // `accessibility_resolver.py:_try_fuzzy_match` l.381-383) — a <div> or
    // <span> that merely contains the word is not an actionable target.
    for word in target.to_lowercase().split_whitespace().filter(|w| w.len() >= 3) {
        let selector = format!("text=/{word}/i");
        if let Ok(Some(element)) = first_visible(page, &selector).await {
            let snapshot = match element.to_snapshot().await {
                Ok(snapshot) => snapshot,
                Err(_) => continue,
            };
            if !FUZZY_MATCH_TAGS.contains(&snapshot.tag_name.to_lowercase().as_str()) {
                continue;
            }
            return Ok(Resolution {
                element,
                strategy_used: LocatorStrategy::Text,
                selector_used: selector,
                confidence: 0.5,
                attempted_alternatives: attempted,
            });
        }
    }

    warn!(%target, %domain, attempts = attempted.len(), "all locator strategies exhausted");
    Err(WayfinderError::LocatorUnresolvable { step_id: step_id.to_string(), detail: format!("exhausted {} strategies", attempted.len()) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_driver::fixture::{FixtureElement, FixturePage};

    fn profile() -> SiteProfile {
        SiteProfile::new("example.com")
    }

    #[tokio::test]
    async fn exact_match_cache_short_circuits_strategy_order() {
        let page = FixturePage::new("https://example.com").with_element(FixtureElement::new("[data-testid=\"login-btn\"]", "button"));
        let tracker = PatternTracker::in_memory();
        tracker.record_success("example.com", "Login", LocatorStrategy::Testid, "[data-testid=\"login-btn\"]");

        let locators = vec![Locator::text("Login", false)];
        let resolution = resolve(&page, &locators, &profile(), "Login", "example.com", Some(&tracker), "step-1")
            .await
            .unwrap();
        assert_eq!(resolution.selector_used, "[data-testid=\"login-btn\"]");
        assert_eq!(resolution.confidence, 0.99);
    }

    #[tokio::test]
    async fn falls_back_through_strategy_chain_when_first_choice_absent() {
        let page = FixturePage::new("https://example.com").with_element(FixtureElement::new("text=Login", "button"));
        let locators = vec![Locator::new(LocatorStrategy::Testid, "missing"), Locator::text("Login", false)];
        let resolution = resolve(&page, &locators, &profile(), "Login", "example.com", None, "step-1")
            .await
            .unwrap();
        assert_eq!(resolution.strategy_used, LocatorStrategy::Text);
    }

    #[tokio::test]
    async fn fuzzy_fallback_rejects_non_interactive_tag() {
        let page = FixturePage::new("https://example.com").with_element(FixtureElement::new("text=/promo/i", "div"));
        let locators = vec![Locator::new(LocatorStrategy::Css, "#nope")];
        let err = resolve(&page, &locators, &profile(), "Promo banner", "example.com", None, "step-1")
            .await
            .unwrap_err();
        assert!(matches!(err, WayfinderError::LocatorUnresolvable { .. }));
    }

    #[tokio::test]
    async fn fuzzy_fallback_binds_interactive_tag() {
        let page = FixturePage::new("https://example.com").with_element(FixtureElement::new("text=/promo/i", "button"));
        let locators = vec![Locator::new(LocatorStrategy::Css, "#nope")];
        let resolution = resolve(&page, &locators, &profile(), "Promo banner", "example.com", None, "step-1")
            .await
            .unwrap();
        assert_eq!(resolution.strategy_used, LocatorStrategy::Text);
        assert_eq!(resolution.confidence, 0.5);
    }

    #[tokio::test]
    async fn no_matching_candidate_returns_locator_unresolvable() {
        let page = FixturePage::new("https://example.com");
        let locators = vec![Locator::new(LocatorStrategy::Css, "#nope")];
        let err = resolve(&page, &locators, &profile(), "Nothing", "example.com", None, "step-1")
            .await
            .unwrap_err();
        assert!(matches!(err, WayfinderError::LocatorUnresolvable { .. }));
    }
}
