//! Multi-signal pre/post validation per action type (spec §4.6).
//!
//! Grounded on `original_source/engine/step_validator.py`'s `StepValidator`:
//! pre-validation checks existence/visibility/enabled/overlay-accessibility,
//! post-validation branches by action and requires agreement across
//! multiple independent read-back methods rather than trusting the driver
//! call that performed the action.

use std::time::Duration;

use serde::Serialize;
use tracing::warn;
use wf_driver::{DriverError, Page};

/// One independent check and whether it passed.
pub type Method = (&'static str, bool);

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub success: bool,
    pub action: String,
    pub target: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub methods: Vec<(String, bool)>,
    pub message: String,
    pub retry_suggested: bool,
}

impl ValidationResult {
    fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            success: false,
            action: action.into(),
            target: target.into(),
            expected: None,
            actual: None,
            methods: Vec::new(),
            message: String::new(),
            retry_suggested: false,
        }
    }
}

/// Settle window between a click and reading post-click DOM state (spec §4.6).
const CLICK_SETTLE_WINDOW: Duration = Duration::from_millis(100);

pub struct StepValidator {
    strict: bool,
}

impl StepValidator {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict: strict_mode }
    }

    /// Element exists, is visible, is enabled, and (best-effort) is not
    /// covered by an overlay at its bounding-box center (spec §4.6
    /// Pre-validation).
    pub async fn pre_validate(&self, page: &dyn Page, selector: &str) -> ValidationResult {
        let mut methods: Vec<Method> = Vec::new();
        let mut result = ValidationResult::new("pre_validate", selector);

        let element = match page.query_selector(selector).await {
            Ok(element) => element,
            Err(err) => {
                warn!(?err, %selector, "pre-validation query_selector errored");
                result.message = err.to_string();
                result.retry_suggested = true;
                return result;
            }
        };
        let exists = element.is_some();
        methods.push(("exists", exists));

        let Some(element) = element else {
            result.message = format!("element not found: {selector}");
            result.retry_suggested = true;
            result.methods = into_owned(methods);
            return result;
        };

        let visible = element.is_visible().await.unwrap_or(false);
        methods.push(("visible", visible));
        let enabled = element.is_enabled().await.unwrap_or(false);
        methods.push(("enabled", enabled));

        let accessible = match element.to_snapshot().await {
            Ok(snapshot) => snapshot.bounding_box.is_some(),
            Err(_) => false,
        };
        methods.push(("accessible", accessible));

        let success = if self.strict {
            methods.iter().all(|(_, ok)| *ok)
        } else {
            methods[0].1 && methods[1].1
        };

        result.success = success;
        result.retry_suggested = !success;
        result.message = if success { "element ready".into() } else { "element not ready".into() };
        result.methods = into_owned(methods);
        result
    }

    /// Read the value back three independent ways and require at least two
    /// to agree with `expected` (spec §4.6: "Require at least two methods
    /// to match the expected value; empty-read with non-empty-expected is
    /// an immediate failure").
    pub async fn validate_fill(&self, page: &dyn Page, selector: &str, expected: &str) -> ValidationResult {
        let mut methods: Vec<(String, bool)> = Vec::new();
        let mut actual: Option<String> = None;

        if let Ok(Some(element)) = page.query_selector(selector).await {
            if let Ok(Some(value)) = element.get_attribute("value").await {
                methods.push(("driver_value".to_string(), value == expected));
                actual = Some(value);
            } else {
                methods.push(("driver_value".to_string(), false));
            }
        } else {
            methods.push(("driver_value".to_string(), false));
        }

        match dom_string(page, &format!("document.querySelector({sel})?.value || ''", sel = js_string(selector))).await {
            Ok(dom_value) => {
                methods.push(("dom_value".to_string(), dom_value == expected));
                if actual.is_none() {
                    actual = Some(dom_value);
                }
            }
            Err(err) => {
                warn!(?err, %selector, "dom_value read-back failed");
                methods.push(("dom_value".to_string(), false));
            }
        }

        if let Ok(attr_value) = dom_string(
            page,
            &format!("document.querySelector({sel})?.getAttribute('value') || ''", sel = js_string(selector)),
        )
        .await
        {
            methods.push(("attr_value".to_string(), attr_value == expected));
        }

        let passed = methods.iter().filter(|(_, ok)| *ok).count();
        let mut success = if methods.len() >= 2 { passed >= 2 } else { passed >= 1 };

        if !expected.is_empty() && actual.as_deref().map(str::trim).unwrap_or("").is_empty() {
            success = false;
        }

        ValidationResult {
            success,
            action: "fill".to_string(),
            target: selector.to_string(),
            expected: Some(expected.to_string()),
            actual: actual.clone(),
            methods,
            message: format!("value {}: expected='{expected}', actual='{}'", if success { "matches" } else { "mismatch" }, actual.unwrap_or_default()),
            retry_suggested: !success,
        }
    }

    /// Within [`CLICK_SETTLE_WINDOW`], require at least one of {URL changed,
    /// DOM hash changed, element state changed, element removed} (spec
    /// §4.6).
    pub async fn validate_click(&self, page: &dyn Page, selector: &str, url_before: &str, dom_hash_before: &str) -> ValidationResult {
        tokio::time::sleep(CLICK_SETTLE_WINDOW).await;

        let mut methods: Vec<(String, bool)> = Vec::new();

        let url_after = page.url();
        let url_changed = url_before != url_after;
        methods.push(("url_changed".to_string(), url_changed));

        let dom_hash_after = dom_hash(page).await;
        let dom_changed = dom_hash_before != dom_hash_after;
        methods.push(("dom_changed".to_string(), dom_changed));

        match page.query_selector(selector).await {
            Ok(Some(_)) => {
                let disabled = dom_bool(page, &format!("document.querySelector({sel})?.disabled === true", sel = js_string(selector))).await;
                let active = dom_bool(
                    page,
                    &format!(
                        "document.querySelector({sel})?.classList.contains('active') || document.querySelector({sel})?.classList.contains('selected')",
                        sel = js_string(selector)
                    ),
                )
                .await;
                methods.push(("state_changed".to_string(), disabled || active));
            }
            Ok(None) => methods.push(("element_removed".to_string(), true)),
            Err(_) => methods.push(("state_check".to_string(), false)),
        }

        let success = methods.iter().any(|(_, ok)| *ok);
        ValidationResult {
            success,
            action: "click".to_string(),
            target: selector.to_string(),
            expected: Some("state_change".to_string()),
            actual: Some(format!("url:{url_changed}, dom:{dom_changed}")),
            methods,
            message: if success { "click caused change".into() } else { "no visible change detected".into() },
            retry_suggested: !success,
        }
    }

    /// Exact match, else substring containment after stripping `www.` and a
    /// trailing slash, else domain match (spec §4.6).
    pub fn validate_navigate(&self, actual_url: &str, expected_url: &str) -> ValidationResult {
        let mut methods = Vec::new();

        let exact_match = actual_url == expected_url;
        methods.push(("exact_match".to_string(), exact_match));

        let normalize = |url: &str| url.to_lowercase().replace("www.", "").trim_end_matches('/').to_string();
        let normalized_expected = normalize(expected_url);
        let normalized_actual = normalize(actual_url);
        let contains = normalized_actual.contains(&normalized_expected) || normalized_expected.contains(&normalized_actual);
        methods.push(("contains".to_string(), contains));

        let domain_match = wf_core_types::domain_of(expected_url).replace("www.", "") == wf_core_types::domain_of(actual_url).replace("www.", "");
        methods.push(("domain_match".to_string(), domain_match));

        let success = methods.iter().any(|(_, ok)| *ok);
        ValidationResult {
            success,
            action: "navigate".to_string(),
            target: expected_url.to_string(),
            expected: Some(expected_url.to_string()),
            actual: Some(actual_url.to_string()),
            methods,
            message: if success { "navigation succeeded".into() } else { "navigation failed".into() },
            retry_suggested: !success,
        }
    }

    /// Selected value equals expected, or selected option text contains
    /// expected case-insensitively (spec §4.6).
    pub async fn validate_select(&self, page: &dyn Page, selector: &str, expected: &str) -> ValidationResult {
        let selected_value = dom_string(page, &format!("document.querySelector({sel})?.value || ''", sel = js_string(selector))).await.unwrap_or_default();
        let value_match = selected_value == expected;

        let selected_text = dom_string(
            page,
            &format!("document.querySelector({sel})?.selectedOptions[0]?.text || ''", sel = js_string(selector)),
        )
        .await
        .unwrap_or_default();
        let text_match = selected_text.to_lowercase().contains(&expected.to_lowercase());

        let success = value_match || text_match;
        ValidationResult {
            success,
            action: "select".to_string(),
            target: selector.to_string(),
            expected: Some(expected.to_string()),
            actual: Some(selected_value.clone()),
            methods: vec![("value_match".to_string(), value_match), ("text_match".to_string(), text_match)],
            message: if success { format!("selected: {selected_value}") } else { format!("expected {expected}, got {selected_value}") },
            retry_suggested: !success,
        }
    }
}

impl Default for StepValidator {
    fn default() -> Self {
        Self::new(true)
    }
}

fn into_owned(methods: Vec<Method>) -> Vec<(String, bool)> {
    methods.into_iter().map(|(name, ok)| (name.to_string(), ok)).collect()
}

fn js_string(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string())
}

async fn dom_string(page: &dyn Page, script: &str) -> Result<String, DriverError> {
    let value = page.evaluate(script).await?;
    Ok(value.as_str().map(str::to_string).unwrap_or_default())
}

async fn dom_bool(page: &dyn Page, script: &str) -> bool {
    page.evaluate(script).await.ok().and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Cheap DOM fingerprint: element counts plus a hash of the first 1000
/// characters of body text (spec §4.6 "DOM hash"). Exposed so callers can
/// capture the "before" snapshot ahead of an action, since `validate_click`
/// only has the opportunity to capture "after".
pub async fn dom_fingerprint(page: &dyn Page) -> String {
    dom_hash(page).await
}

async fn dom_hash(page: &dyn Page) -> String {
    let script = r#"(() => {
        const text = document.body ? document.body.innerText.slice(0, 1000) : '';
        return {
            links: document.querySelectorAll('a').length,
            buttons: document.querySelectorAll('button').length,
            inputs: document.querySelectorAll('input').length,
            text,
        };
    })()"#;
    let Ok(value) = page.evaluate(script).await else { return "unknown".to_string() };
    let links = value.get("links").and_then(|v| v.as_u64()).unwrap_or(0);
    let buttons = value.get("buttons").and_then(|v| v.as_u64()).unwrap_or(0);
    let inputs = value.get("inputs").and_then(|v| v.as_u64()).unwrap_or(0);
    let text = value.get("text").and_then(|v| v.as_str()).unwrap_or("");
    format!("{links}:{buttons}:{inputs}:{:x}", simple_hash(text))
}

fn simple_hash(text: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in text.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_driver::fixture::{FixtureElement, FixturePage};

    #[tokio::test]
    async fn pre_validate_fails_when_element_missing() {
        let page = FixturePage::new("https://example.test");
        let validator = StepValidator::new(true);
        let result = validator.pre_validate(&page, "#go").await;
        assert!(!result.success);
        assert!(result.retry_suggested);
    }

    #[tokio::test]
    async fn pre_validate_succeeds_for_visible_enabled_element_with_bounding_box() {
        let page = FixturePage::new("https://example.test")
            .with_element(FixtureElement::new("#go", "button").with_bounding_box(0.0, 0.0, 10.0, 10.0));
        let validator = StepValidator::new(true);
        let result = validator.pre_validate(&page, "#go").await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn validate_fill_fails_when_readback_is_empty() {
        let page = FixturePage::new("https://example.test").with_element(FixtureElement::new("#email", "input"));
        let validator = StepValidator::new(true);
        let result = validator.validate_fill(&page, "#email", "john@doe.com").await;
        assert!(!result.success);
    }

    #[test]
    fn validate_navigate_accepts_domain_match_after_redirect() {
        let validator = StepValidator::new(true);
        let result = validator.validate_navigate("https://www.saucedemo.com/inventory.html", "https://saucedemo.com");
        assert!(result.success);
    }
}
