//! Lightweight page-context extraction for the planning prompt (spec §4.4).
//!
//! Grounded on `original_source/engine/task_planner.py`'s
//! `TaskPlanner._get_page_context`: a single `page.evaluate()` call that
//! walks the interactive-element tags, dedupes by tag+text, and caps the
//! result, plus two density booleans the prompt uses to steer the model
//! toward `testid`/`aria` locators when the page actually carries them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wf_driver::Page;

/// Evaluated in-page; mirrors the reference implementation's inline script
/// line for line, translated to plain DOM APIs only.
pub const PAGE_CONTEXT_JS: &str = r#"() => {
    const elements = [];
    const seen = new Set();

    document.querySelectorAll(
        'button, a, input, select, textarea, [role="button"], [role="link"], [role="textbox"]'
    ).forEach(el => {
        if (el.offsetParent === null) return;

        const text = (el.textContent || '').trim().slice(0, 50);
        const key = el.tagName + ':' + text;
        if (seen.has(key)) return;
        seen.add(key);

        elements.push({
            tag: el.tagName.toLowerCase(),
            text: text,
            id: el.id || null,
            testid: el.dataset ? (el.dataset.testid || null) : null,
            role: el.getAttribute('role'),
            ariaLabel: el.getAttribute('aria-label'),
            placeholder: el.placeholder || null,
            type: el.type || null,
            name: el.name || null,
        });
    });

    return {
        elements: elements.slice(0, 50),
        hasTestIds: elements.some(e => e.testid),
        hasAriaLabels: elements.some(e => e.ariaLabel),
        formCount: document.forms.length,
    };
}"#;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementSummary {
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub testid: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "ariaLabel", default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(rename = "type", default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub elements: Vec<ElementSummary>,
    pub has_test_ids: bool,
    pub has_aria_labels: bool,
    pub form_count: u32,
}

/// Extract up to 50 visible interactive elements plus density signals.
/// A failed `evaluate()` (detached page, navigation mid-flight) degrades to
/// an empty context rather than failing the plan (spec §4.4 edge cases).
pub async fn extract(page: &dyn Page) -> PageContext {
    match page.evaluate(PAGE_CONTEXT_JS).await {
        Ok(value) => from_value(&value),
        Err(err) => {
            tracing::debug!(?err, "page context extraction failed, using empty context");
            PageContext::default()
        }
    }
}

fn from_value(value: &Value) -> PageContext {
    let elements: Vec<ElementSummary> = value
        .get("elements")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let has_test_ids = value.get("hasTestIds").and_then(Value::as_bool).unwrap_or(false);
    let has_aria_labels = value.get("hasAriaLabels").and_then(Value::as_bool).unwrap_or(false);
    let form_count = value.get("formCount").and_then(Value::as_u64).unwrap_or(0) as u32;
    PageContext { elements, has_test_ids, has_aria_labels, form_count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wf_driver::fixture::FixturePage;

    #[tokio::test]
    async fn extracts_elements_and_density_flags() {
        let page = FixturePage::new("https://example.com").with_evaluate_result(json!({
            "elements": [{"tag": "button", "text": "Login", "testid": "login-btn"}],
            "hasTestIds": true,
            "hasAriaLabels": false,
            "formCount": 1,
        }));
        let ctx = extract(&page).await;
        assert_eq!(ctx.elements.len(), 1);
        assert!(ctx.has_test_ids);
        assert!(!ctx.has_aria_labels);
    }

    #[tokio::test]
    async fn evaluate_failure_degrades_to_empty_context() {
        let page = FixturePage::new("https://example.com");
        let ctx = extract(&page).await;
        assert!(ctx.elements.is_empty());
    }
}
