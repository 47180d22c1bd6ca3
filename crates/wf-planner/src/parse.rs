//! LLM response parsing and `PlannedStep` construction (spec §4.4).
//!
//! Grounded on `task_planner.py`'s `_parse_response` (markdown-fence
//! stripping) and `_build_step` (action/locator coercion, navigate-target
//! normalization, the per-step default-locator fallback).

use serde_json::Value;
use wf_core_types::{ActionTag, ExecutionPlan, Locator, LocatorStrategy, PlannedStep, StepId, TopLevelStrategy, WaitAfter};

/// Strip a single wrapping ```json or ``` fence, then parse as JSON.
/// Falls back to an empty step list on malformed JSON rather than erroring,
/// since the caller always has the rule-based tokenizer as a backstop.
pub fn parse_response(content: &str) -> Value {
    let content = content.trim();

    let unfenced = if let Some(start) = content.find("```json") {
        let body_start = start + "```json".len();
        match content[body_start..].find("```") {
            Some(end) => &content[body_start..body_start + end],
            None => &content[body_start..],
        }
    } else if let Some(start) = content.find("```") {
        let body_start = start + "```".len();
        match content[body_start..].find("```") {
            Some(end) => &content[body_start..body_start + end],
            None => &content[body_start..],
        }
    } else {
        content
    };

    let unfenced = strip_trailing_commas(unfenced.trim());

    match serde_json::from_str(&unfenced) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(?err, "failed to parse planner response as JSON");
            serde_json::json!({ "steps": [] })
        }
    }
}

/// Drop a comma that precedes (ignoring whitespace) a closing `]`/`}`,
/// outside of string literals. LLM output routinely includes trailing
/// commas that `serde_json`'s strict parser rejects (spec §4.4, §8
/// boundary property: "Planner JSON with trailing commas ... parses
/// successfully").
fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == ']' || chars[j] == '}') {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

pub fn build_plan(goal: &str, data: &Value) -> ExecutionPlan {
    let steps: Vec<PlannedStep> = data
        .get("steps")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().enumerate().filter_map(|(i, s)| build_step(i, s)).collect())
        .unwrap_or_default();

    let mut plan = ExecutionPlan::new(steps);
    plan.framework_hint = data
        .get("framework_hints")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(Value::as_str)
        .map(str::to_string);
    plan.recommended_strategy = data
        .get("recommended_strategy")
        .and_then(Value::as_str)
        .and_then(strategy_from_name);

    if plan.is_empty() {
        tracing::warn!(%goal, "planner returned no valid steps");
    }
    plan
}

fn strategy_from_name(name: &str) -> Option<TopLevelStrategy> {
    match name {
        "testid" => Some(TopLevelStrategy::AccessibilityFirst),
        "css" => Some(TopLevelStrategy::CssFirst),
        "text" => Some(TopLevelStrategy::TextOnly),
        _ => None,
    }
}

fn build_step(index: usize, data: &Value) -> Option<PlannedStep> {
    let action_str = data.get("action").and_then(Value::as_str).unwrap_or("").to_lowercase();
    let action = action_from_name(&action_str).unwrap_or_else(|| {
        tracing::warn!(action = %action_str, "unknown action type, defaulting to click");
        ActionTag::Click
    });

    let mut target = data.get("target").and_then(Value::as_str).unwrap_or("").to_string();
    let mut value = data.get("value").and_then(Value::as_str).map(str::to_string);

    if action == ActionTag::Navigate {
        let (norm_target, norm_value) = normalize_navigate(&target, value.as_deref());
        target = norm_target;
        value = Some(norm_value);
    }

    let mut locators: Vec<Locator> = data
        .get("locators")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(locator_from_value).collect())
        .unwrap_or_default();

    if locators.is_empty() && action != ActionTag::Navigate {
        locators.push(Locator::text(target.clone(), false));
    }

    let wait_after = data.get("wait_after").and_then(Value::as_str).and_then(wait_after_from_str);

    if action == ActionTag::Extract && value.is_none() {
        value = Some(target.clone());
    }

    Some(PlannedStep {
        id: StepId::from_index(index),
        action,
        target,
        value,
        locators,
        wait_after,
        optional: data.get("optional").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn action_from_name(name: &str) -> Option<ActionTag> {
    match name {
        "navigate" => Some(ActionTag::Navigate),
        "click" => Some(ActionTag::Click),
        "fill" => Some(ActionTag::Fill),
        "type" => Some(ActionTag::Type),
        "select" => Some(ActionTag::Select),
        "scroll" => Some(ActionTag::Scroll),
        "wait" => Some(ActionTag::Wait),
        "press_key" => Some(ActionTag::PressKey),
        "hover" => Some(ActionTag::Hover),
        "extract" => Some(ActionTag::Extract),
        _ => None,
    }
}

fn locator_from_value(value: &Value) -> Option<Locator> {
    let strategy = LocatorStrategy::from_name(value.get("type").and_then(Value::as_str).unwrap_or("text"))?;
    let locator_value = value.get("value").and_then(Value::as_str).unwrap_or("").to_string();
    Some(Locator {
        strategy,
        value: locator_value,
        accessible_name: value.get("name").and_then(Value::as_str).map(str::to_string),
        exact: value.get("exact").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn wait_after_from_str(raw: &str) -> Option<WaitAfter> {
    if raw == "navigation" {
        return Some(WaitAfter::Load);
    }
    if raw == "network_idle" {
        return Some(WaitAfter::NetworkIdle);
    }
    if let Some(selector) = raw.strip_prefix("selector:") {
        return Some(WaitAfter::Selector { locator: Locator::new(LocatorStrategy::Css, selector) });
    }
    if let Some(seconds) = raw.strip_prefix("time:") {
        let seconds: u64 = seconds.trim().parse().ok()?;
        return Some(WaitAfter::Millis { ms: seconds * 1000 });
    }
    None
}

/// Coerce a navigate step's `target`/`value` into an absolute URL (spec §8
/// boundary example: "Go to saucedemo" -> `https://www.saucedemo.com`).
///
/// Mirrors `task_planner.py`'s `_build_step` navigate branch: prefer an
/// already-URL-shaped `value`, then look for a domain-like token in the
/// target, then fall back to a small fixed keyword table, in that order.
pub fn normalize_navigate(target: &str, value: Option<&str>) -> (String, String) {
    if let Some(value) = value {
        if value.starts_with("http://") || value.starts_with("https://") {
            return (value.to_string(), value.to_string());
        }
    }
    if target.starts_with("http://") || target.starts_with("https://") {
        return (target.to_string(), target.to_string());
    }

    let lowered = target.to_lowercase();
    if let Some(domain) = extract_domain_like(&lowered) {
        let url = format!("https://{domain}");
        return (url.clone(), url);
    }

    let url = guess_known_site(&lowered).unwrap_or_else(|| {
        tracing::warn!(%target, "navigate target is not a valid URL and matched no known site");
        target.to_string()
    });
    (url.clone(), url)
}

/// Find the first `word(.word)+` token in `text` without a regex
/// dependency (no example repo in this workspace pulls in `regex`).
fn extract_domain_like(text: &str) -> Option<String> {
    for token in text.split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '-')) {
        if token.is_empty() || !token.contains('.') {
            continue;
        }
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() >= 2 && parts.iter().all(|p| !p.is_empty()) {
            return Some(token.trim_matches('.').to_string());
        }
    }
    None
}

fn guess_known_site(target_lower: &str) -> Option<String> {
    const KNOWN_SITES: &[(&str, &str)] = &[("saucedemo", "https://www.saucedemo.com"), ("google", "https://www.google.com")];
    KNOWN_SITES
        .iter()
        .find(|(keyword, _)| target_lower.contains(keyword))
        .map(|(_, url)| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_markdown_fence() {
        let content = "```json\n{\"steps\": []}\n```";
        let value = parse_response(content);
        assert_eq!(value.get("steps").and_then(Value::as_array).map(Vec::len), Some(0));
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let content = r#"{"steps": [{"action": "click", "target": "Login",},],}"#;
        let value = parse_response(content);
        assert_eq!(value.get("steps").and_then(Value::as_array).map(Vec::len), Some(1));
    }

    #[test]
    fn trailing_comma_inside_a_string_value_is_preserved() {
        let content = r#"{"steps": [{"action": "fill", "target": "a, b,", "value": "x,"}]}"#;
        let value = parse_response(content);
        let target = value["steps"][0]["target"].as_str().unwrap();
        assert_eq!(target, "a, b,");
    }

    #[test]
    fn malformed_json_degrades_to_empty_steps() {
        let value = parse_response("not json at all");
        assert_eq!(value.get("steps").and_then(Value::as_array).map(Vec::len), Some(0));
    }

    #[test]
    fn navigate_prefers_url_shaped_value_over_target() {
        let (target, value) = normalize_navigate("Saucedemo site", Some("https://www.saucedemo.com"));
        assert_eq!(target, "https://www.saucedemo.com");
        assert_eq!(value, "https://www.saucedemo.com");
    }

    #[test]
    fn navigate_extracts_domain_like_token_from_target() {
        let (target, _) = normalize_navigate("go to shop.example.com please", None);
        assert_eq!(target, "https://shop.example.com");
    }

    #[test]
    fn navigate_falls_back_to_known_site_keyword() {
        let (target, value) = normalize_navigate("the saucedemo store", None);
        assert_eq!(target, "https://www.saucedemo.com");
        assert_eq!(value, "https://www.saucedemo.com");
    }

    #[test]
    fn build_step_defaults_missing_locators_to_text_match() {
        let data = serde_json::json!({"action": "click", "target": "Login button", "locators": []});
        let step = build_step(0, &data).unwrap();
        assert_eq!(step.locators.len(), 1);
        assert_eq!(step.locators[0].strategy, LocatorStrategy::Text);
    }

    #[test]
    fn wait_after_parses_selector_directive() {
        assert_eq!(
            wait_after_from_str("selector:.spinner-done"),
            Some(WaitAfter::Selector { locator: Locator::new(LocatorStrategy::Css, ".spinner-done") })
        );
        assert_eq!(wait_after_from_str("time:2"), Some(WaitAfter::Millis { ms: 2000 }));
    }
}
