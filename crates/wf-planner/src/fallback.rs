//! Rule-based fallback tokenizer, used only when the LLM call fails
//! outright or returns zero parseable steps (spec §4.4 edge cases).
//!
//! Grounded on `task_planner.py`'s `_parse_fallback_steps` /
//! `_parse_single_step` / `_create_default_step`, reimplemented with plain
//! `str` methods instead of `re`: no example repo in this workspace pulls
//! in a `regex` dependency, and this is a secondary code path, not the
//! primary planning strategy.

use wf_core_types::{ActionTag, Locator, LocatorStrategy, PlannedStep, StepId};

/// Split `goal` into clauses and parse each into a step, falling back to a
/// single default step if nothing recognizable is found.
pub fn parse_fallback_steps(goal: &str) -> Vec<PlannedStep> {
    let clauses = split_into_clauses(goal);
    let steps: Vec<PlannedStep> = clauses
        .iter()
        .enumerate()
        .filter_map(|(i, clause)| parse_single_step(i, clause))
        .collect();

    if steps.is_empty() {
        vec![default_step(goal)]
    } else {
        steps
    }
}

fn split_into_clauses(goal: &str) -> Vec<String> {
    if let Some(numbered) = split_numbered_list(goal) {
        return numbered;
    }
    let lines: Vec<&str> = goal.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.len() > 1 {
        return lines.into_iter().map(str::to_string).collect();
    }
    let parts: Vec<&str> = goal.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if parts.len() > 1 {
        return parts.into_iter().map(str::to_string).collect();
    }
    vec![goal.trim().to_string()]
}

/// Recognize a newline-separated numbered list ("1. do this\n2. do that").
/// Unlike the reference implementation's DOTALL regex, this only splits on
/// line boundaries; an inline numbered list on one line falls through to
/// the comma/single-clause paths below, which is an acceptable loss of
/// fidelity for a fallback path.
fn split_numbered_list(goal: &str) -> Option<Vec<String>> {
    let mut clauses = Vec::new();
    for line in goal.lines() {
        let trimmed = line.trim();
        let after_digits = trimmed.trim_start_matches(|c: char| c.is_ascii_digit());
        if after_digits.len() == trimmed.len() {
            continue;
        }
        let rest = after_digits.strip_prefix('.').or_else(|| after_digits.strip_prefix(')'))?;
        clauses.push(rest.trim().to_string());
    }
    (clauses.len() > 1).then_some(clauses)
}

fn parse_single_step(index: usize, text: &str) -> Option<PlannedStep> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();

    for prefix in ["go to ", "navigate to ", "open "] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let rest = rest.trim();
            let url = if rest.starts_with("http") { rest.to_string() } else { format!("https://{rest}") };
            return Some(PlannedStep {
                id: StepId::from_index(index),
                action: ActionTag::Navigate,
                target: url.clone(),
                value: Some(url),
                locators: Vec::new(),
                wait_after: None,
                optional: false,
            });
        }
    }

    for action_word in ["enter ", "fill ", "type ", "input "] {
        if let Some(rest) = lower.strip_prefix(action_word) {
            if let Some((value, target)) = split_fill_clause(rest) {
                return Some(fill_step(index, &target, &value));
            }
        }
    }

    if let Some(rest) = lower.strip_prefix("click") {
        let target = rest.trim_start_matches(" on").trim_start_matches(" the").trim();
        let target = if target.is_empty() { text } else { target };
        return Some(PlannedStep {
            id: StepId::from_index(index),
            action: ActionTag::Click,
            target: target.to_string(),
            value: None,
            locators: vec![Locator::role("button", target), Locator::text(target, false)],
            wait_after: None,
            optional: false,
        });
    }

    if lower.starts_with("wait") {
        return Some(PlannedStep {
            id: StepId::from_index(index),
            action: ActionTag::Wait,
            target: text.to_string(),
            value: Some("2".to_string()),
            locators: Vec::new(),
            wait_after: None,
            optional: false,
        });
    }

    if lower.contains("scroll") {
        let direction = if lower.contains("down") { "down" } else { "up" };
        return Some(PlannedStep {
            id: StepId::from_index(index),
            action: ActionTag::Scroll,
            target: direction.to_string(),
            value: None,
            locators: Vec::new(),
            wait_after: None,
            optional: false,
        });
    }

    Some(PlannedStep {
        id: StepId::from_index(index),
        action: ActionTag::Click,
        target: text.to_string(),
        value: None,
        locators: vec![Locator::text(text, false)],
        wait_after: None,
        optional: false,
    })
}

/// Split `"<value> in/into/to <target>"` into `(value, target)`, searching
/// left to right for the first separator the way the reference
/// implementation's single combined regex effectively does.
fn split_fill_clause(rest: &str) -> Option<(String, String)> {
    for sep in [" into ", " in ", " to "] {
        if let Some((value, target)) = rest.split_once(sep) {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            let target = target.trim().trim_start_matches("the ").trim();
            if !value.is_empty() && !target.is_empty() {
                return Some((value.to_string(), target.to_string()));
            }
        }
    }
    None
}

fn fill_step(index: usize, target: &str, value: &str) -> PlannedStep {
    PlannedStep {
        id: StepId::from_index(index),
        action: ActionTag::Fill,
        target: target.to_string(),
        value: Some(value.to_string()),
        locators: vec![
            Locator::new(LocatorStrategy::Label, target),
            Locator::new(LocatorStrategy::Placeholder, target),
            Locator::text(target, false),
        ],
        wait_after: None,
        optional: false,
    }
}

fn default_step(goal: &str) -> PlannedStep {
    let truncated: String = goal.chars().take(50).collect();
    PlannedStep {
        id: StepId::from_index(0),
        action: ActionTag::Click,
        target: truncated.clone(),
        value: None,
        locators: vec![Locator::text(truncated, false)],
        wait_after: None,
        optional: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_goal_into_multiple_steps() {
        let steps = parse_fallback_steps("go to saucedemo, enter john in username, click login");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].action, ActionTag::Navigate);
        assert_eq!(steps[1].action, ActionTag::Fill);
        assert_eq!(steps[2].action, ActionTag::Click);
    }

    #[test]
    fn parses_newline_separated_numbered_list() {
        let steps = parse_fallback_steps("1. go to saucedemo\n2. click login");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].target, "https://saucedemo");
    }

    #[test]
    fn unrecognizable_goal_becomes_single_default_step() {
        let steps = parse_fallback_steps("blorp zonk flibbertigibbet");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, ActionTag::Click);
    }

    #[test]
    fn fill_clause_extracts_value_and_target() {
        let steps = parse_fallback_steps("enter secret123 into the password field");
        assert_eq!(steps[0].action, ActionTag::Fill);
        assert_eq!(steps[0].value.as_deref(), Some("secret123"));
        assert_eq!(steps[0].target, "password field");
    }
}
