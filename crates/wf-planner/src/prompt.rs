//! The planning prompt template (spec §4.4), adapted from
//! `original_source/engine/task_planner.py`'s `PLANNING_PROMPT`.
//!
//! Built with plain string concatenation rather than a templating crate:
//! the reference prompt's `{{ }}` JSON example would otherwise have to be
//! escaped against Rust's own `format!` brace syntax, so the static parts
//! are written verbatim and only the four variable slots are substituted.

use crate::snapshot::PageContext;

const MAX_PROMPT_ELEMENTS: usize = 25;

pub fn build(url: &str, title: &str, goal: &str, context: &PageContext) -> String {
    let elements: Vec<_> = context.elements.iter().take(MAX_PROMPT_ELEMENTS).collect();
    let elements_json = serde_json::to_string_pretty(&elements).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = String::new();
    prompt.push_str("You are a browser automation planner. Create a precise execution plan.\n\n");
    prompt.push_str("## Current Page Context\n");
    prompt.push_str(&format!("URL: {url}\n"));
    prompt.push_str(&format!("Title: {title}\n"));
    prompt.push_str(&format!("Interactive Elements: {elements_json}\n\n"));
    prompt.push_str("## User Goal\n");
    prompt.push_str(goal);
    prompt.push_str("\n\n");
    prompt.push_str("## Instructions\n");
    prompt.push_str("Create steps to achieve the goal. For EACH step, provide:\n");
    prompt.push_str("1. action: navigate|click|fill|type|select|scroll|wait|press_key|hover|extract\n");
    prompt.push_str(
        "2. target: For \"navigate\" action, this MUST be a full URL starting with https:// \
         (e.g., \"https://www.example.com\"). For other actions, use a human-readable description.\n",
    );
    prompt.push_str("3. locators: MULTIPLE ways to find the element (in priority order):\n");
    prompt.push_str("   - testid: data-testid attribute value (if likely exists)\n");
    prompt.push_str("   - role: ARIA role (button, link, textbox, etc.) with name\n");
    prompt.push_str("   - label: Associated label text (for form inputs)\n");
    prompt.push_str("   - placeholder: Placeholder text (for inputs)\n");
    prompt.push_str("   - text: Exact visible text\n");
    prompt.push_str("   - css: CSS selector\n");
    prompt.push_str("4. value: For fill/type actions, and also for navigate actions (the URL)\n");
    prompt.push_str("5. wait_after: navigation|network_idle|selector:XXX|time:XXX (optional)\n\n");
    prompt.push_str(
        "IMPORTANT: For navigate actions, \"target\" and \"value\" MUST be actual URLs like \
         \"https://www.saucedemo.com\", NOT descriptions.\n\n",
    );
    prompt.push_str("## Response Format (JSON only)\n");
    prompt.push_str(
        r#"{
  "steps": [
    {
      "action": "navigate",
      "target": "https://www.saucedemo.com",
      "locators": [],
      "value": "https://www.saucedemo.com",
      "wait_after": "navigation"
    },
    {
      "action": "fill",
      "target": "Username field",
      "locators": [
        {"type": "testid", "value": "username"},
        {"type": "label", "value": "Username"},
        {"type": "placeholder", "value": "Enter username"}
      ],
      "value": "john_doe"
    },
    {
      "action": "click",
      "target": "Login button",
      "locators": [
        {"type": "testid", "value": "login-btn"},
        {"type": "role", "value": "button", "name": "Login"},
        {"type": "text", "value": "Login"}
      ],
      "wait_after": "navigation"
    }
  ],
  "framework_hints": ["react"],
  "recommended_strategy": "testid"
}
"#,
    );
    prompt.push_str("\nOnly output valid JSON. No markdown, no explanation.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_goal_and_url_verbatim() {
        let prompt = build("https://example.com", "Example", "Log in as john", &PageContext::default());
        assert!(prompt.contains("https://example.com"));
        assert!(prompt.contains("Log in as john"));
        assert!(prompt.contains("\"action\": \"navigate\""));
    }
}
