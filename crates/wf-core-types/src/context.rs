//! [`RunContext`] — mutable run-scoped state (spec §3, §5).

use std::collections::HashMap;

use serde_json::Value;

use crate::result::StepResult;
use crate::RunId;

/// A DOM snapshot cached against the URL it was built for. Readers must
/// check the URL stamp themselves (spec §3 Invariant, §5 "DOM cache in Run
/// Context is invalidated on URL change — readers must check the cache's
/// URL stamp"); [`RunContext`] enforces invalidation on [`RunContext::navigate`].
#[derive(Debug, Clone)]
pub struct DomCacheEntry {
    pub url: String,
    pub built_at: chrono::DateTime<chrono::Utc>,
    pub index: Value,
}

/// Per-run mutable state: clipboard, variables, action history, and the
/// DOM-index cache. Owned by exactly one run; never shared (spec §5).
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    clipboard: HashMap<String, String>,
    variables: HashMap<String, String>,
    history: Vec<StepResult>,
    current_url: String,
    current_title: String,
    dom_cache: Option<DomCacheEntry>,
    /// Implicit flags set by Error Recovery and consumed by downstream
    /// components (`force_click`, `slow_type`, `re_resolve`), per
    /// `spec.md` §9 Open Questions: routed through `RunContext` so
    /// consumption is testable rather than left as undocumented globals.
    flags: HashMap<String, bool>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: RunId::new(),
            clipboard: HashMap::new(),
            variables: HashMap::new(),
            history: Vec::new(),
            current_url: String::new(),
            current_title: String::new(),
            dom_cache: None,
            flags: HashMap::new(),
        }
    }

    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn clipboard_get(&self, key: &str) -> Option<&String> {
        self.clipboard.get(key)
    }

    pub fn clipboard_set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.clipboard.insert(key.into(), value.into());
    }

    pub fn variable_get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    pub fn history(&self) -> &[StepResult] {
        &self.history
    }

    pub fn record(&mut self, result: StepResult) {
        self.history.push(result);
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn current_title(&self) -> &str {
        &self.current_title
    }

    /// Update the current URL, invalidating the DOM cache if it changed
    /// (spec §3 Invariant).
    pub fn navigate(&mut self, url: impl Into<String>, title: impl Into<String>) {
        let url = url.into();
        if url != self.current_url {
            self.dom_cache = None;
        }
        self.current_url = url;
        self.current_title = title.into();
    }

    pub fn cache_dom_index(&mut self, index: Value) {
        self.dom_cache = Some(DomCacheEntry {
            url: self.current_url.clone(),
            built_at: chrono::Utc::now(),
            index,
        });
    }

    /// Returns `None` if the cache is stale (built for a different URL) or
    /// absent, never a lagging snapshot (spec §8 "DOM-cache-URL never lags
    /// current-URL").
    pub fn dom_index(&self) -> Option<&Value> {
        match &self.dom_cache {
            Some(entry) if entry.url == self.current_url => Some(&entry.index),
            _ => None,
        }
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn take_flag(&mut self, name: &str) -> bool {
        self.flags.remove(name).unwrap_or(false)
    }

    /// Expand every `{{key}}` token in `template`, searching clipboard then
    /// variables then falling back to a `source.key` nested lookup against
    /// the clipboard (spec §3 "Template resolution"). Unresolved tokens are
    /// left untouched.
    pub fn resolve_template(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let key = after[..end].trim();
            let resolved = self.lookup(key);
            match resolved {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str("{{");
                    out.push_str(key);
                    out.push_str("}}");
                }
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }

    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(v) = self.clipboard.get(key) {
            return Some(v.clone());
        }
        if let Some(v) = self.variables.get(key) {
            return Some(v.clone());
        }
        if let Some((source, nested)) = key.split_once('.') {
            if source == "source" {
                if let Some(v) = self.clipboard.get(nested) {
                    return Some(v.clone());
                }
            }
        }
        None
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_cache_invalidated_on_url_change() {
        let mut ctx = RunContext::new();
        ctx.navigate("https://a.example", "A");
        ctx.cache_dom_index(serde_json::json!({"nodes": 1}));
        assert!(ctx.dom_index().is_some());

        ctx.navigate("https://b.example", "B");
        assert!(ctx.dom_index().is_none());
    }

    #[test]
    fn template_resolution_searches_clipboard_then_variables_then_nested() {
        let mut ctx = RunContext::new();
        ctx.clipboard_set("price", "19.99");
        let resolved = ctx.resolve_template("total: {{price}}");
        assert_eq!(resolved, "total: 19.99");

        ctx.clipboard_set("extracted_name", "Ada");
        let resolved = ctx.resolve_template("hello {{source.extracted_name}}");
        assert_eq!(resolved, "hello Ada");

        let resolved = ctx.resolve_template("missing {{nope}}");
        assert_eq!(resolved, "missing {{nope}}");
    }

    #[test]
    fn flags_round_trip() {
        let mut ctx = RunContext::new();
        assert!(!ctx.flag("force_click"));
        ctx.set_flag("force_click", true);
        assert!(ctx.flag("force_click"));
        assert!(ctx.take_flag("force_click"));
        assert!(!ctx.flag("force_click"));
    }
}
