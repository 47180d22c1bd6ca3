//! Graduated, non-LLM error recovery ladder (spec §4.7).
//!
//! Grounded on `original_source/engine/error_recovery.py`'s `ErrorRecovery`:
//! substring classification into a closed taxonomy, a per-kind graduated
//! ladder indexed by attempt number, a capped per-(step, kind) attempt
//! counter, and a shared overlay-dismiss routine with an Escape-key last
//! resort.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};
use wf_core_types::RunContext;
use wf_driver::{Page, WaitUntil};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ElementNotFound,
    ElementNotVisible,
    ElementNotClickable,
    ElementDetached,
    Timeout,
    NavigationFailed,
    FillFailed,
    NetworkError,
    Unknown,
}

impl ErrorKind {
    fn name(&self) -> &'static str {
        match self {
            ErrorKind::ElementNotFound => "element_not_found",
            ErrorKind::ElementNotVisible => "element_not_visible",
            ErrorKind::ElementNotClickable => "element_not_clickable",
            ErrorKind::ElementDetached => "element_detached",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NavigationFailed => "navigation_failed",
            ErrorKind::FillFailed => "fill_failed",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

const PATTERNS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::ElementNotFound,
        &["could not find", "no element matching", "element not found", "locator resolved to", "waiting for selector"],
    ),
    (ErrorKind::ElementNotVisible, &["not visible", "hidden", "display: none", "visibility: hidden", "zero-size"]),
    (ErrorKind::ElementNotClickable, &["not clickable", "intercepted", "covered by", "pointer-events: none"]),
    (ErrorKind::ElementDetached, &["detached", "removed from document", "stale element"]),
    (ErrorKind::Timeout, &["timeout", "timed out", "deadline exceeded"]),
    (ErrorKind::NavigationFailed, &["navigation failed", "net::", "err_", "connection refused"]),
    (ErrorKind::FillFailed, &["fill failed", "cannot type", "readonly", "disabled"]),
    (ErrorKind::NetworkError, &["network error", "fetch failed", "connection reset"]),
];

/// Classify a driver/validation error message into the recovery taxonomy
/// (spec §4.7).
pub fn classify_error(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    for (kind, patterns) in PATTERNS {
        if patterns.iter().any(|pattern| lower.contains(pattern)) {
            return *kind;
        }
    }
    ErrorKind::Unknown
}

/// Cookie-consent/modal/popup close-button selectors tried, in order,
/// before falling back to Escape (spec §10 Supplemented Features).
const OVERLAY_SELECTORS: &[&str] = &[
    "button:has-text(\"Accept\")",
    "button:has-text(\"Accept All\")",
    "button:has-text(\"Got it\")",
    "[aria-label=\"Close\"]",
    "[aria-label=\"Dismiss\"]",
    ".modal-close",
    ".close-button",
    "[data-dismiss=\"modal\"]",
    "button.close",
    ".popup-close",
    ".overlay-close",
];

#[derive(Debug, Clone)]
pub struct RecoveryDecision {
    pub took_action: bool,
    pub should_retry: bool,
    pub new_timeout_ms: Option<u64>,
    pub action_taken: String,
    pub message: String,
}

impl RecoveryDecision {
    fn exhausted(kind: ErrorKind, attempts: u32) -> Self {
        Self {
            took_action: false,
            should_retry: false,
            new_timeout_ms: None,
            action_taken: "max_attempts_exceeded".to_string(),
            message: format!("max recovery attempts ({attempts}) exceeded for {}", kind.name()),
        }
    }
}

/// What the current recovery decision needs to know about the step in
/// progress (spec §4.7 contract's `context` bag, made explicit per
/// REDESIGN FLAGS §9).
pub struct RecoveryRequest<'a> {
    pub step_id: &'a str,
    pub selector: Option<&'a str>,
    pub current_timeout_ms: u64,
}

pub struct ErrorRecovery {
    max_attempts: u32,
    attempt_counts: Mutex<HashMap<String, u32>>,
}

impl ErrorRecovery {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts, attempt_counts: Mutex::new(HashMap::new()) }
    }

    /// Classify `error_message`, bump the per-(step, kind) attempt counter,
    /// and dispatch to the matching ladder rung (spec §4.7).
    pub async fn recover(&self, error_message: &str, page: &dyn Page, ctx: &mut RunContext, request: RecoveryRequest<'_>) -> RecoveryDecision {
        let kind = classify_error(error_message);
        let attempt_key = format!("{}:{}", request.step_id, kind.name());
        let attempt = {
            let mut counts = self.attempt_counts.lock();
            let entry = counts.entry(attempt_key).or_insert(0);
            *entry += 1;
            *entry
        };

        if attempt > self.max_attempts {
            return RecoveryDecision::exhausted(kind, self.max_attempts);
        }

        info!(attempt, max = self.max_attempts, kind = kind.name(), "attempting error recovery");

        match kind {
            ErrorKind::ElementNotFound => self.recover_not_found(page, attempt).await,
            ErrorKind::ElementNotVisible => self.recover_not_visible(page, request.selector, attempt).await,
            ErrorKind::ElementNotClickable => self.recover_not_clickable(page, ctx, attempt).await,
            ErrorKind::ElementDetached => self.recover_detached(ctx, attempt).await,
            ErrorKind::Timeout => self.recover_timeout(page, request.current_timeout_ms, attempt).await,
            ErrorKind::NavigationFailed => self.recover_navigation_failed(page, attempt).await,
            ErrorKind::FillFailed => self.recover_fill_failed(page, ctx, request.selector, attempt).await,
            ErrorKind::NetworkError | ErrorKind::Unknown => self.recover_generic(attempt).await,
        }
    }

    async fn recover_not_found(&self, page: &dyn Page, attempt: u32) -> RecoveryDecision {
        match attempt {
            1 => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                action("wait_short", true, "waited 500ms for element to appear")
            }
            2 => {
                let _ = page.evaluate("window.scrollBy(0, 300)").await;
                tokio::time::sleep(Duration::from_millis(300)).await;
                action("scroll_down", true, "scrolled down to expose element")
            }
            _ => {
                if dismiss_overlays(page).await {
                    action("dismiss_overlays", true, "dismissed overlay/modal")
                } else {
                    RecoveryDecision { took_action: false, should_retry: false, new_timeout_ms: None, action_taken: "none".to_string(), message: "no more recovery options".to_string() }
                }
            }
        }
    }

    async fn recover_not_visible(&self, page: &dyn Page, selector: Option<&str>, attempt: u32) -> RecoveryDecision {
        if attempt == 1 {
            if let Some(selector) = selector {
                if let Ok(Some(element)) = page.query_selector(selector).await {
                    let _ = element.scroll_into_view().await;
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    return action("scroll_into_view", true, "scrolled element into view");
                }
            }
        } else if attempt == 2 {
            let dismissed = dismiss_overlays(page).await;
            return RecoveryDecision {
                took_action: dismissed,
                should_retry: dismissed,
                new_timeout_ms: None,
                action_taken: if dismissed { "dismiss_overlays".to_string() } else { "none".to_string() },
                message: if dismissed { "dismissed overlay".to_string() } else { "no overlay found".to_string() },
            };
        }
        RecoveryDecision { took_action: false, should_retry: false, new_timeout_ms: None, action_taken: "none".to_string(), message: String::new() }
    }

    async fn recover_not_clickable(&self, page: &dyn Page, ctx: &mut RunContext, attempt: u32) -> RecoveryDecision {
        if attempt == 1 {
            tokio::time::sleep(Duration::from_millis(300)).await;
            return action("wait_animation", true, "waited for animation");
        }
        if attempt == 2 && dismiss_overlays(page).await {
            return action("dismiss_overlays", true, "dismissed overlay/modal");
        }
        ctx.set_flag("force_click", true);
        action("enable_force_click", true, "enabled force click option")
    }

    async fn recover_detached(&self, ctx: &mut RunContext, _attempt: u32) -> RecoveryDecision {
        ctx.set_flag("re_resolve", true);
        tokio::time::sleep(Duration::from_millis(200)).await;
        action("re_resolve_selector", true, "flagged for selector re-resolution")
    }

    async fn recover_timeout(&self, page: &dyn Page, current_timeout_ms: u64, attempt: u32) -> RecoveryDecision {
        if attempt == 1 {
            let new_timeout = (current_timeout_ms * 2).min(30_000);
            return RecoveryDecision {
                took_action: true,
                should_retry: true,
                new_timeout_ms: Some(new_timeout),
                action_taken: "extend_timeout".to_string(),
                message: format!("extended timeout to {new_timeout}ms"),
            };
        }
        if attempt == 2 && page.wait_for_load_state(WaitUntil::NetworkIdle, Duration::from_millis(5000)).await.is_ok() {
            return action("wait_network_idle", true, "waited for network idle");
        }
        RecoveryDecision { took_action: false, should_retry: false, new_timeout_ms: None, action_taken: "none".to_string(), message: "timeout recovery exhausted".to_string() }
    }

    async fn recover_navigation_failed(&self, page: &dyn Page, attempt: u32) -> RecoveryDecision {
        if attempt == 1 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            return action("wait_and_retry", true, "waiting 1s before retry");
        }
        if attempt == 2 && page.go_back().await.is_ok() {
            tokio::time::sleep(Duration::from_millis(500)).await;
            return action("go_back", true, "navigated back, will retry");
        }
        RecoveryDecision { took_action: false, should_retry: false, new_timeout_ms: None, action_taken: "none".to_string(), message: String::new() }
    }

    async fn recover_fill_failed(&self, page: &dyn Page, ctx: &mut RunContext, selector: Option<&str>, attempt: u32) -> RecoveryDecision {
        if attempt == 1 {
            if let Some(selector) = selector {
                if let Ok(Some(element)) = page.query_selector(selector).await {
                    if element.fill("").await.is_ok() {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        return action("clear_field", true, "cleared field before retry");
                    }
                }
            }
        } else if attempt == 2 {
            if let Some(selector) = selector {
                if let Ok(Some(element)) = page.query_selector(selector).await {
                    if element.click().await.is_ok() {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        return action("click_to_focus", true, "clicked to focus before retry");
                    }
                }
            }
        }
        ctx.set_flag("slow_type", true);
        action("enable_slow_type", true, "enabled character-by-character typing")
    }

    async fn recover_generic(&self, attempt: u32) -> RecoveryDecision {
        let wait = Duration::from_millis(500 * u64::from(attempt));
        tokio::time::sleep(wait).await;
        RecoveryDecision {
            took_action: true,
            should_retry: attempt < self.max_attempts,
            new_timeout_ms: None,
            action_taken: format!("wait_{}ms", wait.as_millis()),
            message: format!("generic recovery: waited {}ms", wait.as_millis()),
        }
    }

    /// Reset attempt counters for `step_id`, or all counters if `None`
    /// (spec §10 Supplemented Features — test isolation / operator control).
    pub fn reset_attempts(&self, step_id: Option<&str>) {
        let mut counts = self.attempt_counts.lock();
        match step_id {
            Some(step_id) => counts.retain(|key, _| !key.starts_with(&format!("{step_id}:"))),
            None => counts.clear(),
        }
    }
}

impl Default for ErrorRecovery {
    fn default() -> Self {
        Self::new(3)
    }
}

fn action(name: &str, took_action: bool, message: &str) -> RecoveryDecision {
    RecoveryDecision { took_action, should_retry: took_action, new_timeout_ms: None, action_taken: name.to_string(), message: message.to_string() }
}

async fn dismiss_overlays(page: &dyn Page) -> bool {
    for selector in OVERLAY_SELECTORS {
        if let Ok(Some(element)) = page.query_selector(selector).await {
            if element.is_visible().await.unwrap_or(false) && element.click().await.is_ok() {
                tokio::time::sleep(Duration::from_millis(300)).await;
                info!(%selector, "dismissed overlay");
                return true;
            }
        }
    }
    match page.press_key("Escape").await {
        Ok(()) => {
            tokio::time::sleep(Duration::from_millis(200)).await;
            true
        }
        Err(err) => {
            warn!(?err, "escape fallback failed to dismiss overlay");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_driver::fixture::{FixtureElement, FixturePage};

    #[test]
    fn classifies_detached_element_message() {
        assert_eq!(classify_error("Stale element reference"), ErrorKind::ElementDetached);
        assert_eq!(classify_error("connection refused"), ErrorKind::NavigationFailed);
        assert_eq!(classify_error("something weird"), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn not_found_ladder_escalates_then_dismisses_overlay() {
        let page = FixturePage::new("https://example.test").with_element(
            FixtureElement::new("[aria-label=\"Close\"]", "button").with_text("x"),
        );
        let recovery = ErrorRecovery::new(3);
        let mut ctx = RunContext::new();

        let first = recovery
            .recover("element not found", &page, &mut ctx, RecoveryRequest { step_id: "step-1", selector: None, current_timeout_ms: 2000 })
            .await;
        assert_eq!(first.action_taken, "wait_short");

        let second = recovery
            .recover("element not found", &page, &mut ctx, RecoveryRequest { step_id: "step-1", selector: None, current_timeout_ms: 2000 })
            .await;
        assert_eq!(second.action_taken, "scroll_down");

        let third = recovery
            .recover("element not found", &page, &mut ctx, RecoveryRequest { step_id: "step-1", selector: None, current_timeout_ms: 2000 })
            .await;
        assert_eq!(third.action_taken, "dismiss_overlays");
        assert!(page.click_count().await >= 1);
    }

    #[tokio::test]
    async fn attempts_beyond_cap_are_exhausted() {
        let page = FixturePage::new("https://example.test");
        let recovery = ErrorRecovery::new(1);
        let mut ctx = RunContext::new();
        let request = || RecoveryRequest { step_id: "step-1", selector: None, current_timeout_ms: 1000 };

        let _ = recovery.recover("timeout", &page, &mut ctx, request()).await;
        let second = recovery.recover("timeout", &page, &mut ctx, request()).await;
        assert!(!second.should_retry);
        assert_eq!(second.action_taken, "max_attempts_exceeded");
    }

    #[tokio::test]
    async fn detached_element_sets_re_resolve_flag() {
        let page = FixturePage::new("https://example.test");
        let recovery = ErrorRecovery::new(3);
        let mut ctx = RunContext::new();
        recovery.recover("stale element", &page, &mut ctx, RecoveryRequest { step_id: "step-1", selector: None, current_timeout_ms: 1000 }).await;
        assert!(ctx.flag("re_resolve"));
    }
}
