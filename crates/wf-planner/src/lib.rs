//! Single-call LLM task planner (spec §4.4).
//!
//! Grounded on `original_source/engine/task_planner.py`'s `TaskPlanner`:
//! one LLM call produces a complete [`ExecutionPlan`] with multiple
//! locator strategies per step, instead of the regex-only
//! `InstructionParser` it replaced. The regex tokenizer survives here only
//! as [`fallback::parse_fallback_steps`], invoked when the call itself
//! fails or returns nothing parseable — mirrored on the teacher's
//! `agent-core/src/llm_provider.rs` trait-plus-mock shape for the
//! transport boundary, via [`wf_llm_transport::LlmTransport`].

mod fallback;
mod parse;
mod prompt;
mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use wf_core_types::ExecutionPlan;
use wf_driver::Page;
use wf_llm_transport::{CompletionRequest, LlmTransport, Message};

pub use parse::normalize_navigate;
pub use snapshot::{ElementSummary, PageContext};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const PLANNING_TEMPERATURE: f32 = 0.2;

pub struct Planner {
    transport: Arc<dyn LlmTransport>,
    model: String,
    timeout: Duration,
}

impl Planner {
    pub fn new(transport: Arc<dyn LlmTransport>, model: impl Into<String>) -> Self {
        Self { transport, model: model.into(), timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Plan `goal` against `page`'s current state. Never returns an error:
    /// a transport failure, timeout, or unparseable response all degrade to
    /// the rule-based fallback tokenizer rather than failing the run,
    /// mirroring the reference implementation's three `except` branches
    /// which each return a best-effort `ExecutionPlan`.
    pub async fn plan(&self, page: &dyn Page, goal: &str) -> ExecutionPlan {
        let context = snapshot::extract(page).await;
        let prompt_text = prompt::build(&page.url(), &page.title(), goal, &context);

        debug!(%goal, "planning task");

        let mut request = CompletionRequest::new(self.model.clone(), vec![Message::user(prompt_text)]);
        request.temperature = Some(PLANNING_TEMPERATURE);

        let plan = match tokio::time::timeout(self.timeout, self.transport.complete(request)).await {
            Ok(Ok(response)) => {
                let data = parse::parse_response(&response.content);
                let plan = parse::build_plan(goal, &data);
                if plan.is_empty() { None } else { Some(plan) }
            }
            Ok(Err(err)) => {
                error!(?err, "planning call failed");
                None
            }
            Err(_) => {
                error!(timeout_secs = self.timeout.as_secs(), "planning timed out");
                None
            }
        };

        let plan = plan.unwrap_or_else(|| {
            warn!(%goal, "falling back to rule-based tokenizer");
            ExecutionPlan::new(fallback::parse_fallback_steps(goal))
        });

        info!(steps = plan.len(), framework_hint = ?plan.framework_hint, "plan ready");
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wf_core_types::{ActionTag, WayfinderError};
    use wf_driver::fixture::FixturePage;
    use wf_llm_transport::{CompletionResponse, Usage};

    struct StaticTransport {
        content: String,
    }

    #[async_trait]
    impl LlmTransport for StaticTransport {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, WayfinderError> {
            Ok(CompletionResponse { content: self.content.clone(), usage: Usage::default(), model: "mock".to_string() })
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl LlmTransport for FailingTransport {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, WayfinderError> {
            Err(WayfinderError::TransportDisconnect("socket closed".to_string()))
        }
    }

    #[tokio::test]
    async fn builds_plan_from_well_formed_json_response() {
        let content = r#"```json
        {
          "steps": [
            {"action": "navigate", "target": "https://www.saucedemo.com", "value": "https://www.saucedemo.com", "wait_after": "navigation"},
            {"action": "fill", "target": "Username field", "locators": [{"type": "testid", "value": "username"}], "value": "john"}
          ],
          "recommended_strategy": "testid"
        }
        ```"#;
        let planner = Planner::new(Arc::new(StaticTransport { content: content.to_string() }), "gpt-4");
        let page = FixturePage::new("https://www.saucedemo.com");
        let plan = planner.plan(&page, "log in as john").await;

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].action, ActionTag::Navigate);
        assert_eq!(plan.steps[1].locators[0].value, "username");
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_rule_based_tokenizer() {
        let planner = Planner::new(Arc::new(FailingTransport), "gpt-4");
        let page = FixturePage::new("https://example.com");
        let plan = planner.plan(&page, "go to saucedemo, click login").await;

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].action, ActionTag::Navigate);
    }

    #[tokio::test]
    async fn empty_steps_array_also_triggers_fallback() {
        let planner = Planner::new(Arc::new(StaticTransport { content: r#"{"steps": []}"#.to_string() }), "gpt-4");
        let page = FixturePage::new("https://example.com");
        let plan = planner.plan(&page, "click login").await;

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps[0].action, ActionTag::Click);
    }
}
