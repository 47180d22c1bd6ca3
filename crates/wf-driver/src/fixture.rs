//! In-memory `Page`/`Element` fixture used by every other crate's tests, so
//! no crate in this workspace needs a real browser to exercise its logic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{BoundingBox, DriverError, Element, ElementSnapshot, Page, WaitUntil};

#[derive(Debug, Clone, Default)]
pub struct FixtureElement {
    pub snapshot: ElementSnapshot,
    /// Returned by `select_option` regardless of the requested values, to
    /// model a `<select>` that rejects unknown options.
    pub select_accepts: Vec<String>,
}

impl FixtureElement {
    pub fn new(selector: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            snapshot: ElementSnapshot {
                selector: selector.into(),
                tag_name: tag_name.into(),
                is_visible: true,
                is_enabled: true,
                ..Default::default()
            },
            select_accepts: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.snapshot.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.snapshot.text_content = text.into();
        self
    }

    pub fn with_bounding_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.snapshot.bounding_box = Some(BoundingBox { x, y, width, height });
        self
    }

    pub fn hidden(mut self) -> Self {
        self.snapshot.is_visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.snapshot.is_enabled = false;
        self
    }
}

#[derive(Debug, Default)]
struct Interactions {
    clicks: u32,
    forced_clicks: u32,
    fills: Vec<String>,
    typed: Vec<String>,
    key_presses: Vec<String>,
}

struct FixtureElementHandle {
    element: FixtureElement,
    interactions: Arc<Mutex<Interactions>>,
}

#[async_trait]
impl Element for FixtureElementHandle {
    async fn click(&self) -> Result<(), DriverError> {
        if !self.element.snapshot.is_visible || !self.element.snapshot.is_enabled {
            return Err(DriverError::Failed(format!(
                "element '{}' is not actionable",
                self.element.snapshot.selector
            )));
        }
        self.interactions.lock().await.clicks += 1;
        Ok(())
    }

    async fn click_forced(&self) -> Result<(), DriverError> {
        self.interactions.lock().await.forced_clicks += 1;
        Ok(())
    }

    async fn fill(&self, value: &str) -> Result<(), DriverError> {
        self.interactions.lock().await.fills.push(value.to_string());
        Ok(())
    }

    async fn type_text(&self, value: &str, _delay_per_char: Duration) -> Result<(), DriverError> {
        self.interactions.lock().await.typed.push(value.to_string());
        Ok(())
    }

    async fn select_option(&self, values: &[String]) -> Result<Vec<String>, DriverError> {
        if self.element.select_accepts.is_empty() {
            return Ok(values.to_vec());
        }
        let accepted: Vec<String> = values
            .iter()
            .filter(|v| self.element.select_accepts.contains(v))
            .cloned()
            .collect();
        if accepted.is_empty() {
            return Err(DriverError::Failed("no requested option value is present".into()));
        }
        Ok(accepted)
    }

    async fn hover(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), DriverError> {
        self.interactions.lock().await.key_presses.push(key.to_string());
        Ok(())
    }

    async fn get_attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.element.snapshot.attributes.get(name).cloned())
    }

    async fn text_content(&self) -> Result<String, DriverError> {
        Ok(self.element.snapshot.text_content.clone())
    }

    async fn is_visible(&self) -> Result<bool, DriverError> {
        Ok(self.element.snapshot.is_visible)
    }

    async fn is_enabled(&self) -> Result<bool, DriverError> {
        Ok(self.element.snapshot.is_enabled)
    }

    async fn to_snapshot(&self) -> Result<ElementSnapshot, DriverError> {
        Ok(self.element.snapshot.clone())
    }
}

/// A scripted page: a fixed set of elements keyed by selector, a fixed
/// `evaluate` return value, and a URL/title that `goto` updates.
pub struct FixturePage {
    elements: HashMap<String, FixtureElement>,
    evaluate_result: Value,
    url: Mutex<String>,
    title: Mutex<String>,
    interactions: Arc<Mutex<Interactions>>,
}

impl FixturePage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            elements: HashMap::new(),
            evaluate_result: Value::Null,
            url: Mutex::new(url.into()),
            title: Mutex::new(String::new()),
            interactions: Arc::new(Mutex::new(Interactions::default())),
        }
    }

    pub fn with_element(mut self, element: FixtureElement) -> Self {
        self.elements.insert(element.snapshot.selector.clone(), element);
        self
    }

    pub fn with_evaluate_result(mut self, result: Value) -> Self {
        self.evaluate_result = result;
        self
    }

    pub async fn click_count(&self) -> u32 {
        self.interactions.lock().await.clicks
    }

    pub async fn fills(&self) -> Vec<String> {
        self.interactions.lock().await.fills.clone()
    }
}

#[async_trait]
impl Page for FixturePage {
    fn url(&self) -> String {
        self.url.try_lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn title(&self) -> String {
        self.title.try_lock().map(|g| g.clone()).unwrap_or_default()
    }

    async fn goto(&self, url: &str, _wait_until: WaitUntil) -> Result<(), DriverError> {
        *self.url.lock().await = url.to_string();
        Ok(())
    }

    async fn reload(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn go_back(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn wait_for_load_state(&self, _wait_until: WaitUntil, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Box<dyn Element>>, DriverError> {
        Ok(self.elements.get(selector).map(|element| {
            Box::new(FixtureElementHandle { element: element.clone(), interactions: self.interactions.clone() }) as Box<dyn Element>
        }))
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, DriverError> {
        Ok(self
            .query_selector(selector)
            .await?
            .into_iter()
            .collect())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<Option<Box<dyn Element>>, DriverError> {
        self.query_selector(selector).await
    }

    /// Script-aware only for the handful of generic read-back probes
    /// `wf-step-validator` issues (value readback, active/disabled class
    /// check); everything else returns the fixed [`Self::with_evaluate_result`]
    /// value regardless of script text, same as a real page would for
    /// scripts this fixture doesn't understand.
    async fn evaluate(&self, script: &str) -> Result<Value, DriverError> {
        if script.contains("?.value") || script.contains("getAttribute('value')") {
            let fills = self.interactions.lock().await.fills.clone();
            if let Some(last) = fills.last() {
                return Ok(Value::String(last.clone()));
            }
        }
        if script.contains("classList.contains") {
            let clicked = self.interactions.lock().await.clicks > 0;
            return Ok(Value::Bool(clicked));
        }
        Ok(self.evaluate_result.clone())
    }

    async fn press_key(&self, key: &str) -> Result<(), DriverError> {
        self.interactions.lock().await.key_presses.push(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn click_on_hidden_element_fails() {
        let page = FixturePage::new("https://example.test").with_element(FixtureElement::new("#go", "button").hidden());
        let element = page.query_selector("#go").await.unwrap().unwrap();
        assert!(element.click().await.is_err());
    }

    #[tokio::test]
    async fn fill_records_value() {
        let page = FixturePage::new("https://example.test").with_element(FixtureElement::new("#email", "input"));
        let element = page.query_selector("#email").await.unwrap().unwrap();
        element.fill("a@b.com").await.unwrap();
        assert_eq!(page.fills().await, vec!["a@b.com".to_string()]);
    }
}
