//! Thin boundary to the external browser collaborator (spec §6).
//!
//! Grounded on the teacher's `action-locator` crate boundary style (small
//! `async_trait` traits wrapping a live driver connection,
//! `action-locator/src/bridge.rs`) and on `original_source/interfaces/browser.py`'s
//! `IPage`/`IElement` contract, which this module keeps unchanged in shape
//! while dropping the parts the spec's Non-goals exclude (multi-tab/frame
//! management, download handling, video recording).

pub mod fixture;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found for selector '{0}'")]
    NotFound(String),
    #[error("timed out waiting for '{0}'")]
    Timeout(String),
    #[error("driver operation failed: {0}")]
    Failed(String),
}

/// Wait condition after a navigation or step (spec §4.2's `WaitPolicy`,
/// §4.6 post-validation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Serializable snapshot of a DOM element, independent of any live driver
/// reference — the shape downstream components (locator resolver, step
/// validator) actually reason about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub selector: String,
    pub tag_name: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A live handle to one DOM element.
#[async_trait]
pub trait Element: Send + Sync {
    async fn click(&self) -> Result<(), DriverError>;
    /// A forced click bypasses the driver's actionability checks (spec's
    /// `force_click` recovery flag, §9).
    async fn click_forced(&self) -> Result<(), DriverError>;
    async fn fill(&self, value: &str) -> Result<(), DriverError>;
    /// Character-by-character typing with the given inter-key delay (spec's
    /// `slow_type` recovery flag, §9).
    async fn type_text(&self, value: &str, delay_per_char: Duration) -> Result<(), DriverError>;
    async fn select_option(&self, values: &[String]) -> Result<Vec<String>, DriverError>;
    async fn hover(&self) -> Result<(), DriverError>;
    async fn scroll_into_view(&self) -> Result<(), DriverError>;
    async fn press_key(&self, key: &str) -> Result<(), DriverError>;
    async fn get_attribute(&self, name: &str) -> Result<Option<String>, DriverError>;
    async fn text_content(&self) -> Result<String, DriverError>;
    async fn is_visible(&self) -> Result<bool, DriverError>;
    async fn is_enabled(&self) -> Result<bool, DriverError>;
    async fn to_snapshot(&self) -> Result<ElementSnapshot, DriverError>;
}

/// A live browser page/tab.
#[async_trait]
pub trait Page: Send + Sync {
    fn url(&self) -> String;
    fn title(&self) -> String;

    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), DriverError>;
    async fn reload(&self) -> Result<(), DriverError>;
    async fn go_back(&self) -> Result<(), DriverError>;
    async fn wait_for_load_state(&self, wait_until: WaitUntil, timeout: Duration) -> Result<(), DriverError>;

    async fn query_selector(&self, selector: &str) -> Result<Option<Box<dyn Element>>, DriverError>;
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, DriverError>;
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<Option<Box<dyn Element>>, DriverError>;

    /// Run arbitrary JS and decode its return value, used by framework
    /// detection (spec §4.2) and DOM-index extraction (spec §4.4).
    async fn evaluate(&self, script: &str) -> Result<Value, DriverError>;

    async fn press_key(&self, key: &str) -> Result<(), DriverError>;
}

impl From<DriverError> for wf_core_types::WayfinderError {
    fn from(err: DriverError) -> Self {
        wf_core_types::WayfinderError::DriverError(err.to_string())
    }
}
