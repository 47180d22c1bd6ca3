//! [`StepResult`] — outcome record for one executed [`crate::PlannedStep`] (spec §3).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::locator::LocatorStrategy;
use crate::StepId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub success: bool,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<LocatorStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub attempted_alternatives: Vec<String>,
}

impl StepResult {
    pub fn success(step_id: StepId, duration: Duration, strategy: LocatorStrategy, selector: impl Into<String>) -> Self {
        Self {
            step_id,
            success: true,
            duration,
            strategy_used: Some(strategy),
            selector_used: Some(selector.into()),
            error_kind: None,
            error_message: None,
            attempted_alternatives: Vec::new(),
        }
    }

    pub fn failure(step_id: StepId, duration: Duration, error_kind: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            step_id,
            success: false,
            duration,
            strategy_used: None,
            selector_used: None,
            error_kind: Some(error_kind.into()),
            error_message: Some(error_message.into()),
            attempted_alternatives: Vec::new(),
        }
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.attempted_alternatives = alternatives;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
