//! [`Event`] — observer payload streamed by the Event Bus (spec §3, §4.9).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    Step,
    RunCompleted,
    State,
}

/// One observer-facing progress event. Sequence numbers are monotonically
/// increasing per run (spec §4.9); payloads are JSON-serialisable bags so
/// downstream observers (GUI, report generator — out of scope here) don't
/// need to depend on this crate's Rust types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub sequence: u64,
    pub payload: Value,
}

impl Event {
    pub fn new(kind: EventKind, sequence: u64, payload: Value) -> Self {
        Self { kind, sequence, payload }
    }
}
