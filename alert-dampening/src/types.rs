use std::fmt;

use serde::{Deserialize, Serialize};

/// Trigger modes; each mode has its own dampening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerMode {
    Firing,
    AutoResolve,
}

impl TriggerMode {
    pub const ALL: [TriggerMode; 2] = [TriggerMode::Firing, TriggerMode::AutoResolve];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::Firing => "FIRING",
            TriggerMode::AutoResolve => "AUTORESOLVE",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one dampening: (tenant, trigger, mode).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DampeningKey {
    pub tenant_id: String,
    pub trigger_id: String,
    pub mode: TriggerMode,
}

impl DampeningKey {
    pub fn new(tenant_id: impl Into<String>, trigger_id: impl Into<String>, mode: TriggerMode) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            trigger_id: trigger_id.into(),
            mode,
        }
    }
}

impl fmt::Display for DampeningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.tenant_id, self.trigger_id, self.mode)
    }
}

/// Result of matching one condition against one data point or event.
///
/// Produced by the rule evaluator; dampening only looks at `matched` and
/// carries the rest along to the alert sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEval {
    pub condition_id: String,
    pub matched: bool,
    /// Timestamp (ms) of the data or event that was evaluated.
    pub data_timestamp: i64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ConditionEval {
    pub fn new(condition_id: impl Into<String>, matched: bool, data_timestamp: i64) -> Self {
        Self {
            condition_id: condition_id.into(),
            matched,
            data_timestamp,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
