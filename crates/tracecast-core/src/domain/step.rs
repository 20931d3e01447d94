//! Steps: the atomic unit of progress in a recorded trace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Narration priority of a step.
///
/// Ordered: `Low < Normal < High`. High-priority narration jumps ahead of
/// everything already queued.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// Wire label (`"low"`, `"normal"`, `"high"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Algorithm-defined step state.
///
/// The payload is an opaque JSON value: simulators put whatever snapshot
/// their renderer needs in here, and nothing in the playback or narration
/// core ever looks inside it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepPayload(serde_json::Value);

impl StepPayload {
    /// A payload carrying no state.
    #[must_use]
    pub const fn empty() -> Self {
        Self(serde_json::Value::Null)
    }

    /// Wrap an already-built JSON value.
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Serialize any simulator state into a payload.
    pub fn from_state<T: Serialize>(state: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(state).map(Self)
    }

    /// Borrow the raw JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Consume the payload, returning the raw JSON value.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for StepPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// One recorded step of an algorithm run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Zero-based position of the step in its trace.
    pub index: usize,

    /// Opaque algorithm state for the renderer.
    pub payload: StepPayload,

    /// Narration text. An empty label means the step is shown but not spoken.
    pub label: String,

    /// Narration priority.
    pub priority: Priority,
}

impl Step {
    /// Create a step.
    pub fn new(
        index: usize,
        payload: StepPayload,
        label: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            index,
            payload,
            label: label.into(),
            priority,
        }
    }

    /// Whether this step has anything to say.
    #[must_use]
    pub fn has_narration(&self) -> bool {
        !self.label.trim().is_empty()
    }
}
