//! Immutable step traces.
//!
//! A [`Trace`] is created once per algorithm run and never mutated. Clones
//! share the same step storage, so handing a trace to the playback session
//! or publishing live prefix snapshots is cheap.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::step::{Priority, Step, StepPayload};

/// Label of the summary step appended to runs that emitted nothing.
pub const EMPTY_RUN_SUMMARY: &str = "Nothing to show: the run finished without intermediate steps.";

/// Identity of one algorithm run.
///
/// Live recording publishes several snapshots of the same run; they all
/// share one `TraceId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Allocate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised when assembling a trace from raw steps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// Traces always hold at least one step.
    #[error("a trace must contain at least one step")]
    Empty,

    /// A step's `index` does not match its position.
    #[error("step at position {position} carries index {index}")]
    IndexMismatch { position: usize, index: usize },
}

/// An immutable, ordered, non-empty sequence of steps.
#[derive(Debug, Clone)]
pub struct Trace {
    id: TraceId,
    steps: Arc<[Step]>,
}

// Traces are never empty, so `is_empty` would always be false.
#[allow(clippy::len_without_is_empty)]
impl Trace {
    /// Build a trace with a fresh identifier.
    pub fn new(steps: Vec<Step>) -> Result<Self, TraceError> {
        Self::with_id(TraceId::new(), steps)
    }

    /// Build a trace under an existing identifier.
    ///
    /// Rejects empty step lists and steps whose `index` does not match their
    /// position.
    pub fn with_id(id: TraceId, steps: Vec<Step>) -> Result<Self, TraceError> {
        if steps.is_empty() {
            return Err(TraceError::Empty);
        }
        if let Some((position, step)) = steps
            .iter()
            .enumerate()
            .find(|(position, step)| step.index != *position)
        {
            return Err(TraceError::IndexMismatch {
                position,
                index: step.index,
            });
        }
        Ok(Self::from_validated(id, steps))
    }

    fn from_validated(id: TraceId, steps: Vec<Step>) -> Self {
        Self {
            id,
            steps: steps.into(),
        }
    }

    /// Identifier of the run that produced this trace.
    #[must_use]
    pub const fn id(&self) -> TraceId {
        self.id
    }

    /// Number of steps (always at least 1).
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Index of the final step.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Clamp an arbitrary index into `[0, last_index]`.
    #[must_use]
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.last_index())
    }

    /// Step at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// All steps in order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Iterate over the steps in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    /// Whether `other` is a longer snapshot of the same run.
    #[must_use]
    pub fn is_extended_by(&self, other: &Self) -> bool {
        self.id == other.id && other.len() > self.len()
    }
}

impl PartialEq for Trace {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.steps == other.steps
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Incrementally assembles a trace, assigning step indices in order.
///
/// The builder is the only way recorders produce traces, which keeps the
/// "index equals position" and "never empty" invariants out of simulator
/// code entirely.
#[derive(Debug)]
pub struct TraceBuilder {
    id: TraceId,
    steps: Vec<Step>,
}

impl TraceBuilder {
    /// Start a new run.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: TraceId::new(),
            steps: Vec::new(),
        }
    }

    /// Identifier the finished trace will carry.
    #[must_use]
    pub const fn id(&self) -> TraceId {
        self.id
    }

    /// Number of steps pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step has been pushed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step and return the index it was given.
    pub fn push(
        &mut self,
        payload: StepPayload,
        label: impl Into<String>,
        priority: Priority,
    ) -> usize {
        let index = self.steps.len();
        self.steps.push(Step::new(index, payload, label, priority));
        index
    }

    /// Immutable view of everything recorded so far, or `None` before the
    /// first step.
    #[must_use]
    pub fn snapshot(&self) -> Option<Trace> {
        if self.steps.is_empty() {
            None
        } else {
            Some(Trace::from_validated(self.id, self.steps.clone()))
        }
    }

    /// Finish the run with the default summary for empty runs.
    #[must_use]
    pub fn finish(self) -> Trace {
        self.finish_with_summary(StepPayload::empty(), EMPTY_RUN_SUMMARY)
    }

    /// Finish the run. If nothing was recorded, a single terminal step with
    /// the given payload and label is appended so the trace is never empty.
    #[must_use]
    pub fn finish_with_summary(mut self, payload: StepPayload, label: impl Into<String>) -> Trace {
        if self.steps.is_empty() {
            self.push(payload, label, Priority::Normal);
        }
        Trace::from_validated(self.id, self.steps)
    }
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
