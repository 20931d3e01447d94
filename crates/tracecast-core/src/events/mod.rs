//! Events published by a playback session.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag so a presentation layer in any
//! language can consume them:
//!
//! ```json
//! { "type": "step_transition", "transition": { "stepIndex": 3, "totalSteps": 9, ... } }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{Priority, SpeedPreset, TraceId};

/// Published on every change of the current step index.
///
/// This is the only seam between playback and narration: the session turns
/// each transition into a narration request, and nothing else in playback
/// knows narration exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTransition {
    /// Run the step belongs to.
    pub trace_id: TraceId,
    /// New current index.
    pub step_index: usize,
    /// Length of the trace at the time of the transition.
    pub total_steps: usize,
    /// Label of the new current step (may be empty).
    pub narration_text: String,
    /// Narration priority of the new current step.
    pub priority: Priority,
}

/// Point-in-time view of the playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    /// Loaded trace, if any.
    pub trace_id: Option<TraceId>,
    /// Current step index (0 when nothing is loaded).
    pub current_index: usize,
    /// Number of steps in the loaded trace (0 when nothing is loaded).
    pub total_steps: usize,
    /// Whether auto-advance is running.
    pub is_playing: bool,
    /// Active speed preset.
    pub speed: SpeedPreset,
}

impl PlaybackSnapshot {
    /// Whether the current index is the final step of the loaded trace.
    #[must_use]
    pub const fn at_end(&self) -> bool {
        self.total_steps > 0 && self.current_index + 1 == self.total_steps
    }
}

/// Everything a subscriber to a session can observe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new trace replaced the previous one.
    TraceLoaded {
        #[serde(rename = "traceId")]
        trace_id: TraceId,
        #[serde(rename = "totalSteps")]
        total_steps: usize,
    },

    /// The current step changed.
    StepTransition { transition: StepTransition },

    /// Play state, index or speed changed.
    StateChanged { snapshot: PlaybackSnapshot },

    /// Voice narration was switched on or off.
    VoiceToggled { enabled: bool },

    /// The session was closed; no further events follow.
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_transition_serializes_with_type_tag() {
        let event = SessionEvent::StepTransition {
            transition: StepTransition {
                trace_id: TraceId::new(),
                step_index: 3,
                total_steps: 9,
                narration_text: "Compare 4 and 7".to_string(),
                priority: Priority::High,
            },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_transition");
        assert_eq!(json["transition"]["stepIndex"], 3);
        assert_eq!(json["transition"]["priority"], "high");
    }

    #[test]
    fn snapshot_at_end() {
        let mut snapshot = PlaybackSnapshot {
            trace_id: Some(TraceId::new()),
            current_index: 4,
            total_steps: 5,
            is_playing: false,
            speed: SpeedPreset::Normal,
        };
        assert!(snapshot.at_end());

        snapshot.current_index = 2;
        assert!(!snapshot.at_end());

        snapshot.total_steps = 0;
        snapshot.current_index = 0;
        assert!(!snapshot.at_end());
    }
}
