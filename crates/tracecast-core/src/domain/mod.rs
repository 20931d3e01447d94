//! Domain types shared by recording, playback and narration.

mod preference;
mod step;
mod trace;

pub use preference::{SpeedPreset, UnknownSpeedPreset, UserPreference};
pub use step::{Priority, Step, StepPayload};
pub use trace::{EMPTY_RUN_SUMMARY, Trace, TraceBuilder, TraceError, TraceId};
