//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the core expects from infrastructure. They
//! contain no implementation details beyond trivial in-memory defaults.
//!
//! # Design Rules
//!
//! - No engine- or storage-specific types in any signature
//! - The speech port is only ever called by the narration scheduler
//! - Time is read through [`Clock`] so pacing is testable without sleeping

pub mod clock;
pub mod preferences;
pub mod speech;

pub use clock::{Clock, ManualClock, TokioClock};
#[cfg(test)]
pub use preferences::MockPreferenceStore;
pub use preferences::{MemoryPreferenceStore, PreferenceError, PreferenceKey, PreferenceStore};
pub use speech::{
    SpeechError, SpeechEvent, SpeechEventKind, SpeechEventSender, SpeechPort, Utterance,
    UtteranceHandle,
};
