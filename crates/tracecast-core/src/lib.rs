//! Core domain types, events and ports for tracecast.
//!
//! Everything in this crate is runtime-agnostic: no timers, no tasks, no
//! I/O. The narration scheduler and the playback session build on these
//! types in their own crates.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod events;
pub mod ports;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{
    ConfigError, DEFAULT_BASE_INTERVAL, DEFAULT_BUSY_BACKOFF, DEFAULT_CANCEL_GRACE,
    DEFAULT_MIN_INTERVAL, DEFAULT_NARRATION_TTL, NarrationConfig, PlaybackConfig, SeekBehavior,
};
pub use domain::{
    EMPTY_RUN_SUMMARY, Priority, SpeedPreset, Step, StepPayload, Trace, TraceBuilder, TraceError,
    TraceId, UnknownSpeedPreset, UserPreference,
};
pub use events::{PlaybackSnapshot, SessionEvent, StepTransition};
pub use ports::{
    Clock, ManualClock, MemoryPreferenceStore, PreferenceError, PreferenceKey, PreferenceStore,
    SpeechError, SpeechEvent, SpeechEventKind, SpeechEventSender, SpeechPort, TokioClock,
    Utterance, UtteranceHandle,
};
pub use services::PreferenceService;

