//! Spoken narration for tracecast.
//!
//! Narration is a shared, exclusive resource: one utterance at a time,
//! paced so consecutive utterances start at least `min_interval` apart,
//! ordered by priority then arrival, and self-pruning so stale commentary is
//! never spoken.
//!
//! # Architecture
//!
//! ```text
//! NarrationHandle ──cmd──▶ scheduler task ──▶ SpeechAdapter ──▶ SpeechPort
//!                           │  SchedulerCore           │
//!                           │  └ NarrationQueue        │
//!                           ◀────── SpeechEvent ────────┘
//! ```
//!
//! [`SchedulerCore`] and [`NarrationQueue`] are pure and take the current
//! time as an argument; the task in [`service`] is the only place that
//! touches the runtime.

pub mod adapter;
pub mod error;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod testing;
pub mod text;

pub use adapter::{MAX_RATE, MIN_RATE, NarrationStatus, SpeechAdapter};
pub use error::NarrationError;
pub use queue::{EnqueueOutcome, FlushScope, NarrationOrigin, NarrationQueue, NarrationRequest};
pub use scheduler::{PollDecision, SchedulerCore, SchedulerSnapshot, SlotStatus};
pub use service::NarrationHandle;
pub use text::{clean_for_speech, dedupe_key};
