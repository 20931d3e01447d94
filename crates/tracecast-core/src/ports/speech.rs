//! Speech port: the boundary to the external text-to-speech service.
//!
//! # Design Rules
//!
//! - The service speaks one utterance at a time. Nothing enforces that here;
//!   the narration scheduler is the only caller and owns the exclusivity.
//! - Lifecycle notifications travel over a [`SpeechEventSender`] handed to
//!   every `dispatch` call, so implementations never hold a reference back
//!   into the scheduler.
//! - `stop` is best-effort and must not block. A well-behaved backend
//!   answers it with [`SpeechEventKind::Stopped`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque identifier of one dispatched utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtteranceHandle(u64);

impl UtteranceHandle {
    /// Wrap a backend-assigned identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The backend-assigned identifier.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UtteranceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance#{}", self.0)
    }
}

/// Text to speak and how to speak it.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Plain text, already cleaned for speech.
    pub text: String,
    /// Speaking rate multiplier (1.0 = normal).
    pub rate: f32,
    /// Output volume (0.0–1.0).
    pub volume: f32,
}

/// What happened to an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEventKind {
    /// Audio started playing.
    Started,
    /// The utterance finished naturally.
    Ended,
    /// The utterance was stopped on request.
    Stopped,
    /// The service gave up on the utterance.
    Failed(String),
}

/// A lifecycle notification for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechEvent {
    pub handle: UtteranceHandle,
    pub kind: SpeechEventKind,
}

impl SpeechEvent {
    #[must_use]
    pub const fn started(handle: UtteranceHandle) -> Self {
        Self {
            handle,
            kind: SpeechEventKind::Started,
        }
    }

    #[must_use]
    pub const fn ended(handle: UtteranceHandle) -> Self {
        Self {
            handle,
            kind: SpeechEventKind::Ended,
        }
    }

    #[must_use]
    pub const fn stopped(handle: UtteranceHandle) -> Self {
        Self {
            handle,
            kind: SpeechEventKind::Stopped,
        }
    }

    pub fn failed(handle: UtteranceHandle, reason: impl Into<String>) -> Self {
        Self {
            handle,
            kind: SpeechEventKind::Failed(reason.into()),
        }
    }

    /// Whether the utterance no longer occupies the speech service.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self.kind, SpeechEventKind::Started)
    }
}

/// Channel on which backends report [`SpeechEvent`]s.
pub type SpeechEventSender = mpsc::UnboundedSender<SpeechEvent>;

/// Errors returned by the speech service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    /// The service does not exist on this platform or failed to initialise.
    #[error("Speech service unavailable: {0}")]
    Unavailable(String),

    /// The service is momentarily busy; retrying later may succeed.
    #[error("Speech service busy")]
    Busy,

    /// The service refused this particular utterance.
    #[error("Speech dispatch rejected: {0}")]
    Rejected(String),
}

/// Port trait for the external text-to-speech service.
///
/// Implemented by real engines in adapter crates and by in-memory fakes in
/// tests. Must be `Send + Sync` so the scheduler task can own it behind an
/// `Arc`.
#[async_trait]
pub trait SpeechPort: Send + Sync {
    /// Feature-detect the service. Called exactly once, at startup.
    async fn probe(&self) -> Result<(), SpeechError>;

    /// Start speaking an utterance.
    ///
    /// Returns once the service has accepted (not finished) the utterance.
    /// `Started`, `Ended`, `Stopped` and `Failed` notifications for the
    /// returned handle are sent on `events`.
    async fn dispatch(
        &self,
        utterance: Utterance,
        events: SpeechEventSender,
    ) -> Result<UtteranceHandle, SpeechError>;

    /// Ask the service to stop an utterance. Best-effort, never blocks.
    fn stop(&self, handle: UtteranceHandle);
}
