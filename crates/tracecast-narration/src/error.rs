//! Narration error types.
//!
//! None of these ever reach playback as a failure. They are logged where
//! they occur, and only startup unavailability is surfaced as a status.

use tracecast_core::{ConfigError, UtteranceHandle};

/// Errors and anomalies in the narration pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NarrationError {
    /// The speech service is missing or failed to initialise.
    #[error("Narration unavailable: {0}")]
    ResourceUnavailable(String),

    /// The speech slot is momentarily held; the request is retried.
    #[error("Speech service busy, retrying")]
    ResourceBusy,

    /// A queued request outlived its TTL and was dropped.
    #[error("Dropped {count} expired narration request(s)")]
    StaleRequest { count: usize },

    /// A cancelled utterance never acknowledged the stop.
    #[error("{handle} did not acknowledge stop within {grace_ms}ms, slot reclaimed")]
    CancellationRace {
        handle: UtteranceHandle,
        grace_ms: u128,
    },

    /// Invalid scheduler configuration.
    #[error("Invalid narration config: {0}")]
    Config(#[from] ConfigError),

    /// The scheduler task has shut down.
    #[error("Narration scheduler is closed")]
    Closed,
}
