//! Playback session errors.

use tracecast_core::ConfigError;
use tracecast_narration::NarrationError;

/// Errors returned by [`crate::PlaybackSession`].
///
/// Narration trouble after startup is never an error here; it is logged and
/// playback carries on.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session config: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start narration: {0}")]
    Narration(#[from] NarrationError),

    /// The session was closed.
    #[error("Playback session is closed")]
    Closed,
}
