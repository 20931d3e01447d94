//! Thin wrapper over the [`SpeechPort`].
//!
//! Detects the service once at startup and clamps parameters into the range
//! every backend accepts. When detection fails the adapter stays in
//! unavailable mode for the rest of the process: the scheduler still accepts
//! narration but never dispatches it.

use std::sync::Arc;

use tracecast_core::{SpeechError, SpeechEventSender, SpeechPort, Utterance, UtteranceHandle};

use crate::error::NarrationError;

/// Slowest rate passed to the speech service.
pub const MIN_RATE: f32 = 0.5;

/// Fastest rate passed to the speech service.
pub const MAX_RATE: f32 = 2.0;

/// Result of startup detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationStatus {
    Available,
    Unavailable { reason: String },
}

impl NarrationStatus {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// The scheduler's only route to the speech service.
#[derive(Clone)]
pub struct SpeechAdapter {
    port: Arc<dyn SpeechPort>,
    volume: f32,
    status: NarrationStatus,
}

impl SpeechAdapter {
    /// Probe the service and build an adapter in the matching mode.
    ///
    /// An unavailable service is reported exactly once, here.
    pub async fn detect(port: Arc<dyn SpeechPort>, volume: f32) -> Self {
        let status = match port.probe().await {
            Ok(()) => {
                tracing::debug!("Speech service detected");
                NarrationStatus::Available
            }
            Err(e) => {
                let reason = match e {
                    SpeechError::Unavailable(reason) => reason,
                    other => other.to_string(),
                };
                let error = NarrationError::ResourceUnavailable(reason.clone());
                tracing::warn!(%error, "Narration disabled for this session");
                NarrationStatus::Unavailable { reason }
            }
        };

        Self {
            port,
            volume: volume.clamp(0.0, 1.0),
            status,
        }
    }

    #[must_use]
    pub const fn status(&self) -> &NarrationStatus {
        &self.status
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.status.is_available()
    }

    /// Start speaking `text`.
    pub async fn dispatch(
        &self,
        text: &str,
        rate: f32,
        events: SpeechEventSender,
    ) -> Result<UtteranceHandle, SpeechError> {
        if let NarrationStatus::Unavailable { reason } = &self.status {
            return Err(SpeechError::Unavailable(reason.clone()));
        }

        let utterance = Utterance {
            text: text.to_string(),
            rate: clamp_rate(rate),
            volume: self.volume,
        };
        self.port.dispatch(utterance, events).await
    }

    /// Best-effort stop.
    pub fn stop(&self, handle: UtteranceHandle) {
        if self.is_available() {
            self.port.stop(handle);
        }
    }
}

fn clamp_rate(rate: f32) -> f32 {
    if rate.is_finite() {
        rate.clamp(MIN_RATE, MAX_RATE)
    } else {
        1.0
    }
}
