//! In-memory speech backend for tests and demos.
//!
//! [`RecordingSpeech`] plays each utterance for a fixed virtual duration
//! (scaled by rate) on tokio's clock, so tests running with paused time see
//! realistic `Started`/`Ended` timing without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracecast_core::{
    SpeechError, SpeechEvent, SpeechEventSender, SpeechPort, Utterance, UtteranceHandle,
};

/// Default length of one utterance at rate 1.0.
pub const DEFAULT_UTTERANCE_DURATION: Duration = Duration::from_millis(1500);

/// One call to `dispatch`, as the service saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    pub handle: UtteranceHandle,
    pub text: String,
    pub rate: f32,
    pub volume: f32,
    pub at: Instant,
}

struct Playing {
    events: SpeechEventSender,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct Recording {
    next_handle: u64,
    dispatches: Vec<DispatchRecord>,
    stops: Vec<UtteranceHandle>,
    playing: HashMap<UtteranceHandle, Playing>,
    max_overlap: usize,
    busy_remaining: usize,
}

/// Fake speech service that records everything it is asked to do.
pub struct RecordingSpeech {
    state: Arc<Mutex<Recording>>,
    unavailable: Option<String>,
    duration: Duration,
    acknowledge_stop: bool,
}

impl Default for RecordingSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSpeech {
    /// Available service, 1.5 s utterances, stops acknowledged.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            unavailable: None,
            duration: DEFAULT_UTTERANCE_DURATION,
            acknowledge_stop: true,
        }
    }

    /// Service whose probe fails.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::new()
        }
    }

    /// Length of one utterance at rate 1.0.
    #[must_use]
    pub const fn with_utterance_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Keep playing after `stop` and never send `Stopped`.
    #[must_use]
    pub const fn ignoring_stop(mut self) -> Self {
        self.acknowledge_stop = false;
        self
    }

    /// Refuse the next `count` dispatches with [`SpeechError::Busy`].
    #[must_use]
    pub fn busy_for(self, count: usize) -> Self {
        self.lock().busy_remaining = count;
        self
    }

    /// Every accepted dispatch, in order.
    #[must_use]
    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.lock().dispatches.clone()
    }

    /// `(text, rate)` of every accepted dispatch.
    #[must_use]
    pub fn spoken(&self) -> Vec<(String, f32)> {
        self.lock()
            .dispatches
            .iter()
            .map(|d| (d.text.clone(), d.rate))
            .collect()
    }

    /// Every handle `stop` was called with.
    #[must_use]
    pub fn stops(&self) -> Vec<UtteranceHandle> {
        self.lock().stops.clone()
    }

    /// Utterances currently audible.
    #[must_use]
    pub fn playing_count(&self) -> usize {
        self.lock().playing.len()
    }

    /// Largest number of utterances ever audible at once.
    #[must_use]
    pub fn max_overlap(&self) -> usize {
        self.lock().max_overlap
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SpeechPort for RecordingSpeech {
    async fn probe(&self) -> Result<(), SpeechError> {
        match &self.unavailable {
            Some(reason) => Err(SpeechError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn dispatch(
        &self,
        utterance: Utterance,
        events: SpeechEventSender,
    ) -> Result<UtteranceHandle, SpeechError> {
        if let Some(reason) = &self.unavailable {
            return Err(SpeechError::Unavailable(reason.clone()));
        }

        let mut state = self.lock();
        if state.busy_remaining > 0 {
            state.busy_remaining -= 1;
            return Err(SpeechError::Busy);
        }

        state.next_handle += 1;
        let handle = UtteranceHandle::new(state.next_handle);
        state.dispatches.push(DispatchRecord {
            handle,
            text: utterance.text,
            rate: utterance.rate,
            volume: utterance.volume,
            at: Instant::now(),
        });

        let _ = events.send(SpeechEvent::started(handle));

        let length = self.duration.div_f32(utterance.rate.max(0.1));
        let shared = Arc::clone(&self.state);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(length).await;
            let finished = shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .playing
                .remove(&handle);
            if let Some(playing) = finished {
                let _ = playing.events.send(SpeechEvent::ended(handle));
            }
        });

        state.playing.insert(handle, Playing { events, timer });
        state.max_overlap = state.max_overlap.max(state.playing.len());
        Ok(handle)
    }

    fn stop(&self, handle: UtteranceHandle) {
        let mut state = self.lock();
        state.stops.push(handle);
        if !self.acknowledge_stop {
            return;
        }
        if let Some(playing) = state.playing.remove(&handle) {
            playing.timer.abort();
            let _ = playing.events.send(SpeechEvent::stopped(handle));
        }
    }
}
