//! Playback session - the public face of tracecast.
//!
//! A session owns one [`PlaybackController`], the auto-advance ticker task
//! and the narration scheduler. Controller effects are applied under a
//! single lock, so a manual step and a timer tick can never interleave
//! halfway. Step transitions become narration requests here and nowhere
//! else.
//!
//! # Lifecycle
//!
//! [`PlaybackSession::open`] loads preferences, detects the speech service
//! and starts narration. [`PlaybackSession::close`] stops the ticker, stops
//! narration (including the current utterance) and publishes
//! [`SessionEvent::Closed`]. Dropping the session without closing it tears
//! everything down too, just without waiting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracecast_core::{
    Clock, PlaybackSnapshot, PreferenceService, PreferenceStore, SessionEvent, SpeechPort,
    SpeedPreset, Step, TokioClock, Trace, UserPreference,
};
use tracecast_narration::{
    NarrationError, NarrationHandle, NarrationOrigin, NarrationStatus, SpeechAdapter,
};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::controller::{PlaybackController, PlaybackEffect};
use crate::error::SessionError;
use crate::recorder::LiveFeed;

/// Broadcast channel capacity for session events.
const EVENT_CAPACITY: usize = 256;

/// An open playback session.
pub struct PlaybackSession {
    shared: Arc<SessionShared>,
}

struct SessionShared {
    state: Mutex<SessionState>,
    narration: NarrationHandle,
    narration_status: NarrationStatus,
    preferences: PreferenceService,
    events: broadcast::Sender<SessionEvent>,
}

struct SessionState {
    controller: PlaybackController,
    voice_enabled: bool,
    ticker: Option<JoinHandle<()>>,
    /// Bumped on every ticker stop; a ticker holding an older value exits.
    ticker_generation: u64,
    live: Option<JoinHandle<()>>,
    narration_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl PlaybackSession {
    /// Open a session on tokio's clock.
    pub async fn open(
        config: SessionConfig,
        speech: Arc<dyn SpeechPort>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Result<Self, SessionError> {
        Self::open_with_clock(config, speech, preferences, Arc::new(TokioClock)).await
    }

    /// Open a session with an explicit narration clock.
    pub async fn open_with_clock(
        config: SessionConfig,
        speech: Arc<dyn SpeechPort>,
        preferences: Arc<dyn PreferenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let preferences = PreferenceService::new(preferences);
        let preference = preferences.load().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load preferences, using defaults");
            UserPreference::default()
        });

        let adapter = SpeechAdapter::detect(speech, config.narration.volume).await;
        let narration_status = adapter.status().clone();
        let (narration, narration_task) = NarrationHandle::spawn(
            adapter,
            config.narration,
            clock,
            preference.voice_enabled,
            preference.speed.factor(),
        )?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!(
            voice_enabled = preference.voice_enabled,
            speed = %preference.speed,
            narration_available = narration_status.is_available(),
            "Playback session opened"
        );

        Ok(Self {
            shared: Arc::new(SessionShared {
                state: Mutex::new(SessionState {
                    controller: PlaybackController::new(config.playback, preference.speed),
                    voice_enabled: preference.voice_enabled,
                    ticker: None,
                    ticker_generation: 0,
                    live: None,
                    narration_task: Some(narration_task),
                    closed: false,
                }),
                narration,
                narration_status,
                preferences,
                events,
            }),
        })
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.lock().controller.snapshot()
    }

    pub fn current_step(&self) -> Option<Step> {
        self.shared.lock().controller.current_step().cloned()
    }

    pub fn trace(&self) -> Option<Trace> {
        self.shared.lock().controller.trace().cloned()
    }

    pub fn voice_enabled(&self) -> bool {
        self.shared.lock().voice_enabled
    }

    /// Whether the speech service was found at open. An unavailable service
    /// is reported once, in the log, and narration stays silent.
    pub fn narration_status(&self) -> &NarrationStatus {
        &self.shared.narration_status
    }

    /// The narration scheduler, for diagnostics.
    pub fn narration(&self) -> &NarrationHandle {
        &self.shared.narration
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    // ── Controls ───────────────────────────────────────────────────

    /// Replace the trace. Stops following a live recording.
    pub fn load(&self, trace: Trace) -> Result<(), SessionError> {
        self.shared.control(|state| {
            state.stop_live();
            state.controller.load(trace)
        })
    }

    /// Follow a live recording: every published snapshot replaces the trace
    /// and moves to its newest step.
    pub fn follow_live(&self, mut feed: LiveFeed) -> Result<(), SessionError> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(SessionError::Closed);
        }
        state.stop_live();

        let shared = Arc::downgrade(&self.shared);
        let trace_id = feed.trace_id();
        state.live = Some(tokio::spawn(async move {
            while let Some(snapshot) = feed.recv().await {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                if shared
                    .control(|state| state.controller.advance_live(snapshot))
                    .is_err()
                {
                    return;
                }
            }
            debug!(%trace_id, "Live recording finished");
        }));
        Ok(())
    }

    pub fn play(&self) -> Result<(), SessionError> {
        self.shared.control(|state| state.controller.play())
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        self.shared.control(|state| state.controller.pause())
    }

    pub fn step_forward(&self) -> Result<(), SessionError> {
        self.shared.control(|state| state.controller.step_forward())
    }

    pub fn step_backward(&self) -> Result<(), SessionError> {
        self.shared.control(|state| state.controller.step_backward())
    }

    pub fn seek(&self, index: usize) -> Result<(), SessionError> {
        self.shared.control(|state| state.controller.seek(index))
    }

    pub fn reset(&self) -> Result<(), SessionError> {
        self.shared.control(|state| state.controller.reset())
    }

    /// Change speed and persist it. A persistence failure is logged only.
    pub async fn set_speed(&self, preset: SpeedPreset) -> Result<(), SessionError> {
        self.shared
            .control(|state| state.controller.set_speed(preset))?;

        if let Err(e) = self.shared.preferences.set_speed(preset).await {
            warn!(error = %e, "Failed to persist speed preference");
        }
        Ok(())
    }

    /// Toggle voice and persist it. Disabling cancels all narration.
    pub async fn set_voice_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(SessionError::Closed);
            }
            state.voice_enabled = enabled;
            absorb(self.shared.narration.set_enabled(enabled));
            self.shared.publish(SessionEvent::VoiceToggled { enabled });
        }

        if let Err(e) = self.shared.preferences.set_voice_enabled(enabled).await {
            warn!(error = %e, "Failed to persist voice preference");
        }
        Ok(())
    }

    /// Stop everything and wait for narration to shut down. Idempotent.
    pub async fn close(&self) {
        let narration_task = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.stop_ticker();
            state.stop_live();
            state.narration_task.take()
        };

        self.shared.narration.shutdown();
        if let Some(task) = narration_task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Narration task ended abnormally");
        }

        self.shared.publish(SessionEvent::Closed);
        info!("Playback session closed");
    }
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a controller operation and apply its effects atomically.
    fn control(
        self: &Arc<Self>,
        op: impl FnOnce(&mut SessionState) -> Vec<PlaybackEffect>,
    ) -> Result<(), SessionError> {
        let mut state = self.lock();
        if state.closed {
            return Err(SessionError::Closed);
        }
        let effects = op(&mut state);
        self.apply(&mut state, effects);
        Ok(())
    }

    /// One ticker beat. Returns whether the ticker should keep running.
    fn tick(self: &Arc<Self>, generation: u64) -> bool {
        let mut state = self.lock();
        if state.closed || state.ticker_generation != generation {
            return false;
        }
        let effects = state.controller.tick();
        self.apply(&mut state, effects);
        state.controller.is_playing()
    }

    fn apply(self: &Arc<Self>, state: &mut SessionState, effects: Vec<PlaybackEffect>) {
        for effect in effects {
            match effect {
                PlaybackEffect::TraceLoaded {
                    trace_id,
                    total_steps,
                } => {
                    info!(%trace_id, total_steps, "Trace loaded");
                    self.publish(SessionEvent::TraceLoaded {
                        trace_id,
                        total_steps,
                    });
                }
                PlaybackEffect::StepTransition(transition) => {
                    if !transition.narration_text.trim().is_empty() {
                        let origin = NarrationOrigin {
                            trace_id: transition.trace_id,
                            step_index: transition.step_index,
                        };
                        absorb(self.narration.enqueue_for_step(
                            transition.narration_text.clone(),
                            transition.priority,
                            origin,
                        ));
                    }
                    self.publish(SessionEvent::StepTransition { transition });
                }
                PlaybackEffect::FlushNarration {
                    scope,
                    cancel_in_flight,
                } => absorb(self.narration.flush(scope, cancel_in_flight)),
                PlaybackEffect::StartTicker { interval } => {
                    state.start_ticker(Arc::downgrade(self), interval);
                }
                PlaybackEffect::StopTicker => state.stop_ticker(),
                PlaybackEffect::SpeedChanged { preset } => {
                    debug!(%preset, "Playback speed changed");
                    absorb(self.narration.set_rate(preset.factor()));
                }
                PlaybackEffect::StateChanged(snapshot) => {
                    self.publish(SessionEvent::StateChanged { snapshot });
                }
            }
        }
    }

    fn publish(&self, event: SessionEvent) {
        if self.events.receiver_count() > 0 {
            let _ = self.events.send(event);
        }
    }
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.stop_ticker();
        state.stop_live();
        self.narration.shutdown();
    }
}

impl SessionState {
    fn start_ticker(&mut self, shared: Weak<SessionShared>, interval: Duration) {
        self.stop_ticker();
        let generation = self.ticker_generation;
        self.ticker = Some(tokio::spawn(run_ticker(shared, generation, interval)));
    }

    fn stop_ticker(&mut self) {
        self.ticker_generation += 1;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn stop_live(&mut self) {
        if let Some(live) = self.live.take() {
            live.abort();
        }
    }
}

async fn run_ticker(shared: Weak<SessionShared>, generation: u64, interval: Duration) {
    let mut ticks = tokio::time::interval_at(Instant::now() + interval, interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.tick(generation) {
            return;
        }
    }
}

/// Narration is best-effort; a stopped scheduler never fails playback.
fn absorb(result: Result<(), NarrationError>) {
    if let Err(e) = result {
        debug!(error = %e, "Narration request dropped");
    }
}
