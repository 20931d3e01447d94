//! VCR-style playback state machine.
//!
//! [`PlaybackController`] is synchronous and owns no timers. Every operation
//! mutates the state and returns the [`PlaybackEffect`]s the session must
//! carry out (start or stop the ticker, flush narration, publish events).
//! That keeps every index transition testable without a runtime.
//!
//! Operations on a controller with no trace loaded are no-ops and return no
//! effects.

use std::time::Duration;

use tracecast_core::{
    PlaybackConfig, PlaybackSnapshot, SeekBehavior, SpeedPreset, Step, StepTransition, Trace,
    TraceId,
};
use tracecast_narration::FlushScope;

/// Something the session has to do after a controller operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEffect {
    /// A new trace replaced the previous one.
    TraceLoaded { trace_id: TraceId, total_steps: usize },
    /// The current step changed.
    StepTransition(StepTransition),
    /// Drop queued narration, optionally stopping the current utterance.
    FlushNarration {
        scope: FlushScope,
        cancel_in_flight: bool,
    },
    /// (Re)start auto-advance at this interval.
    StartTicker { interval: Duration },
    StopTicker,
    SpeedChanged { preset: SpeedPreset },
    StateChanged(PlaybackSnapshot),
}

/// Playback state over one loaded trace.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    config: PlaybackConfig,
    trace: Option<Trace>,
    current_index: usize,
    is_playing: bool,
    speed: SpeedPreset,
}

impl PlaybackController {
    #[must_use]
    pub const fn new(config: PlaybackConfig, speed: SpeedPreset) -> Self {
        Self {
            config,
            trace: None,
            current_index: 0,
            is_playing: false,
            speed,
        }
    }

    #[must_use]
    pub const fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.is_playing
    }

    #[must_use]
    pub const fn speed(&self) -> SpeedPreset {
        self.speed
    }

    /// Step at the current index.
    #[must_use]
    pub fn current_step(&self) -> Option<&Step> {
        self.trace.as_ref()?.get(self.current_index)
    }

    /// Auto-advance interval at the current speed.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.config.base_interval.div_f32(self.speed.factor())
    }

    #[must_use]
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            trace_id: self.trace.as_ref().map(Trace::id),
            current_index: self.current_index,
            total_steps: self.trace.as_ref().map_or(0, Trace::len),
            is_playing: self.is_playing,
            speed: self.speed,
        }
    }

    /// Replace the trace, rewind to 0 and pause. Narration belonging to the
    /// previous trace is flushed and its current utterance cancelled.
    pub fn load(&mut self, trace: Trace) -> Vec<PlaybackEffect> {
        let mut effects = self.stop_effects();
        if let Some(previous) = &self.trace {
            effects.push(PlaybackEffect::FlushNarration {
                scope: FlushScope::Trace(previous.id()),
                cancel_in_flight: true,
            });
        }

        effects.push(PlaybackEffect::TraceLoaded {
            trace_id: trace.id(),
            total_steps: trace.len(),
        });
        self.trace = Some(trace);
        self.current_index = 0;

        effects.extend(self.transition_effect());
        effects.push(self.state_changed());
        effects
    }

    /// Take a longer snapshot of the trace being recorded live and jump to
    /// its newest step. A snapshot of a different run is loaded instead.
    pub fn advance_live(&mut self, snapshot: Trace) -> Vec<PlaybackEffect> {
        let same_run = self
            .trace
            .as_ref()
            .is_some_and(|current| current.id() == snapshot.id());

        if same_run {
            if !self
                .trace
                .as_ref()
                .is_some_and(|current| current.is_extended_by(&snapshot))
            {
                return Vec::new();
            }
            self.current_index = snapshot.last_index();
            self.trace = Some(snapshot);

            let mut effects: Vec<_> = self.transition_effect().into_iter().collect();
            effects.push(self.state_changed());
            return effects;
        }

        let last = snapshot.last_index();
        let mut effects = self.load(snapshot);
        if last > 0 {
            self.current_index = last;
            effects.extend(self.transition_effect());
            effects.push(self.state_changed());
        }
        effects
    }

    /// Start auto-advance. No-op at the last step or when already playing.
    pub fn play(&mut self) -> Vec<PlaybackEffect> {
        let Some(trace) = &self.trace else {
            return Vec::new();
        };
        if self.is_playing || self.current_index >= trace.last_index() {
            return Vec::new();
        }

        self.is_playing = true;
        vec![
            PlaybackEffect::StartTicker {
                interval: self.tick_interval(),
            },
            self.state_changed(),
        ]
    }

    /// Stop auto-advance. Idempotent.
    pub fn pause(&mut self) -> Vec<PlaybackEffect> {
        let mut effects = self.stop_effects();
        if !effects.is_empty() {
            effects.push(self.state_changed());
        }
        effects
    }

    /// One auto-advance step. Stops itself on reaching the last index.
    pub fn tick(&mut self) -> Vec<PlaybackEffect> {
        let Some(trace) = &self.trace else {
            return Vec::new();
        };
        if !self.is_playing {
            return Vec::new();
        }

        let last = trace.last_index();
        let mut effects = Vec::new();
        if self.current_index < last {
            self.current_index += 1;
            effects.extend(self.transition_effect());
        }
        if self.current_index >= last {
            effects.extend(self.stop_effects());
        }
        effects.push(self.state_changed());
        effects
    }

    /// Pause, then move one step forward if possible.
    pub fn step_forward(&mut self) -> Vec<PlaybackEffect> {
        let Some(trace) = &self.trace else {
            return Vec::new();
        };
        let last = trace.last_index();

        let mut effects = self.stop_effects();
        if self.current_index < last {
            self.current_index += 1;
            effects.extend(self.transition_effect());
        }
        if !effects.is_empty() {
            effects.push(self.state_changed());
        }
        effects
    }

    /// Pause, then move one step back if possible.
    pub fn step_backward(&mut self) -> Vec<PlaybackEffect> {
        if self.trace.is_none() {
            return Vec::new();
        }

        let mut effects = self.stop_effects();
        if self.current_index > 0 {
            self.current_index -= 1;
            effects.extend(self.transition_effect());
        }
        if !effects.is_empty() {
            effects.push(self.state_changed());
        }
        effects
    }

    /// Jump to `index` (clamped).
    ///
    /// Queued narration for every step from the start of the trace up to the
    /// further of the old and new positions is flushed, so nothing skipped
    /// over can still be spoken. The utterance already playing is left
    /// alone. Running playback pauses unless configured to keep going.
    pub fn seek(&mut self, index: usize) -> Vec<PlaybackEffect> {
        let Some(trace) = &self.trace else {
            return Vec::new();
        };
        let target = trace.clamp_index(index);
        if target == self.current_index {
            return Vec::new();
        }

        let mut effects = vec![PlaybackEffect::FlushNarration {
            scope: FlushScope::Steps {
                trace_id: trace.id(),
                range: 0..=target.max(self.current_index),
            },
            cancel_in_flight: false,
        }];
        if self.config.seek_behavior == SeekBehavior::Pause {
            effects.extend(self.stop_effects());
        }

        self.current_index = target;
        effects.extend(self.transition_effect());
        if self.is_playing && self.current_index >= self.trace.as_ref().map_or(0, Trace::last_index) {
            effects.extend(self.stop_effects());
        }
        effects.push(self.state_changed());
        effects
    }

    /// Change speed. A running ticker is restarted at the new interval.
    pub fn set_speed(&mut self, preset: SpeedPreset) -> Vec<PlaybackEffect> {
        if preset == self.speed {
            return Vec::new();
        }
        self.speed = preset;

        let mut effects = vec![PlaybackEffect::SpeedChanged { preset }];
        if self.is_playing {
            effects.push(PlaybackEffect::StartTicker {
                interval: self.tick_interval(),
            });
        }
        effects.push(self.state_changed());
        effects
    }

    /// Change speed from a raw factor, snapped to the nearest preset.
    pub fn set_speed_factor(&mut self, factor: f32) -> Vec<PlaybackEffect> {
        self.set_speed(SpeedPreset::nearest(factor))
    }

    /// Pause, rewind to 0 and drop all of this trace's narration, including
    /// the current utterance.
    pub fn reset(&mut self) -> Vec<PlaybackEffect> {
        let Some(trace) = &self.trace else {
            return Vec::new();
        };

        let mut effects = vec![PlaybackEffect::FlushNarration {
            scope: FlushScope::Trace(trace.id()),
            cancel_in_flight: true,
        }];
        effects.extend(self.stop_effects());
        if self.current_index != 0 {
            self.current_index = 0;
            effects.extend(self.transition_effect());
        }
        effects.push(self.state_changed());
        effects
    }

    fn stop_effects(&mut self) -> Vec<PlaybackEffect> {
        if self.is_playing {
            self.is_playing = false;
            vec![PlaybackEffect::StopTicker]
        } else {
            Vec::new()
        }
    }

    fn transition_effect(&self) -> Option<PlaybackEffect> {
        let trace = self.trace.as_ref()?;
        let step = trace.get(self.current_index)?;
        Some(PlaybackEffect::StepTransition(StepTransition {
            trace_id: trace.id(),
            step_index: step.index,
            total_steps: trace.len(),
            narration_text: step.label.clone(),
            priority: step.priority,
        }))
    }

    fn state_changed(&self) -> PlaybackEffect {
        PlaybackEffect::StateChanged(self.snapshot())
    }
}
