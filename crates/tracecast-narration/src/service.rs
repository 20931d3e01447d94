//! Narration scheduler task.
//!
//! One tokio task owns the [`SchedulerCore`] and the [`SpeechAdapter`]; the
//! rest of the process talks to it through a cloneable [`NarrationHandle`].
//! The task sleeps only when the core asks it to wait, so an idle scheduler
//! with an empty queue holds no timer.
//!
//! When the task ends (shutdown command, every handle dropped, or the
//! runtime going away) the in-flight utterance is stopped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracecast_core::{Clock, NarrationConfig, Priority, SpeechEvent};
use tracing::{debug, info};

use crate::adapter::SpeechAdapter;
use crate::error::NarrationError;
use crate::queue::{EnqueueOutcome, FlushScope, NarrationOrigin};
use crate::scheduler::{PollDecision, SchedulerCore, SchedulerSnapshot};

// ── Commands ───────────────────────────────────────────────────────

enum NarrationCommand {
    Enqueue {
        text: String,
        priority: Priority,
        origin: Option<NarrationOrigin>,
    },
    Flush {
        scope: FlushScope,
        cancel_in_flight: bool,
    },
    CancelAll,
    SetRate(f32),
    SetEnabled(bool),
    Snapshot {
        reply: oneshot::Sender<SchedulerSnapshot>,
    },
    Shutdown,
}

// ── Handle ─────────────────────────────────────────────────────────

/// Cloneable handle to the narration scheduler task.
///
/// Every method except [`Self::snapshot`] is fire-and-forget; narration never
/// makes a caller wait. Calls after shutdown return
/// [`NarrationError::Closed`].
#[derive(Clone)]
pub struct NarrationHandle {
    cmd_tx: mpsc::UnboundedSender<NarrationCommand>,
}

impl NarrationHandle {
    /// Validate `config` and spawn the scheduler task.
    ///
    /// `enabled` and `rate` are the initial voice toggle and speaking rate,
    /// usually taken from the stored user preference.
    pub fn spawn(
        adapter: SpeechAdapter,
        config: NarrationConfig,
        clock: Arc<dyn Clock>,
        enabled: bool,
        rate: f32,
    ) -> Result<(Self, JoinHandle<()>), NarrationError> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let actor = SchedulerActor {
            core: SchedulerCore::new(config, enabled, rate),
            adapter,
            clock,
            cmd_rx,
            event_tx,
            event_rx,
        };
        let task = tokio::spawn(actor.run());

        Ok((Self { cmd_tx }, task))
    }

    /// Queue narration with no step origin.
    pub fn enqueue(&self, text: impl Into<String>, priority: Priority) -> Result<(), NarrationError> {
        self.send(NarrationCommand::Enqueue {
            text: text.into(),
            priority,
            origin: None,
        })
    }

    /// Queue narration for a specific step, so it can later be flushed by
    /// trace or step range.
    pub fn enqueue_for_step(
        &self,
        text: impl Into<String>,
        priority: Priority,
        origin: NarrationOrigin,
    ) -> Result<(), NarrationError> {
        self.send(NarrationCommand::Enqueue {
            text: text.into(),
            priority,
            origin: Some(origin),
        })
    }

    /// Drop queued narration in `scope`.
    pub fn flush(&self, scope: FlushScope, cancel_in_flight: bool) -> Result<(), NarrationError> {
        self.send(NarrationCommand::Flush {
            scope,
            cancel_in_flight,
        })
    }

    /// Clear the queue and stop the current utterance.
    pub fn cancel_all(&self) -> Result<(), NarrationError> {
        self.send(NarrationCommand::CancelAll)
    }

    /// Change the speaking rate, restarting the current utterance.
    pub fn set_rate(&self, rate: f32) -> Result<(), NarrationError> {
        self.send(NarrationCommand::SetRate(rate))
    }

    /// Toggle voice. Disabling cancels everything and mutes enqueues.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), NarrationError> {
        self.send(NarrationCommand::SetEnabled(enabled))
    }

    /// Current scheduler state.
    pub async fn snapshot(&self) -> Result<SchedulerSnapshot, NarrationError> {
        let (reply, rx) = oneshot::channel();
        self.send(NarrationCommand::Snapshot { reply })?;
        rx.await.map_err(|_| NarrationError::Closed)
    }

    /// Stop the task. The in-flight utterance is stopped on the way out.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(NarrationCommand::Shutdown);
    }

    /// Whether the task has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    fn send(&self, cmd: NarrationCommand) -> Result<(), NarrationError> {
        self.cmd_tx.send(cmd).map_err(|_| NarrationError::Closed)
    }
}

// ── Scheduler task ─────────────────────────────────────────────────

struct SchedulerActor {
    core: SchedulerCore,
    adapter: SpeechAdapter,
    clock: Arc<dyn Clock>,
    cmd_rx: mpsc::UnboundedReceiver<NarrationCommand>,
    event_tx: mpsc::UnboundedSender<SpeechEvent>,
    event_rx: mpsc::UnboundedReceiver<SpeechEvent>,
}

impl SchedulerActor {
    async fn run(mut self) {
        debug!(available = self.adapter.is_available(), "Narration scheduler started");

        loop {
            let wait = self.drive().await;

            // Speech events first, so a command never observes a slot state
            // that an already-delivered event has moved past.
            tokio::select! {
                biased;
                Some(event) = self.event_rx.recv() => self.core.on_speech_event(&event),
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(NarrationCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                () = tokio::time::sleep(wait.unwrap_or(Duration::ZERO)), if wait.is_some() => {}
            }
        }

        info!("Narration scheduler stopped");
    }

    /// Dispatch until the core says to wait or park.
    async fn drive(&mut self) -> Option<Duration> {
        if !self.adapter.is_available() {
            // Unavailable mode: requests are accepted and left to expire.
            return None;
        }

        loop {
            match self.core.poll(self.clock.now()) {
                PollDecision::Park => return None,
                PollDecision::Wait(wait) => return Some(wait),
                PollDecision::Dispatch { text, rate } => {
                    match self.adapter.dispatch(&text, rate, self.event_tx.clone()).await {
                        Ok(handle) => self.core.dispatch_accepted(handle, self.clock.now()),
                        Err(e) => self.core.dispatch_failed(&e, self.clock.now()),
                    }
                }
            }
        }
    }

    fn handle(&mut self, cmd: NarrationCommand) {
        let now = self.clock.now();
        let to_stop = match cmd {
            NarrationCommand::Enqueue {
                text,
                priority,
                origin,
            } => {
                let outcome = self.core.enqueue(&text, priority, origin, now);
                if outcome != EnqueueOutcome::Queued {
                    debug!(?outcome, %text, "Narration not queued");
                }
                None
            }
            NarrationCommand::Flush {
                scope,
                cancel_in_flight,
            } => self.core.flush(&scope, cancel_in_flight, now),
            NarrationCommand::CancelAll => self.core.cancel_all(now),
            NarrationCommand::SetRate(rate) => self.core.set_rate(rate, now),
            NarrationCommand::SetEnabled(enabled) => {
                info!(enabled, "Narration voice toggled");
                self.core.set_enabled(enabled, now)
            }
            NarrationCommand::Snapshot { reply } => {
                let _ = reply.send(self.core.snapshot(self.adapter.is_available()));
                None
            }
            NarrationCommand::Shutdown => None,
        };

        if let Some(handle) = to_stop {
            self.adapter.stop(handle);
        }
    }
}

impl Drop for SchedulerActor {
    fn drop(&mut self) {
        if let Some(handle) = self.core.in_flight_handle() {
            self.adapter.stop(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SlotStatus;
    use crate::testing::RecordingSpeech;
    use tracecast_core::TokioClock;

    async fn spawn(speech: &Arc<RecordingSpeech>) -> (NarrationHandle, JoinHandle<()>) {
        let adapter = SpeechAdapter::detect(speech.clone(), 1.0).await;
        NarrationHandle::spawn(
            adapter,
            NarrationConfig::default(),
            Arc::new(TokioClock),
            true,
            1.0,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_queued_text() {
        let speech = Arc::new(RecordingSpeech::new());
        let (narration, _task) = spawn(&speech).await;

        narration.enqueue("Compare 4 and 7", Priority::Normal).unwrap();
        let snapshot = narration.snapshot().await.unwrap();
        assert_eq!(snapshot.slot, SlotStatus::Speaking);
        assert_eq!(speech.spoken(), vec![("Compare 4 and 7".to_string(), 1.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_in_flight_utterance() {
        let speech = Arc::new(RecordingSpeech::new());
        let (narration, task) = spawn(&speech).await;

        narration.enqueue("Step 1", Priority::Normal).unwrap();
        narration.snapshot().await.unwrap();
        narration.shutdown();
        task.await.unwrap();

        assert_eq!(speech.stops().len(), 1);
        assert_eq!(speech.playing_count(), 0);
        assert!(narration.is_closed());
        assert_eq!(
            narration.enqueue("Step 2", Priority::Normal),
            Err(NarrationError::Closed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_every_handle_ends_task() {
        let speech = Arc::new(RecordingSpeech::new());
        let (narration, task) = spawn(&speech).await;
        drop(narration);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_is_rejected() {
        let speech = Arc::new(RecordingSpeech::new());
        let adapter = SpeechAdapter::detect(speech, 1.0).await;
        let config = NarrationConfig {
            ttl: Duration::ZERO,
            ..NarrationConfig::default()
        };
        let result = NarrationHandle::spawn(adapter, config, Arc::new(TokioClock), true, 1.0);
        assert!(matches!(result, Err(NarrationError::Config(_))));
    }
}
