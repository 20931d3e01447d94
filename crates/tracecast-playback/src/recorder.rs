//! Step recording for algorithm simulators.
//!
//! Simulators know nothing about playback. They call `emit_step` once per
//! interesting moment and check the returned [`ControlFlow`]: `Break` means
//! the run was cancelled and they should unwind without emitting more.
//!
//! - [`TraceRecorder`]: batch mode. The simulator runs to completion and the
//!   full [`Trace`] exists before playback starts, so it can be seeked.
//! - [`LiveRecorder`]: live mode. Every step is published as a prefix
//!   snapshot through a [`LiveFeed`] and the simulator is suspended for an
//!   advisory delay, so the order of emission is visible as it happens.
//!
//! Both produce steps of the same shape.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracecast_core::{Priority, StepPayload, Trace, TraceBuilder, TraceId};

/// Batch-mode recorder.
#[derive(Debug)]
pub struct TraceRecorder {
    builder: TraceBuilder,
    cancel: CancellationToken,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Recorder that stops accepting steps once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            builder: TraceBuilder::new(),
            cancel,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TraceId {
        self.builder.id()
    }

    /// Steps recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.builder.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record one step. `priority` defaults to `Normal`.
    pub fn emit_step(
        &mut self,
        payload: impl Into<StepPayload>,
        label: impl Into<String>,
        priority: Option<Priority>,
    ) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        self.builder
            .push(payload.into(), label, priority.unwrap_or_default());
        ControlFlow::Continue(())
    }

    /// The recorded trace. Runs that emitted nothing get a single summary
    /// step; a cancelled run keeps whatever it recorded.
    #[must_use]
    pub fn finish(self) -> Trace {
        self.builder.finish()
    }
}

/// Run `simulate` to completion in batch mode and return its trace.
pub fn record_batch<F>(simulate: F) -> Trace
where
    F: FnOnce(&mut TraceRecorder),
{
    let mut recorder = TraceRecorder::new();
    simulate(&mut recorder);
    let trace = recorder.finish();
    tracing::debug!(trace_id = %trace.id(), steps = trace.len(), "Batch run recorded");
    trace
}

/// Receiving end of a live recording.
///
/// Yields ever-longer snapshots of the same run. Ends when the recorder is
/// dropped or finished.
#[derive(Debug)]
pub struct LiveFeed {
    trace_id: TraceId,
    rx: mpsc::UnboundedReceiver<Trace>,
}

impl LiveFeed {
    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Next snapshot, or `None` once recording is over.
    pub async fn recv(&mut self) -> Option<Trace> {
        self.rx.recv().await
    }
}

/// Live-mode recorder.
#[derive(Debug)]
pub struct LiveRecorder {
    builder: TraceBuilder,
    cancel: CancellationToken,
    delay: Duration,
    feed: mpsc::UnboundedSender<Trace>,
}

impl LiveRecorder {
    /// Create a recorder that pauses `delay` after every step.
    #[must_use]
    pub fn new(delay: Duration) -> (Self, LiveFeed) {
        Self::with_cancellation(delay, CancellationToken::new())
    }

    #[must_use]
    pub fn with_cancellation(delay: Duration, cancel: CancellationToken) -> (Self, LiveFeed) {
        let builder = TraceBuilder::new();
        let (feed, rx) = mpsc::unbounded_channel();
        let live = LiveFeed {
            trace_id: builder.id(),
            rx,
        };
        (
            Self {
                builder,
                cancel,
                delay,
                feed,
            },
            live,
        )
    }

    #[must_use]
    pub const fn id(&self) -> TraceId {
        self.builder.id()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.builder.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    /// Token that cancels this run.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Record and publish one step, then suspend for the advisory delay.
    ///
    /// Cancellation during the delay wakes the simulator immediately with
    /// `Break`.
    pub async fn emit_step(
        &mut self,
        payload: impl Into<StepPayload>,
        label: impl Into<String>,
        priority: Option<Priority>,
    ) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        self.builder
            .push(payload.into(), label, priority.unwrap_or_default());
        self.publish();

        tokio::select! {
            () = self.cancel.cancelled() => ControlFlow::Break(()),
            () = tokio::time::sleep(self.delay) => ControlFlow::Continue(()),
        }
    }

    /// Close the feed and return the trace. An empty run publishes its
    /// summary step first.
    #[must_use]
    pub fn finish(self) -> Trace {
        let was_empty = self.builder.is_empty();
        let trace = self.builder.finish();
        if was_empty {
            let _ = self.feed.send(trace.clone());
        }
        trace
    }

    fn publish(&self) {
        if let Some(snapshot) = self.builder.snapshot() {
            // A closed feed just means nobody is watching.
            let _ = self.feed.send(snapshot);
        }
    }
}
