//! Narration scheduler state machine.
//!
//! [`SchedulerCore`] decides *when* the next utterance may start. It owns the
//! [`NarrationQueue`] and the speech slot, but performs no I/O: the actor in
//! [`crate::service`] feeds it commands, speech events and the current time,
//! and carries out the [`PollDecision`]s it returns.
//!
//! # Invariants
//!
//! - At most one utterance holds the slot. Nothing is dispatched unless the
//!   slot is [`SlotStatus::Idle`].
//! - Consecutive dispatch starts are at least `min_interval` apart, except
//!   right after a cancellation, which clears the pacing timestamp.
//! - A cancelled utterance that never acknowledges its stop gives the slot
//!   back after `cancel_grace`.

use std::time::{Duration, Instant};

use tracecast_core::{NarrationConfig, Priority, SpeechError, SpeechEvent, SpeechEventKind};
use tracecast_core::{SpeedPreset, UtteranceHandle};
use tracing::{debug, warn};

use crate::error::NarrationError;
use crate::queue::{EnqueueOutcome, FlushScope, NarrationOrigin, NarrationQueue, NarrationRequest};
use crate::text::dedupe_key;

/// Occupancy of the single speech slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotStatus {
    #[default]
    Idle,
    /// Accepted by the speech service, not yet audible.
    Dispatching,
    Speaking,
    /// Stop requested, waiting for acknowledgement or the grace deadline.
    Cancelling,
}

/// What the driver should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum PollDecision {
    /// Nothing to do until a command or speech event arrives.
    Park,
    /// Poll again after this long.
    Wait(Duration),
    /// Hand this text to the speech service now.
    Dispatch { text: String, rate: f32 },
}

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSnapshot {
    pub slot: SlotStatus,
    pub queue_len: usize,
    pub enabled: bool,
    pub rate: f32,
    /// Whether the speech service was detected at startup.
    pub available: bool,
}

#[derive(Debug, Clone)]
struct InFlight {
    handle: Option<UtteranceHandle>,
    request: NarrationRequest,
}

/// Pure narration scheduling state.
#[derive(Debug, Clone)]
pub struct SchedulerCore {
    config: NarrationConfig,
    queue: NarrationQueue,
    slot: SlotStatus,
    in_flight: Option<InFlight>,
    last_dispatch_started_at: Option<Instant>,
    cancel_deadline: Option<Instant>,
    retry_after: Option<Instant>,
    enabled: bool,
    rate: f32,
}

impl SchedulerCore {
    #[must_use]
    pub const fn new(config: NarrationConfig, enabled: bool, rate: f32) -> Self {
        Self {
            queue: NarrationQueue::new(config.ttl),
            config,
            slot: SlotStatus::Idle,
            in_flight: None,
            last_dispatch_started_at: None,
            cancel_deadline: None,
            retry_after: None,
            enabled,
            rate,
        }
    }

    #[must_use]
    pub const fn slot(&self) -> SlotStatus {
        self.slot
    }

    #[must_use]
    pub const fn queue(&self) -> &NarrationQueue {
        &self.queue
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn rate(&self) -> f32 {
        self.rate
    }

    /// Handle of the utterance currently holding the slot, if known.
    #[must_use]
    pub fn in_flight_handle(&self) -> Option<UtteranceHandle> {
        self.in_flight.as_ref().and_then(|f| f.handle)
    }

    #[must_use]
    pub fn snapshot(&self, available: bool) -> SchedulerSnapshot {
        SchedulerSnapshot {
            slot: self.slot,
            queue_len: self.queue.len(),
            enabled: self.enabled,
            rate: self.rate,
            available,
        }
    }

    /// Queue narration. A no-op while voice is disabled, and coalesced
    /// against both pending requests and the utterance being spoken.
    pub fn enqueue(
        &mut self,
        text: &str,
        priority: Priority,
        origin: Option<NarrationOrigin>,
        now: Instant,
    ) -> EnqueueOutcome {
        if !self.enabled {
            return EnqueueOutcome::Muted;
        }

        if self.slot != SlotStatus::Cancelling
            && let Some(in_flight) = &self.in_flight
            && in_flight.request.dedupe_key == dedupe_key(text)
        {
            return EnqueueOutcome::Coalesced;
        }

        self.queue.enqueue(text, priority, origin, now)
    }

    /// Decide the next step.
    pub fn poll(&mut self, now: Instant) -> PollDecision {
        self.reclaim_if_overdue(now);

        let expired = self.queue.purge_expired(now);
        if expired > 0 {
            debug!(error = %NarrationError::StaleRequest { count: expired }, "Narration expired");
        }

        if !self.enabled || self.queue.is_empty() {
            return match self.cancel_deadline {
                Some(deadline) => PollDecision::Wait(deadline.saturating_duration_since(now)),
                None => PollDecision::Park,
            };
        }

        if let Some(last) = self.last_dispatch_started_at {
            let since = now.saturating_duration_since(last);
            if since < self.config.min_interval {
                return PollDecision::Wait(self.config.min_interval - since);
            }
        }

        if self.slot != SlotStatus::Idle {
            let backoff = self.config.busy_backoff;
            return PollDecision::Wait(match self.cancel_deadline {
                Some(deadline) => backoff.min(deadline.saturating_duration_since(now)),
                None => backoff,
            });
        }

        if let Some(retry_after) = self.retry_after {
            if now < retry_after {
                return PollDecision::Wait(retry_after - now);
            }
            self.retry_after = None;
        }

        let Some(request) = self.queue.dequeue(now) else {
            return PollDecision::Park;
        };

        let text = request.text.clone();
        self.slot = SlotStatus::Dispatching;
        self.in_flight = Some(InFlight {
            handle: None,
            request,
        });
        PollDecision::Dispatch {
            text,
            rate: self.rate,
        }
    }

    /// The speech service accepted the dispatched text.
    pub fn dispatch_accepted(&mut self, handle: UtteranceHandle, now: Instant) {
        if let Some(in_flight) = &mut self.in_flight {
            in_flight.handle = Some(handle);
        }
        self.last_dispatch_started_at = Some(now);
        debug!(%handle, "Narration dispatched");
    }

    /// The speech service refused the dispatched text.
    ///
    /// `Busy` puts the request back at the head and retries after the
    /// backoff; anything else drops it.
    pub fn dispatch_failed(&mut self, error: &SpeechError, now: Instant) {
        self.slot = SlotStatus::Idle;
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };

        if matches!(error, SpeechError::Busy) {
            debug!(error = %NarrationError::ResourceBusy, "Narration deferred");
            self.queue.requeue_front(in_flight.request);
            self.retry_after = Some(now + self.config.busy_backoff);
        } else {
            warn!(%error, text = %in_flight.request.text, "Narration dropped");
        }
    }

    /// Apply a speech lifecycle event. Events for anything but the current
    /// utterance are ignored.
    pub fn on_speech_event(&mut self, event: &SpeechEvent) {
        if self.in_flight_handle() != Some(event.handle) {
            debug!(handle = %event.handle, kind = ?event.kind, "Ignoring stale speech event");
            return;
        }

        match &event.kind {
            SpeechEventKind::Started => {
                if self.slot == SlotStatus::Dispatching {
                    self.slot = SlotStatus::Speaking;
                }
            }
            SpeechEventKind::Ended | SpeechEventKind::Stopped => self.release(),
            SpeechEventKind::Failed(reason) => {
                warn!(handle = %event.handle, %reason, "Utterance failed");
                self.release();
            }
        }
    }

    /// Stop everything: clear the queue and cancel the current utterance.
    ///
    /// Returns the handle the driver must ask the speech service to stop.
    pub fn cancel_all(&mut self, now: Instant) -> Option<UtteranceHandle> {
        let dropped = self.queue.clear();
        self.retry_after = None;
        debug!(dropped, "Narration cancelled");
        self.cancel_current(now)
    }

    /// Drop pending narration in `scope`, optionally cancelling the current
    /// utterance when it falls inside the scope too.
    pub fn flush(
        &mut self,
        scope: &FlushScope,
        cancel_in_flight: bool,
        now: Instant,
    ) -> Option<UtteranceHandle> {
        let dropped = self.queue.flush(scope);
        if dropped > 0 {
            debug!(dropped, ?scope, "Narration flushed");
        }

        let in_scope = self
            .in_flight
            .as_ref()
            .is_some_and(|f| scope.matches(&f.request));
        if cancel_in_flight && in_scope {
            self.cancel_current(now)
        } else {
            None
        }
    }

    /// Change the speaking rate.
    ///
    /// An utterance already playing is restarted at the new rate: it is
    /// cancelled and its text re-queued as `High`. Returns the handle to stop.
    pub fn set_rate(&mut self, rate: f32, now: Instant) -> Option<UtteranceHandle> {
        if (rate - self.rate).abs() < f32::EPSILON {
            return None;
        }
        self.rate = rate;
        debug!(rate, speed = %SpeedPreset::nearest(rate), "Narration rate changed");

        if !matches!(self.slot, SlotStatus::Dispatching | SlotStatus::Speaking) {
            return None;
        }
        let request = self.in_flight.as_ref()?.request.clone();
        let handle = self.cancel_current(now);
        self.queue.restart(request, now);
        handle
    }

    /// Turn voice on or off. Disabling is a full [`Self::cancel_all`].
    pub fn set_enabled(&mut self, enabled: bool, now: Instant) -> Option<UtteranceHandle> {
        self.enabled = enabled;
        if enabled {
            None
        } else {
            self.cancel_all(now)
        }
    }

    fn cancel_current(&mut self, now: Instant) -> Option<UtteranceHandle> {
        // A cancellation permits an immediate next dispatch.
        self.last_dispatch_started_at = None;

        match self.slot {
            SlotStatus::Idle | SlotStatus::Cancelling => None,
            SlotStatus::Dispatching | SlotStatus::Speaking => {
                let Some(handle) = self.in_flight_handle() else {
                    self.release();
                    return None;
                };
                self.slot = SlotStatus::Cancelling;
                self.cancel_deadline = Some(now + self.config.cancel_grace);
                Some(handle)
            }
        }
    }

    fn reclaim_if_overdue(&mut self, now: Instant) {
        let Some(deadline) = self.cancel_deadline else {
            return;
        };
        if self.slot != SlotStatus::Cancelling || now < deadline {
            return;
        }

        if let Some(handle) = self.in_flight_handle() {
            let error = NarrationError::CancellationRace {
                handle,
                grace_ms: self.config.cancel_grace.as_millis(),
            };
            warn!(%error, "Reclaiming speech slot");
        }
        self.release();
    }

    fn release(&mut self) {
        self.slot = SlotStatus::Idle;
        self.in_flight = None;
        self.cancel_deadline = None;
    }
}
