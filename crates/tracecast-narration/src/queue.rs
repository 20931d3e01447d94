//! Pending narration requests.
//!
//! A pure state machine: every operation takes `now` and nothing here owns
//! a timer. Ordering is by priority, then arrival. Entries older than the
//! TTL are purged on every enqueue and dequeue attempt, so scrubbing far
//! ahead never leaves a backlog of commentary behind.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use tracecast_core::{Priority, TraceId};

use crate::text::{clean_for_speech, dedupe_key};

/// The step a narration request was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NarrationOrigin {
    pub trace_id: TraceId,
    pub step_index: usize,
}

/// One pending piece of narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationRequest {
    /// Text as it will be spoken.
    pub text: String,
    /// Normalized text used for coalescing.
    pub dedupe_key: String,
    pub enqueued_at: Instant,
    pub priority: Priority,
    pub origin: Option<NarrationOrigin>,
}

impl NarrationRequest {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.enqueued_at) > ttl
    }
}

/// What `enqueue` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Added to the queue.
    Queued,
    /// An identical request is already pending; nothing was added.
    Coalesced,
    /// The text has nothing to speak.
    Empty,
    /// Voice is disabled; nothing was added.
    Muted,
}

/// Which requests a flush removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushScope {
    /// Everything.
    All,
    /// Requests produced by one trace.
    Trace(TraceId),
    /// Requests produced by a range of steps of one trace.
    Steps {
        trace_id: TraceId,
        range: RangeInclusive<usize>,
    },
}

impl FlushScope {
    /// Whether `request` falls inside this scope. Requests without an origin
    /// only match [`FlushScope::All`].
    #[must_use]
    pub fn matches(&self, request: &NarrationRequest) -> bool {
        match (self, request.origin) {
            (Self::All, _) => true,
            (Self::Trace(id), Some(origin)) => origin.trace_id == *id,
            (Self::Steps { trace_id, range }, Some(origin)) => {
                origin.trace_id == *trace_id && range.contains(&origin.step_index)
            }
            (_, None) => false,
        }
    }
}

/// Priority-ordered, TTL-bounded narration backlog.
#[derive(Debug, Clone)]
pub struct NarrationQueue {
    entries: VecDeque<NarrationRequest>,
    ttl: Duration,
}

impl NarrationQueue {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            ttl,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending requests in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &NarrationRequest> {
        self.entries.iter()
    }

    /// Whether an unexpired request with this key is pending.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|r| r.dedupe_key == key)
    }

    /// Add a request unless it is empty or duplicates a pending one.
    pub fn enqueue(
        &mut self,
        text: &str,
        priority: Priority,
        origin: Option<NarrationOrigin>,
        now: Instant,
    ) -> EnqueueOutcome {
        self.purge_expired(now);

        let key = dedupe_key(text);
        if key.is_empty() {
            return EnqueueOutcome::Empty;
        }
        if self.contains_key(&key) {
            return EnqueueOutcome::Coalesced;
        }

        self.insert(NarrationRequest {
            text: clean_for_speech(text),
            dedupe_key: key,
            enqueued_at: now,
            priority,
            origin,
        });
        EnqueueOutcome::Queued
    }

    /// Remove and return the next request to speak.
    pub fn dequeue(&mut self, now: Instant) -> Option<NarrationRequest> {
        self.purge_expired(now);
        self.entries.pop_front()
    }

    /// Put a request that could not be dispatched back at the head.
    ///
    /// Its original `enqueued_at` is kept, so the TTL still bounds retries.
    pub fn requeue_front(&mut self, request: NarrationRequest) {
        self.entries.push_front(request);
    }

    /// Re-insert a request as fresh `High` narration, replacing any pending
    /// duplicate.
    pub fn restart(&mut self, mut request: NarrationRequest, now: Instant) {
        self.entries.retain(|r| r.dedupe_key != request.dedupe_key);
        request.enqueued_at = now;
        request.priority = Priority::High;
        self.insert(request);
    }

    /// Drop requests older than the TTL. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|r| !r.is_expired(now, ttl));
        before - self.entries.len()
    }

    /// Drop every request matching `scope`. Returns how many were dropped.
    pub fn flush(&mut self, scope: &FlushScope) -> usize {
        let before = self.entries.len();
        self.entries.retain(|r| !scope.matches(r));
        before - self.entries.len()
    }

    /// Drop everything. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    // Stable: lands behind every entry of equal or higher priority.
    fn insert(&mut self, request: NarrationRequest) {
        let position = self
            .entries
            .iter()
            .position(|r| r.priority < request.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(10);

    fn texts(queue: &NarrationQueue) -> Vec<&str> {
        queue.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_high_priority_jumps_ahead_in_arrival_order() {
        let now = Instant::now();
        let mut queue = NarrationQueue::new(TTL);
        queue.enqueue("a", Priority::Normal, None, now);
        queue.enqueue("b", Priority::Low, None, now);
        queue.enqueue("c", Priority::High, None, now);
        queue.enqueue("d", Priority::High, None, now);
        queue.enqueue("e", Priority::Normal, None, now);

        assert_eq!(texts(&queue), ["c", "d", "a", "e", "b"]);
    }

    #[test]
    fn test_duplicate_is_coalesced() {
        let now = Instant::now();
        let mut queue = NarrationQueue::new(TTL);
        assert_eq!(
            queue.enqueue("Step 1", Priority::Normal, None, now),
            EnqueueOutcome::Queued
        );
        assert_eq!(
            queue.enqueue("step 1!", Priority::High, None, now),
            EnqueueOutcome::Coalesced
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let mut queue = NarrationQueue::new(TTL);
        assert_eq!(
            queue.enqueue("  ", Priority::Normal, None, Instant::now()),
            EnqueueOutcome::Empty
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_expired_entries_purged_on_enqueue_and_dequeue() {
        let start = Instant::now();
        let mut queue = NarrationQueue::new(TTL);
        queue.enqueue("old", Priority::Normal, None, start);

        let later = start + TTL + Duration::from_millis(1);
        queue.enqueue("new", Priority::Normal, None, later);
        assert_eq!(texts(&queue), ["new"]);

        assert!(queue.dequeue(later + TTL + Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_expired_duplicate_does_not_coalesce() {
        let start = Instant::now();
        let mut queue = NarrationQueue::new(TTL);
        queue.enqueue("Step 1", Priority::Normal, None, start);
        let outcome = queue.enqueue("Step 1", Priority::Normal, None, start + TTL * 2);
        assert_eq!(outcome, EnqueueOutcome::Queued);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_flush_by_step_range() {
        let now = Instant::now();
        let trace = TraceId::new();
        let other = TraceId::new();
        let mut queue = NarrationQueue::new(TTL);
        for step_index in 0..5 {
            let origin = NarrationOrigin {
                trace_id: trace,
                step_index,
            };
            queue.enqueue(&format!("Step {step_index}"), Priority::Normal, Some(origin), now);
        }
        queue.enqueue(
            "elsewhere",
            Priority::Normal,
            Some(NarrationOrigin {
                trace_id: other,
                step_index: 1,
            }),
            now,
        );
        queue.enqueue("no origin", Priority::Normal, None, now);

        let removed = queue.flush(&FlushScope::Steps {
            trace_id: trace,
            range: 1..=3,
        });
        assert_eq!(removed, 3);
        assert_eq!(texts(&queue), ["Step 0", "Step 4", "elsewhere", "no origin"]);

        assert_eq!(queue.flush(&FlushScope::Trace(trace)), 2);
        assert_eq!(queue.flush(&FlushScope::All), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_restart_refreshes_and_promotes() {
        let start = Instant::now();
        let mut queue = NarrationQueue::new(TTL);
        queue.enqueue("a", Priority::High, None, start);
        queue.enqueue("b", Priority::Normal, None, start);
        let b = queue.iter().nth(1).cloned().unwrap();

        let later = start + Duration::from_secs(9);
        queue.restart(b, later);
        assert_eq!(texts(&queue), ["a", "b"]);

        let restarted = queue.iter().nth(1).unwrap();
        assert_eq!(restarted.priority, Priority::High);
        assert_eq!(restarted.enqueued_at, later);
    }

    #[test]
    fn test_requeue_front_keeps_age() {
        let start = Instant::now();
        let mut queue = NarrationQueue::new(TTL);
        queue.enqueue("a", Priority::Normal, None, start);
        queue.enqueue("b", Priority::High, None, start);
        let head = queue.dequeue(start).unwrap();
        assert_eq!(head.text, "b");

        queue.requeue_front(head);
        assert_eq!(texts(&queue), ["b", "a"]);
        assert_eq!(queue.purge_expired(start + TTL * 2), 2);
    }
}
