//! Console speech backend.
//!
//! Prints each utterance and holds the "speaker" for roughly the time it
//! would take to say it aloud, so pacing and cancellation behave as they
//! would with a real engine.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracecast_core::{
    SpeechError, SpeechEvent, SpeechEventSender, SpeechPort, Utterance, UtteranceHandle,
};

/// Speaking time per word at rate 1.0.
const PER_WORD: Duration = Duration::from_millis(350);
/// Shortest utterance, however few words.
const MIN_UTTERANCE: Duration = Duration::from_millis(600);

type SpeakingMap = HashMap<UtteranceHandle, (SpeechEventSender, JoinHandle<()>)>;
type Speaking = Arc<Mutex<SpeakingMap>>;

/// Prints narration to stdout.
#[derive(Default)]
pub struct ConsoleSpeech {
    next_handle: AtomicU64,
    speaking: Speaking,
}

impl ConsoleSpeech {
    pub fn new() -> Self {
        Self::default()
    }
}

/// How long `text` takes to say at `rate`.
pub fn speaking_time(text: &str, rate: f32) -> Duration {
    let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
    let at_normal = (PER_WORD * words).max(MIN_UTTERANCE);
    let millis = at_normal.as_secs_f64() * 1000.0 / f64::from(rate.max(0.1));
    Duration::from_millis(millis.round() as u64)
}

fn lock(speaking: &Speaking) -> MutexGuard<'_, SpeakingMap> {
    speaking.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl SpeechPort for ConsoleSpeech {
    async fn probe(&self) -> Result<(), SpeechError> {
        Ok(())
    }

    async fn dispatch(
        &self,
        utterance: Utterance,
        events: SpeechEventSender,
    ) -> Result<UtteranceHandle, SpeechError> {
        let handle = UtteranceHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "    \u{1F50A} {}", utterance.text)
            .map_err(|e| SpeechError::Rejected(e.to_string()))?;
        drop(stdout);

        let _ = events.send(SpeechEvent::started(handle));

        let length = speaking_time(&utterance.text, utterance.rate);
        let speaking = Arc::clone(&self.speaking);
        let mut map = lock(&self.speaking);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(length).await;
            if let Some((events, _)) = lock(&speaking).remove(&handle) {
                let _ = events.send(SpeechEvent::ended(handle));
            }
        });
        map.insert(handle, (events, timer));

        Ok(handle)
    }

    fn stop(&self, handle: UtteranceHandle) {
        if let Some((events, timer)) = lock(&self.speaking).remove(&handle) {
            timer.abort();
            let _ = events.send(SpeechEvent::stopped(handle));
        }
    }
}
