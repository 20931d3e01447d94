//! Session-level playback and narration on paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;
use tokio_test::assert_ok;
use tracecast_core::{
    MemoryPreferenceStore, PreferenceKey, PreferenceStore, SessionEvent, SpeedPreset, Trace,
};
use tracecast_narration::testing::RecordingSpeech;
use tracecast_playback::{
    LiveRecorder, PlaybackSession, SessionConfig, SessionError, record_batch,
};

const MIN_INTERVAL: Duration = Duration::from_millis(2000);

fn trace(len: usize) -> Trace {
    record_batch(|rec| {
        for i in 0..len {
            let _ = rec.emit_step(json!({ "array": [i, len - i] }), format!("Step {i}"), None);
        }
    })
}

async fn open_with(
    speech: &Arc<RecordingSpeech>,
    store: &Arc<MemoryPreferenceStore>,
) -> PlaybackSession {
    PlaybackSession::open(SessionConfig::default(), speech.clone(), store.clone())
        .await
        .unwrap()
}

async fn open(speech: &Arc<RecordingSpeech>) -> PlaybackSession {
    open_with(speech, &Arc::new(MemoryPreferenceStore::new())).await
}

fn transitions(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<usize> {
    let mut indices = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::StepTransition { transition } = event {
            indices.push(transition.step_index);
        }
    }
    indices
}

fn spoken_texts(speech: &RecordingSpeech) -> Vec<String> {
    speech.spoken().into_iter().map(|(text, _)| text).collect()
}

#[tokio::test(start_paused = true)]
async fn test_load_rewinds_and_pauses() {
    let speech = Arc::new(RecordingSpeech::new());
    let session = open(&speech).await;

    assert_ok!(session.load(trace(5)));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.current_index, 0);
    assert!(!snapshot.is_playing);

    assert_ok!(session.play());
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(session.snapshot().current_index, 2);

    let next = trace(3);
    let next_id = next.id();
    assert_ok!(session.load(next));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.trace_id, Some(next_id));
    assert_eq!(snapshot.current_index, 0);
    assert!(!snapshot.is_playing);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(session.snapshot().current_index, 0);
}

#[tokio::test(start_paused = true)]
async fn test_playback_is_paced_for_narration() {
    let speech = Arc::new(RecordingSpeech::new());
    let session = open(&speech).await;
    let mut events = session.subscribe();

    assert_ok!(session.load(trace(5)));
    assert_ok!(session.play());
    tokio::time::sleep(Duration::from_secs(10)).await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.current_index, 4);
    assert!(!snapshot.is_playing);
    assert_eq!(transitions(&mut events), [0, 1, 2, 3, 4]);

    let dispatches = speech.dispatches();
    assert_eq!(dispatches[0].text, "Step 0");
    assert!(dispatches.len() >= 3);
    for pair in dispatches.windows(2) {
        assert!(pair[1].at - pair[0].at >= MIN_INTERVAL);
    }
    assert_eq!(speech.max_overlap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_stops_auto_advance() {
    let speech = Arc::new(RecordingSpeech::new());
    let session = open(&speech).await;

    assert_ok!(session.load(trace(5)));
    assert_ok!(session.play());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_ok!(session.pause());
    tokio::time::sleep(Duration::from_secs(5)).await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.current_index, 1);
    assert!(!snapshot.is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_seek_flushes_skipped_narration() {
    let speech = Arc::new(RecordingSpeech::new());
    let session = open(&speech).await;

    assert_ok!(session.load(trace(6)));
    assert_ok!(session.step_forward());
    assert_ok!(session.step_forward());
    assert_eq!(session.narration().snapshot().await.unwrap().queue_len, 2);

    assert_ok!(session.seek(4));
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(spoken_texts(&speech), ["Step 0", "Step 4"]);
    assert_eq!(session.snapshot().current_index, 4);
}

#[tokio::test(start_paused = true)]
async fn test_speed_change_restarts_narration_and_persists() {
    let speech = Arc::new(RecordingSpeech::new());
    let store = Arc::new(MemoryPreferenceStore::new());
    let session = open_with(&speech, &store).await;

    assert_ok!(session.load(trace(5)));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_ok!(session.set_speed(SpeedPreset::Fast).await);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(
        speech.spoken(),
        vec![("Step 0".to_string(), 1.0), ("Step 0".to_string(), 1.5)]
    );
    assert_eq!(session.snapshot().speed, SpeedPreset::Fast);
    assert_eq!(
        store.get(PreferenceKey::Speed).await.unwrap().as_deref(),
        Some("fast")
    );
}

#[tokio::test(start_paused = true)]
async fn test_seek_preserves_payloads() {
    let speech = Arc::new(RecordingSpeech::new());
    let session = open(&speech).await;
    let recorded = trace(7);

    assert_ok!(session.load(recorded.clone()));
    for index in (0..recorded.len()).chain((0..recorded.len()).rev()) {
        assert_ok!(session.seek(index));
        assert_eq!(session.current_step().as_ref(), recorded.get(index));
    }
    assert_eq!(session.trace(), Some(recorded));
}

#[tokio::test(start_paused = true)]
async fn test_stored_preference_mutes_narration() {
    let speech = Arc::new(RecordingSpeech::new());
    let store = Arc::new(MemoryPreferenceStore::new());
    store
        .set(PreferenceKey::VoiceEnabled, "false".to_string())
        .await
        .unwrap();
    let session = open_with(&speech, &store).await;
    assert!(!session.voice_enabled());

    assert_ok!(session.load(trace(3)));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(speech.dispatches().is_empty());

    assert_ok!(session.set_voice_enabled(true).await);
    assert_ok!(session.step_forward());
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(spoken_texts(&speech), ["Step 1"]);
    assert_eq!(
        store.get(PreferenceKey::VoiceEnabled).await.unwrap().as_deref(),
        Some("true")
    );
}

#[tokio::test(start_paused = true)]
async fn test_playback_without_speech_service() {
    let speech = Arc::new(RecordingSpeech::unavailable("no speech engine"));
    let session = open(&speech).await;
    assert!(!session.narration_status().is_available());

    assert_ok!(session.load(trace(4)));
    assert_ok!(session.play());
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(session.snapshot().current_index, 3);
    assert!(speech.dispatches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_follow_live_recording() {
    let speech = Arc::new(RecordingSpeech::new());
    let session = open(&speech).await;

    let (mut recorder, feed) = LiveRecorder::new(Duration::from_millis(1000));
    let trace_id = recorder.id();
    assert_ok!(session.follow_live(feed));

    let simulator = tokio::spawn(async move {
        for i in 0..3 {
            let _ = recorder.emit_step(json!(i), format!("Step {i}"), None).await;
        }
        recorder.finish()
    });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(session.snapshot().current_index, 1);

    let recorded = simulator.await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.trace_id, Some(trace_id));
    assert_eq!(snapshot.current_index, 2);
    assert_eq!(session.trace(), Some(recorded));
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_everything() {
    let speech = Arc::new(RecordingSpeech::new());
    let session = open(&speech).await;
    let mut events = session.subscribe();

    assert_ok!(session.load(trace(5)));
    assert_ok!(session.play());
    session.narration().snapshot().await.unwrap();
    assert_eq!(speech.playing_count(), 1);

    session.close().await;
    session.close().await;

    assert!(session.is_closed());
    assert_eq!(speech.playing_count(), 0);
    assert!(session.narration().is_closed());
    assert!(matches!(session.play(), Err(SessionError::Closed)));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.snapshot().current_index, 0);

    let mut closed = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::Closed) {
            closed += 1;
        }
    }
    assert_eq!(closed, 1);
}
