//! Demo command handler.
//!
//! Records one algorithm run, plays it back with narration and closes the
//! session on every exit path, including Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracecast_core::{PlaybackSnapshot, PreferenceStore, SessionEvent, SpeechPort};
use tracecast_narration::SlotStatus;
use tracecast_playback::{LiveRecorder, PlaybackSession, TraceRecorder};
use tracing::{debug, info, warn};

use crate::commands::{DemoCommand, PlaybackArgs};
use crate::demos::Algorithm;
use crate::speech::ConsoleSpeech;

const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Execute the demo command.
pub async fn execute(
    store: Arc<dyn PreferenceStore>,
    command: DemoCommand,
    args: PlaybackArgs,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping playback");
            interrupt.cancel();
        }
    });

    let speech = Arc::new(ConsoleSpeech::new());
    let result = run(store, speech, command.into(), &args, cancel).await;
    ctrl_c.abort();

    let snapshot = result?;
    println!(
        "Stopped at step {} of {}.",
        (snapshot.current_index + 1).min(snapshot.total_steps),
        snapshot.total_steps
    );
    Ok(())
}

/// Open a session, play `algorithm` through it and close it again.
///
/// Returns the playback state as it was just before closing.
pub async fn run(
    store: Arc<dyn PreferenceStore>,
    speech: Arc<dyn SpeechPort>,
    algorithm: Algorithm,
    args: &PlaybackArgs,
    cancel: CancellationToken,
) -> Result<PlaybackSnapshot> {
    let config = args.session_config();
    let session = PlaybackSession::open(config, speech, store).await?;
    if !session.narration_status().is_available() {
        println!("Speech is unavailable; playing without narration.");
    }

    let printer = tokio::spawn(print_events(session.subscribe()));
    let result = drive(&session, algorithm, args, config.narration.ttl, &cancel).await;
    let snapshot = session.snapshot();

    session.close().await;
    if let Err(e) = printer.await {
        warn!(error = %e, "Event printer ended abnormally");
    }

    result.map(|()| snapshot)
}

async fn drive(
    session: &PlaybackSession,
    algorithm: Algorithm,
    args: &PlaybackArgs,
    drain_limit: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    if args.no_voice {
        session.set_voice_enabled(false).await?;
    }
    if let Some(speed) = args.speed {
        session.set_speed(speed).await?;
    }
    info!(algorithm = algorithm.name(), live = args.live, "Starting demo");

    if args.live {
        let (mut recorder, feed) =
            LiveRecorder::with_cancellation(args.live_delay(), cancel.child_token());
        session.follow_live(feed)?;

        let simulator = tokio::spawn(async move {
            algorithm.run(&mut recorder).await;
            recorder.finish()
        });
        let trace = simulator.await?;
        debug!(steps = trace.len(), "Live run finished");
    } else {
        let mut events = session.subscribe();
        let mut recorder = TraceRecorder::with_cancellation(cancel.child_token());
        algorithm.run(&mut recorder).await;
        session.load(recorder.finish())?;
        session.play()?;

        tokio::select! {
            () = wait_for_end(session, &mut events) => {}
            () = cancel.cancelled() => return Ok(()),
        }
    }

    tokio::select! {
        () = drain_narration(session, drain_limit) => {}
        () = cancel.cancelled() => {}
    }
    Ok(())
}

const fn is_finished(snapshot: &PlaybackSnapshot) -> bool {
    !snapshot.is_playing && snapshot.current_index + 1 >= snapshot.total_steps
}

/// Wait until auto-advance has stopped on the last step.
async fn wait_for_end(session: &PlaybackSession, events: &mut broadcast::Receiver<SessionEvent>) {
    if is_finished(&session.snapshot()) {
        return;
    }
    loop {
        match events.recv().await {
            Ok(SessionEvent::StateChanged { snapshot }) if is_finished(&snapshot) => return,
            Ok(SessionEvent::Closed) | Err(RecvError::Closed) => return,
            Err(RecvError::Lagged(_)) if is_finished(&session.snapshot()) => return,
            Ok(_) | Err(RecvError::Lagged(_)) => {}
        }
    }
}

/// Let queued narration finish, for at most `limit`.
async fn drain_narration(session: &PlaybackSession, limit: Duration) {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        match session.narration().snapshot().await {
            Ok(s) if !s.enabled || !s.available => return,
            Ok(s) if s.queue_len == 0 && s.slot == SlotStatus::Idle => return,
            Ok(_) => tokio::time::sleep(DRAIN_POLL).await,
            Err(_) => return,
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::StepTransition { transition }) => {
                println!(
                    "[{:>3}/{}] {}",
                    transition.step_index + 1,
                    transition.total_steps,
                    transition.narration_text
                );
            }
            Ok(SessionEvent::TraceLoaded {
                trace_id,
                total_steps,
            }) => debug!(%trace_id, total_steps, "Playing trace"),
            Ok(SessionEvent::VoiceToggled { enabled }) => {
                println!("Narration {}.", if enabled { "on" } else { "off" });
            }
            Ok(SessionEvent::StateChanged { .. }) => {}
            Ok(SessionEvent::Closed) | Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event printer fell behind"),
        }
    }
}
