//! Trace recording and VCR-style playback for tracecast.
//!
//! - [`recorder`]: simulators emit steps in batch or live mode
//! - [`controller`]: the synchronous playback state machine
//! - [`session`]: the async session that runs the ticker and feeds narration

pub mod config;
pub mod controller;
pub mod error;
pub mod recorder;
pub mod session;

pub use config::SessionConfig;
pub use controller::{PlaybackController, PlaybackEffect};
pub use error::SessionError;
pub use recorder::{LiveFeed, LiveRecorder, TraceRecorder, record_batch};
pub use session::PlaybackSession;
