//! Command-line front end for tracecast.
//!
//! Wires the console speech backend and the JSON preference file into a
//! [`tracecast_playback::PlaybackSession`] and plays the bundled demo
//! simulators through it.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only.
use tracing_subscriber as _;

pub mod commands;
pub mod demos;
pub mod handlers;
pub mod parser;
pub mod prefs;
pub mod speech;

pub use commands::{Commands, DemoCommand, PlaybackArgs, PrefsCommand};
pub use parser::Cli;
pub use prefs::JsonFilePreferenceStore;
pub use speech::ConsoleSpeech;
