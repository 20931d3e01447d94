//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(store, ...) -> Result<()>`
//! - Thin wrappers that build the session or service, call it, and format
//!   output for the terminal

pub mod demo;
pub mod prefs;
