//! Session configuration.

use serde::{Deserialize, Serialize};
use tracecast_core::{ConfigError, NarrationConfig, PlaybackConfig};

/// Everything a [`crate::PlaybackSession`] can be tuned with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub playback: PlaybackConfig,
    pub narration: NarrationConfig,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.playback.validate()?;
        self.narration.validate()
    }
}
