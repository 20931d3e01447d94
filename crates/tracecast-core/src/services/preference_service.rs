//! Preference service - typed access over the raw key/value store.

use std::sync::Arc;

use crate::domain::{SpeedPreset, UserPreference};
use crate::ports::{PreferenceError, PreferenceKey, PreferenceStore};

/// Reads and writes [`UserPreference`] through a [`PreferenceStore`].
#[derive(Clone)]
pub struct PreferenceService {
    store: Arc<dyn PreferenceStore>,
}

impl PreferenceService {
    /// Create a new preference service.
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Load the stored preference.
    ///
    /// Missing keys take their defaults. A stored value that cannot be parsed
    /// is logged and replaced by the default so a corrupt store never blocks
    /// startup. Only storage failures are returned.
    pub async fn load(&self) -> Result<UserPreference, PreferenceError> {
        let defaults = UserPreference::default();

        let voice_enabled = match self.store.get(PreferenceKey::VoiceEnabled).await? {
            Some(raw) => parse_voice_enabled(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring stored preference");
                defaults.voice_enabled
            }),
            None => defaults.voice_enabled,
        };

        let speed = match self.store.get(PreferenceKey::Speed).await? {
            Some(raw) => parse_speed(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring stored preference");
                defaults.speed
            }),
            None => defaults.speed,
        };

        let preference = UserPreference {
            voice_enabled,
            speed,
        };
        tracing::debug!(?preference, "Loaded user preference");
        Ok(preference)
    }

    /// Persist the voice toggle.
    pub async fn set_voice_enabled(&self, enabled: bool) -> Result<(), PreferenceError> {
        self.store
            .set(PreferenceKey::VoiceEnabled, enabled.to_string())
            .await
    }

    /// Persist the speed preset.
    pub async fn set_speed(&self, speed: SpeedPreset) -> Result<(), PreferenceError> {
        self.store
            .set(PreferenceKey::Speed, speed.as_str().to_string())
            .await
    }

    /// Persist both fields.
    pub async fn save(&self, preference: UserPreference) -> Result<(), PreferenceError> {
        self.set_voice_enabled(preference.voice_enabled).await?;
        self.set_speed(preference.speed).await
    }
}

fn parse_voice_enabled(raw: &str) -> Result<bool, PreferenceError> {
    raw.trim()
        .parse()
        .map_err(|_| PreferenceError::InvalidValue {
            key: PreferenceKey::VoiceEnabled,
            value: raw.to_string(),
        })
}

fn parse_speed(raw: &str) -> Result<SpeedPreset, PreferenceError> {
    raw.trim()
        .parse()
        .map_err(|_| PreferenceError::InvalidValue {
            key: PreferenceKey::Speed,
            value: raw.to_string(),
        })
}
