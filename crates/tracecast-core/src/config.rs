//! Tunables for narration pacing and playback timing.
//!
//! These are pure domain types with no infrastructure dependencies. Durations
//! serialize as integer milliseconds (`ttlMs`, `minIntervalMs`, ...).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Queued narration older than this is dropped unspoken.
pub const DEFAULT_NARRATION_TTL: Duration = Duration::from_secs(10);

/// Minimum spacing between the starts of two consecutive utterances.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(2000);

/// Retry delay while the speech slot is held by another utterance.
pub const DEFAULT_BUSY_BACKOFF: Duration = Duration::from_millis(100);

/// How long a cancelled utterance may take to acknowledge before the slot is
/// reclaimed anyway.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_millis(500);

/// Auto-advance interval at normal speed.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(1000);

/// What `seek` does to a running playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekBehavior {
    /// Stop auto-advance; the user resumes explicitly.
    #[default]
    Pause,
    /// Keep auto-advancing from the new position.
    ContinuePlaying,
}

/// Narration scheduler tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NarrationConfig {
    #[serde(rename = "ttlMs", with = "millis")]
    pub ttl: Duration,
    #[serde(rename = "minIntervalMs", with = "millis")]
    pub min_interval: Duration,
    #[serde(rename = "busyBackoffMs", with = "millis")]
    pub busy_backoff: Duration,
    #[serde(rename = "cancelGraceMs", with = "millis")]
    pub cancel_grace: Duration,
    /// Output volume (0.0–1.0).
    pub volume: f32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_NARRATION_TTL,
            min_interval: DEFAULT_MIN_INTERVAL,
            busy_backoff: DEFAULT_BUSY_BACKOFF,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            volume: 1.0,
        }
    }
}

impl NarrationConfig {
    /// Check that every tunable is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("ttl"));
        }
        if self.busy_backoff.is_zero() {
            return Err(ConfigError::ZeroDuration("busy_backoff"));
        }
        if self.cancel_grace.is_zero() {
            return Err(ConfigError::ZeroDuration("cancel_grace"));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::InvalidVolume(self.volume));
        }
        Ok(())
    }
}

/// Playback tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    /// Tick interval at speed factor 1.0.
    #[serde(rename = "baseIntervalMs", with = "millis")]
    pub base_interval: Duration,
    pub seek_behavior: SeekBehavior,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
            seek_behavior: SeekBehavior::default(),
        }
    }
}

impl PlaybackConfig {
    /// Check that every tunable is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_interval < MIN_BASE_INTERVAL {
            return Err(ConfigError::IntervalTooShort {
                field: "base_interval",
                millis: self.base_interval.as_millis(),
            });
        }
        Ok(())
    }
}

const MIN_BASE_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("{field} of {millis}ms is too short")]
    IntervalTooShort { field: &'static str, millis: u128 },

    #[error("Volume must be between 0.0 and 1.0, got {0}")]
    InvalidVolume(f32),
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(NarrationConfig::default().validate().is_ok());
        assert!(PlaybackConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_min_interval_is_allowed() {
        let config = NarrationConfig {
            min_interval: Duration::ZERO,
            ..NarrationConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let config = NarrationConfig {
            ttl: Duration::ZERO,
            ..NarrationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDuration("ttl")));
    }

    #[test]
    fn out_of_range_volume_is_rejected() {
        let config = NarrationConfig {
            volume: 1.5,
            ..NarrationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidVolume(1.5)));
    }

    #[test]
    fn tiny_tick_interval_is_rejected() {
        let config = PlaybackConfig {
            base_interval: Duration::from_millis(1),
            ..PlaybackConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IntervalTooShort { millis: 1, .. })
        ));
    }

    #[test]
    fn durations_serialize_as_millis() {
        let json = serde_json::to_value(NarrationConfig::default()).unwrap();
        assert_eq!(json["ttlMs"], 10_000);
        assert_eq!(json["minIntervalMs"], 2000);

        let parsed: PlaybackConfig =
            serde_json::from_str(r#"{"baseIntervalMs": 250, "seekBehavior": "continue_playing"}"#)
                .unwrap();
        assert_eq!(parsed.base_interval, Duration::from_millis(250));
        assert_eq!(parsed.seek_behavior, SeekBehavior::ContinuePlaying);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: NarrationConfig = serde_json::from_str(r#"{"volume": 0.5}"#).unwrap();
        assert_eq!(parsed.ttl, DEFAULT_NARRATION_TTL);
        assert!((parsed.volume - 0.5).abs() < f32::EPSILON);
    }
}
