//! Persisted user preferences: voice on/off and playback speed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The supported playback/narration speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeedPreset {
    /// All presets, slowest first.
    pub const ALL: [Self; 3] = [Self::Slow, Self::Normal, Self::Fast];

    /// Rate multiplier applied to both the tick interval and the speech rate.
    #[must_use]
    pub const fn factor(self) -> f32 {
        match self {
            Self::Slow => 0.8,
            Self::Normal => 1.0,
            Self::Fast => 1.5,
        }
    }

    /// Preset whose factor is closest to `factor`.
    ///
    /// Anything outside the table clamps to its nearest end; non-finite
    /// input maps to `Normal`.
    #[must_use]
    pub fn nearest(factor: f32) -> Self {
        if !factor.is_finite() {
            return Self::Normal;
        }
        Self::ALL
            .into_iter()
            .min_by(|a, b| {
                let da = (a.factor() - factor).abs();
                let db = (b.factor() - factor).abs();
                da.total_cmp(&db)
            })
            .unwrap_or_default()
    }

    /// Persisted label (`"slow"`, `"normal"`, `"fast"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Normal => "normal",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted speed label that is not one of the known presets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown speed preset '{0}' (expected slow, normal or fast)")]
pub struct UnknownSpeedPreset(pub String);

impl FromStr for SpeedPreset {
    type Err = UnknownSpeedPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow" => Ok(Self::Slow),
            "normal" => Ok(Self::Normal),
            "fast" => Ok(Self::Fast),
            _ => Err(UnknownSpeedPreset(s.to_string())),
        }
    }
}

/// User-facing narration preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    /// Whether steps are narrated aloud.
    pub voice_enabled: bool,

    /// Playback and narration speed.
    pub speed: SpeedPreset,
}

impl Default for UserPreference {
    fn default() -> Self {
        Self {
            voice_enabled: true,
            speed: SpeedPreset::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn factor_table() {
        assert_eq!(SpeedPreset::Slow.factor(), 0.8);
        assert_eq!(SpeedPreset::Normal.factor(), 1.0);
        assert_eq!(SpeedPreset::Fast.factor(), 1.5);
    }

    #[test]
    fn nearest_clamps_to_table() {
        assert_eq!(SpeedPreset::nearest(0.1), SpeedPreset::Slow);
        assert_eq!(SpeedPreset::nearest(0.95), SpeedPreset::Normal);
        assert_eq!(SpeedPreset::nearest(1.3), SpeedPreset::Fast);
        assert_eq!(SpeedPreset::nearest(9.0), SpeedPreset::Fast);
        assert_eq!(SpeedPreset::nearest(f32::NAN), SpeedPreset::Normal);
    }

    #[test]
    fn speed_labels_round_trip() {
        for preset in SpeedPreset::ALL {
            assert_eq!(preset.as_str().parse::<SpeedPreset>(), Ok(preset));
        }
        assert!("ludicrous".parse::<SpeedPreset>().is_err());
    }

    #[test]
    fn default_preference_speaks_at_normal_speed() {
        let pref = UserPreference::default();
        assert!(pref.voice_enabled);
        assert_eq!(pref.speed, SpeedPreset::Normal);
    }
}
