//! Subcommands and their arguments.

use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use tracecast_core::{NarrationConfig, PlaybackConfig, SpeedPreset};
use tracecast_playback::SessionConfig;

use crate::demos::Algorithm;

#[derive(Subcommand)]
pub enum Commands {
    /// Record an algorithm run and play it back with narration
    Demo {
        #[command(subcommand)]
        algorithm: DemoCommand,

        #[command(flatten)]
        playback: PlaybackArgs,
    },

    /// Show or change stored preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DemoCommand {
    /// Bubble sort over a list of integers
    BubbleSort {
        /// Values to sort
        #[arg(value_delimiter = ',', default_value = "5,1,4,2,8")]
        values: Vec<i64>,
    },
    /// Recursive factorial
    Factorial {
        /// Compute n!
        #[arg(default_value_t = 5)]
        n: u32,
    },
}

impl From<DemoCommand> for Algorithm {
    fn from(command: DemoCommand) -> Self {
        match command {
            DemoCommand::BubbleSort { values } => Self::BubbleSort(values),
            DemoCommand::Factorial { n } => Self::Factorial(n),
        }
    }
}

/// Playback and narration tunables.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct PlaybackArgs {
    /// Auto-advance interval at normal speed
    #[arg(long = "tick-ms", default_value_t = 1000)]
    pub tick_ms: u64,

    /// Minimum gap between the starts of two utterances
    #[arg(long = "min-interval-ms", default_value_t = 2000)]
    pub min_interval_ms: u64,

    /// Queued narration older than this is dropped
    #[arg(long = "ttl-ms", default_value_t = 10_000)]
    pub ttl_ms: u64,

    /// Playback speed (saved as preference)
    #[arg(long)]
    pub speed: Option<SpeedPreset>,

    /// Turn narration off (saved as preference)
    #[arg(long = "no-voice")]
    pub no_voice: bool,

    /// Play steps as the algorithm emits them instead of recording first
    #[arg(long)]
    pub live: bool,
}

impl PlaybackArgs {
    /// Session configuration for these flags. Validated when the session
    /// opens.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            playback: PlaybackConfig {
                base_interval: Duration::from_millis(self.tick_ms),
                ..PlaybackConfig::default()
            },
            narration: NarrationConfig {
                ttl: Duration::from_millis(self.ttl_ms),
                min_interval: Duration::from_millis(self.min_interval_ms),
                ..NarrationConfig::default()
            },
        }
    }

    /// Delay between emitted steps in live mode.
    pub const fn live_delay(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefsCommand {
    /// Print stored preferences
    Show,
    /// Turn narration on or off
    Voice {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Set playback speed
    Speed { preset: SpeedPreset },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub const fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Cli;
    use clap::Parser;

    #[test]
    fn test_demo_flags() {
        let cli = Cli::parse_from([
            "tracecast",
            "demo",
            "--tick-ms",
            "500",
            "--min-interval-ms",
            "3000",
            "--speed",
            "fast",
            "--no-voice",
            "bubble-sort",
            "3,2,1",
        ]);
        let Some(Commands::Demo {
            algorithm,
            playback,
        }) = cli.command
        else {
            panic!("expected demo command");
        };

        assert_eq!(
            algorithm,
            DemoCommand::BubbleSort {
                values: vec![3, 2, 1]
            }
        );
        assert_eq!(playback.speed, Some(SpeedPreset::Fast));
        assert!(playback.no_voice);
        assert!(!playback.live);

        let config = playback.session_config();
        assert_eq!(config.playback.base_interval, Duration::from_millis(500));
        assert_eq!(config.narration.min_interval, Duration::from_millis(3000));
        assert_eq!(config.narration.ttl, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_demo_defaults() {
        let cli = Cli::parse_from(["tracecast", "demo", "factorial"]);
        let Some(Commands::Demo { algorithm, playback }) = cli.command else {
            panic!("expected demo command");
        };
        assert_eq!(algorithm, DemoCommand::Factorial { n: 5 });
        assert_eq!(playback.session_config(), SessionConfig::default());
    }

    #[test]
    fn test_unknown_speed_is_rejected() {
        let result = Cli::try_parse_from(["tracecast", "prefs", "speed", "ludicrous"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_prefs_voice() {
        let cli = Cli::parse_from(["tracecast", "prefs", "voice", "off"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Prefs {
                command: PrefsCommand::Voice { state: Toggle::Off }
            })
        ));
    }
}
