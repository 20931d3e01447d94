//! Top-level argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Step through algorithm runs with spoken narration.
#[derive(Parser)]
#[command(name = "tracecast")]
#[command(about = "Replay algorithm traces step by step with spoken narration")]
#[command(version)]
pub struct Cli {
    /// Preference file (voice toggle and speed)
    #[arg(
        long = "prefs",
        env = "TRACECAST_PREFS",
        default_value = "tracecast-prefs.json",
        global = true
    )]
    pub prefs: PathBuf,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["tracecast", "--verbose", "--prefs", "/tmp/p.json", "prefs", "show"]);
        assert!(cli.verbose);
        assert_eq!(cli.prefs, PathBuf::from("/tmp/p.json"));
    }
}
