//! CLI interface for options-scanner
//!
//! Provides subcommands for:
//! - `run`: Stream, rank and optionally capture
//! - `universe`: Resolve and print the tracked universe
//! - `config`: Show the effective configuration

mod run;
mod universe;

pub use run::RunArgs;
pub use universe::UniverseArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "options-scanner")]
#[command(about = "Real-time liquidity and momentum ranking for index options")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scanner
    Run(RunArgs),
    /// Resolve the tracked universe and exit
    Universe(UniverseArgs),
    /// Show the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "options-scanner",
            "--config",
            "scanner.toml",
            "run",
            "--ignore-session",
            "--capture",
            "--print-every-secs",
            "5",
        ]);
        assert_eq!(cli.config, "scanner.toml");
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.ignore_session);
        assert!(args.capture);
        assert_eq!(args.print_every_secs, 5);
    }

    #[test]
    fn test_parse_universe_json() {
        let cli = Cli::parse_from(["options-scanner", "universe", "--json"]);
        assert!(matches!(cli.command, Commands::Universe(UniverseArgs { json: true })));
        assert_eq!(cli.config, "config.toml");
    }
}
