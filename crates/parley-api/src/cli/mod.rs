//! CLI command definitions for the `parley` binary.

pub mod chat;
pub mod config;
pub mod render;
pub mod simulate;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use parley_observe::LogFormat;

/// Drive agent conversations against a text-generation service.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to parley.toml. Missing or invalid files fall back to defaults.
    #[arg(long, global = true, env = "PARLEY_CONFIG", default_value = "parley.toml")]
    pub config: PathBuf,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format: pretty or json.
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the conversation scheduler over a scene file.
    #[command(alias = "sim")]
    Simulate(SimulateArgs),

    /// Talk to one agent over stdin.
    Chat {
        /// Scene file with agents and world state.
        #[arg(long)]
        agents: PathBuf,

        /// Id of the agent to talk to.
        #[arg(long)]
        agent: String,
    },

    /// Configuration tools.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Scene file with agents and world state.
    #[arg(long)]
    pub agents: PathBuf,

    /// Number of scheduler ticks to run.
    #[arg(long, default_value_t = 600)]
    pub ticks: u64,

    /// Wall-clock length of one tick, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub tick_ms: u64,

    /// Simulated minutes that pass per tick.
    #[arg(long, default_value_t = 1.0)]
    pub minutes_per_tick: f64,

    /// Seconds before the same pair may be proposed again.
    #[arg(long, default_value_t = 120)]
    pub pair_cooldown_secs: i64,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Parse and validate a config file, then print the resolved policy.
    Check {
        /// Config file to check (defaults to --config).
        path: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simulate_with_defaults() {
        let cli = Cli::try_parse_from(["parley", "simulate", "--agents", "scene.toml", "--ticks", "5"]).unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.ticks, 5);
        assert_eq!(args.tick_ms, 1000);
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn parses_config_check_path() {
        let cli = Cli::try_parse_from(["parley", "config", "check", "other.toml"]).unwrap();
        let Commands::Config { action: ConfigCommand::Check { path } } = cli.command else {
            panic!("expected config check");
        };
        assert_eq!(path, Some(PathBuf::from("other.toml")));
    }
}
