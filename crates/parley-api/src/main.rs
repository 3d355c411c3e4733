//! Parley CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, sets up tracing, then dispatches to the simulation
//! driver, the interactive player chat, or the config checker.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands, ConfigCommand};

// The tick loop and conversation tasks share one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "info,parley_core=debug,parley_infra=debug",
        _ => "trace",
    };
    parley_observe::init_tracing(cli.log_format, filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = match cli.command {
        Commands::Simulate(args) => cli::simulate::run(&cli.config, args, cli.json).await,
        Commands::Chat { agents, agent } => cli::chat::run(&cli.config, &agents, &agent).await,
        Commands::Config { action } => match action {
            ConfigCommand::Check { path } => {
                cli::config::check(path.as_deref().unwrap_or(&cli.config), cli.json).await
            }
        },
    };

    parley_observe::shutdown_tracing();
    result
}
