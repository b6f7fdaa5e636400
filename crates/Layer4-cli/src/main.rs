//! procq CLI - Main entry point

mod cli;
mod settings;

use clap::{Parser, Subcommand};
use procq_foundation::RunnerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// procq - run shell commands through a bounded task queue
#[derive(Parser, Debug)]
#[command(name = "procq")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue commands, run them and report their output
    Run(cli::RunArgs),
    /// Show or change the runner configuration
    Config(settings::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays parseable with --json
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match args.command {
        Command::Config(config_args) => settings::run(config_args)?,
        Command::Run(run_args) => {
            let config = RunnerConfig::load()?;
            if !cli::run(config, run_args).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
