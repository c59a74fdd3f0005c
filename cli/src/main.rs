//! evcheck: run a checker against a live event stream while a workload runs.
//!
//! Exit status: 0 when the test passed, 1 when it failed, 2 when the
//! scenario could not be loaded.

mod scenario;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use evcheck_config::{DEFAULT_CONFIG_FILE, ScenarioConfig};

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "evcheck", version, about)]
struct Cli {
    /// Scenario file.
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run the scenario (default).
    Run(RunArgs),
    /// Load and validate the scenario without running it.
    Validate,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Override `checker.event_limit`.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    event_limit: Option<u64>,
    /// Override `checker.time_limit_secs`.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    time_limit_secs: Option<u64>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries the verdict only.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let mut config = match ScenarioConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let args = match cli.command {
        Some(CliCommand::Validate) => {
            println!(
                "ok: checker '{}' with {} expected events ({})",
                config.checker.name,
                config.expect.len(),
                config.path().display()
            );
            return ExitCode::SUCCESS;
        }
        Some(CliCommand::Run(args)) => args,
        None => RunArgs::default(),
    };
    config.override_limits(args.event_limit, args.time_limit_secs);

    match scenario::run_scenario(&config).await {
        Ok(outcome) => {
            println!("{outcome}");
            if outcome.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_FAILED)
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}
