//! code-assistant CLI entry point.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use code_assistant::cli::{Cli, execute};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stdout)]
fn run(cli: &Cli) -> anyhow::Result<()> {
    let output = execute(cli).with_context(|| format!("`{}` failed", cli.command.name()))?;
    if !output.is_empty() {
        print!("{output}");
    }
    Ok(())
}

/// Logs go to stderr; stdout carries command output only.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "code_assistant=debug,warn"
    } else {
        "code_assistant=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
