//! Fleet CLI Binary
//!
//! Command-line interface for fanning out commands to C2 agents.

use anyhow::Context;
use clap::Parser;
use fleet_dispatch::logging::init_logging;
use fleet_dispatch::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli).context("Error loading configuration")?;
    init_logging(Some(&context.config().logging), &cli.logging_overrides())
        .context("Error initializing logging")?;
    let output = context.execute(&cli.command)?;
    Ok(output)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
