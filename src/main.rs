mod agents;
mod cli;
mod config;
mod error;
mod remote;
mod utils;
mod version;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Init => workflow::execute_init(&cli.path, config),
        Commands::Update => workflow::execute_self_update(&cli.path),
        Commands::UpdateProject { force } => {
            workflow::execute_update_project(&cli.path, config, *force)
        }
        Commands::Run { task } => workflow::execute_run(&cli.path, config, task),
        Commands::Version => workflow::execute_version(&cli.path, config),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
