//! Slipway CLI - makefile generation and build driving for C++

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Set up logging keyed to the repeatable -v flag.
    let verbose = match &cli.command {
        Commands::Build(args) => args.common.verbose_level(),
        Commands::Gen(args) => args.common.verbose_level(),
        Commands::Run(args) => args.common.verbose_level(),
        Commands::Runall(args) => args.common.verbose_level(),
        Commands::Completions(_) => 0,
    };
    let filter = match verbose {
        0 | 1 => EnvFilter::new("slipway=warn"),
        2 => EnvFilter::new("slipway=info"),
        _ => EnvFilter::new("slipway=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Build(args) => commands::build::execute(args),
        Commands::Gen(args) => commands::gen::execute(args),
        Commands::Run(args) => commands::run::execute(args),
        Commands::Runall(args) => commands::runall::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
