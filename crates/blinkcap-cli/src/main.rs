use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Binarize(args) => commands::scan::binarize(&args),
        Commands::Stats(args) => commands::scan::stats(&args),
        Commands::Replay(args) => commands::replay::run(&args),
    }
}
