//! CLI command definitions and handlers.

pub mod replay;
pub mod scan;

use clap::{Parser, Subcommand};

/// Offline tools for the blinkcap capture pipeline
#[derive(Parser)]
#[command(name = "blinkcap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Binarize a scanned document or signature
    Binarize(scan::BinarizeArgs),
    /// Print luma statistics and the threshold auto-selection would pick
    Stats(scan::StatsArgs),
    /// Run a landmark trace through the blink detector
    Replay(replay::ReplayArgs),
}
