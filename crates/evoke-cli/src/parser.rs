//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Stream live progress of code agent runs.
#[derive(Parser)]
#[command(name = "evoke")]
#[command(about = "Serve and watch live progress of code agent runs")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
