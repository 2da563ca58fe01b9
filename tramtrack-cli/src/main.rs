//! tramtrack CLI - Command-line interface
//!
//! Runs the tram location core against a live location server, or walks a
//! configured fallback route when no server is available.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::watch::WatchArgs;

#[derive(Parser)]
#[command(name = "tramtrack")]
#[command(version = tramtrack::VERSION)]
#[command(about = "Real-time tram location tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the tram and print status changes until Ctrl+C
    Watch(WatchArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch(args) => commands::watch::run(args).await,
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
