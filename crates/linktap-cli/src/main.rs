mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "linktap",
    version,
    about = "Extract LinkedIn Ads data as a standardized record stream"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync over the selected streams
    Sync {
        /// Path to the JSON config file (credentials, start date, accounts)
        #[arg(long)]
        config: PathBuf,
        /// Path to the JSON catalog file (stream and field selection)
        #[arg(long)]
        catalog: PathBuf,
        /// Path to the JSON state file; created if missing
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// List the streams this tap can replicate
    Streams,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Sync { config, catalog, state } => {
            commands::sync::execute(&config, &catalog, state.as_deref())
        }
        Commands::Streams => {
            commands::streams::execute();
            Ok(())
        }
    }
}
