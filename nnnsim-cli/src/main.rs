use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod utils;

/// nnnsim Command Line Interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation scenario and print per-node statistics
    Run {
        /// Scenario file (JSON). A consumer/router/producer line is used when absent
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Settings file (TOML, JSON or YAML) with `until`, `json` and `realtime`
        #[clap(short, long)]
        settings: Option<PathBuf>,

        /// Simulated time to stop at, e.g. "10s" or "500ms"
        #[clap(short, long)]
        until: Option<String>,

        /// Print the node reports as JSON
        #[clap(long)]
        json: bool,

        /// Pace events against the wall clock
        #[clap(long)]
        realtime: bool,
    },

    /// Inspect 3N addresses
    Address {
        #[clap(subcommand)]
        cmd: AddressCommands,
    },

    /// Report which packet type a hex-encoded buffer carries
    Classify {
        /// Packet bytes as hex; whitespace is ignored
        hex: String,

        /// Decode the whole packet, not just its discriminator
        #[clap(short, long)]
        decode: bool,
    },

    /// List the cache replacement policies known to the registry
    Policies,
}

#[derive(Subcommand)]
pub enum AddressCommands {
    /// Hop distance between two addresses
    Distance { a: String, b: String },

    /// Deepest sector shared by two addresses
    Closest { a: String, b: String },

    /// Sector an address belongs to
    Sector { address: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" },
    ))
    .init();

    match cli.command {
        Commands::Run {
            config,
            settings,
            until,
            json,
            realtime,
        } => {
            let overrides = commands::run::Overrides { until, json, realtime };
            commands::run::run_scenario(config, settings, overrides).await?;
        }
        Commands::Address { cmd } => {
            commands::address::handle_command(cmd)?;
        }
        Commands::Classify { hex, decode } => {
            commands::classify::classify(&hex, decode)?;
        }
        Commands::Policies => {
            commands::policies::list_policies();
        }
    }

    Ok(())
}
