//! orchwatch CLI: run the orchestrator watcher and inspect its store.
//!
//! # Commands
//! ```text
//! orchwatch watch  --config <file>
//! orchwatch show   --config <file> [--address <addr>] [--round <n>] [--json]
//! orchwatch active (--subgraph <url> | --config <file>) [--json]
//! orchwatch info
//! ```

use std::path::PathBuf;

use alloy_primitives::Address;
use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd_show;
mod cmd_watch;
mod config;
mod logging;

#[derive(Parser)]
#[command(
    name = "orchwatch",
    about = "Keeps a local record of Livepeer orchestrators in sync with the BondingManager",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the chain and reconcile orchestrator records until Ctrl-C
    Watch {
        /// Path to the YAML (or .json) config file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print stored orchestrator records
    Show {
        #[arg(short, long)]
        config: PathBuf,
        /// Show a single orchestrator
        #[arg(long)]
        address: Option<Address>,
        /// Only orchestrators active in this round
        #[arg(long)]
        round: Option<u64>,
        #[arg(long)]
        json: bool,
    },

    /// List active transcoders reported by the subgraph
    Active {
        /// Subgraph GraphQL endpoint
        #[arg(long, required_unless_present = "config")]
        subgraph: Option<String>,
        /// Take the endpoint from `subgraph_url` in this config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Show build and default configuration info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { config } => cmd_watch::run(&config).await,
        Commands::Show {
            config,
            address,
            round,
            json,
        } => cmd_show::show(&config, address, round, json).await,
        Commands::Active {
            subgraph,
            config,
            json,
        } => cmd_show::active(subgraph, config.as_deref(), json).await,
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

fn cmd_info() {
    use orchwatch_evm::abi;

    println!("orchwatch v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default confirmation depth: 12 blocks");
    println!("  Default poll interval:      2000 ms");
    println!("  Default batch channel:      10 batches");
    println!(
        "  Storage backends:           memory{}",
        if cfg!(feature = "sqlite") { ", sqlite" } else { "" }
    );
    println!("  Events:");
    for sig in [abi::TRANSCODER_ACTIVATED, abi::TRANSCODER_DEACTIVATED] {
        println!("    {sig:<40} {}", abi::event_topic(sig));
    }
}
