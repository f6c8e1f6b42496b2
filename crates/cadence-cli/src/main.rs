//! Cadence CLI - Drive and inspect the batched update dispatcher

mod commands;
mod logging;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use commands::{config, simulate};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Batched per-frame update dispatcher", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run participants through simulated frames without a host
    Simulate {
        /// Number of participants to register
        #[arg(short, long, default_value = "1000")]
        participants: usize,

        /// Number of frames to run
        #[arg(short, long, default_value = "600")]
        frames: u64,

        /// Simulated seconds per frame
        #[arg(long, default_value = "0.016")]
        dt: f64,

        /// Iteration policy (snapshot or immediate), overrides the config
        #[arg(long, value_parser = parse_policy)]
        policy: Option<String>,

        /// Make participants leave and rejoin: each leaves every K frames
        #[arg(long)]
        churn: Option<u64>,

        /// Path to a runtime config file
        #[arg(long)]
        config: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print the effective runtime config as TOML
    Config {
        /// Path to a runtime config file
        #[arg(long)]
        config: Option<String>,
    },
}

fn parse_policy(s: &str) -> Result<String, String> {
    match s {
        "snapshot" | "immediate" => Ok(s.to_string()),
        _ => Err(format!(
            "unknown iteration policy '{}'; valid values: snapshot, immediate",
            s
        )),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Commands::Simulate {
            participants,
            frames,
            dt,
            policy,
            churn,
            config,
            format,
        } => simulate::run(simulate::SimulateArgs {
            participants,
            frames,
            dt,
            policy,
            churn,
            config,
            format,
        }),
        Commands::Config { config } => config::run(config.as_deref()),
    }
}
