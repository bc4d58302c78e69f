//! FlashPool CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use flashpool_engine::{ConfigLoader, EngineConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flashpool")]
#[command(about = "FlashPool - Flash-loan admission and settlement", long_about = None)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config file
    Check,

    /// List the configured pools
    Pools {
        /// Only pools on this chain
        #[arg(long)]
        chain: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run a batch of borrowers against one pool
    Simulate {
        /// Pool to borrow from
        #[arg(long, default_value_t = 1)]
        pool: u64,
        /// Number of borrowers
        #[arg(long, default_value_t = 10)]
        borrowers: u32,
        /// Principal per loan, in smallest token units
        #[arg(long)]
        principal: u64,
        /// Loan duration in seconds
        #[arg(long, default_value_t = 2)]
        duration: u64,
        /// Every K-th borrower repays, the rest default (0 = nobody repays)
        #[arg(long, default_value_t = 2)]
        repay_every: u32,
    },

    /// Print the records of the configured journal
    Journal {
        /// Only the last N records
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_file(path)?,
        None => EngineConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Check => commands::check(&config),
        Commands::Pools { chain, json } => commands::pools(config, chain.as_deref(), json),
        Commands::Simulate {
            pool,
            borrowers,
            principal,
            duration,
            repay_every,
        } => {
            let plan = commands::SimulationPlan {
                pool,
                borrowers,
                principal,
                duration,
                repay_every,
            };
            commands::simulate(config, plan).await
        }
        Commands::Journal { limit } => commands::journal(&config, limit),
    }
}
