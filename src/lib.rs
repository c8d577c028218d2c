pub mod cli;
pub mod combine;
pub mod dedupe;
pub mod error;
pub mod io_utils;
pub mod matcher;
pub mod missing;
pub mod normalize;
pub mod preview;
pub mod reshape;
pub mod schema;
pub mod table;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("agent_reconcile", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => normalize::execute_normalize(&args),
        Commands::Clean(args) => normalize::execute_clean(&args),
        Commands::Melt(args) => reshape::execute(&args),
        Commands::Match(args) => matcher::execute(&args),
        Commands::Dedup(args) => dedupe::execute(&args),
        Commands::Combine(args) => combine::execute(&args),
        Commands::Missing(args) => missing::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
    }
}
