#![doc = include_str!("../README.md")]

mod config;
mod run;
mod telemetry;

use clap::Parser;
use config::{CliArgs, RunConfig};
use telemetry::init_telemetry;

// Stress runs allocate rows from many threads at once.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;

    #[cfg(feature = "tracing")]
    if cfg!(debug_assertions) {
        tracing::info!("Starting with full config: {:#?}", config);
    }

    match config {
        RunConfig::Scenario(config) => run::scenario(&config),
        RunConfig::Stress(config) => run::stress(&config),
    }
}
