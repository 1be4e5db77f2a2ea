//! henry-bridge: Henry turnstile online-validation bridge.
//!
//! `serve` runs the bridge; `simulate` plays a turnstile against a running
//! bridge.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod serve;
mod signal;
mod simulate;

/// Henry turnstile bridge
#[derive(Parser, Debug)]
#[command(name = "henry-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive);
    /// falls back to RUST_LOG, then `info`
    #[arg(long, env = "HENRY_LOG", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept turnstile connections and answer them from the backend
    Serve(serve::ServeArgs),

    /// Send one or more access events to a running bridge
    Simulate(simulate::SimulateArgs),
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).map_err(drop),
        None => EnvFilter::try_from_default_env().map_err(drop),
    }
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Commands::Serve(args) => serve::run(args).await,
        Commands::Simulate(args) => simulate::run(args).await,
    }
}
