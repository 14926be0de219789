//! # apg
//!
//! A command-line client for an API Registry.
//!
//! ## Quick Start
//!
//! ```bash
//! # Create and activate a connection profile
//! apg config create local --registry.address localhost:8080 --registry.insecure --registry.project demo
//!
//! # Upload a tree of OpenAPI descriptions
//! apg upload openapi ./specs --parent projects/demo/locations/global
//!
//! # Label every version of every API
//! apg label apis/-/versions/- tier=gold --overwrite
//!
//! # Compute complexity artifacts for all specs
//! apg compute complexity apis/-/versions/-/specs/-
//! ```

use anyhow::Result;
use apg::cancel::Cancellation;
use apg::{commands, Cli};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cmd = cli.cmd.unwrap_or_else(|| {
        eprintln!("No command provided. Use --help to see available commands.");
        std::process::exit(1);
    });

    let cancellation = Cancellation::new();
    cancellation.cancel_on_ctrl_c();
    commands::run(cmd, &cli.connection, cancellation).await
}
