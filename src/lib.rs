//! # apg
//!
//! Core library for the `apg` API Registry client: resource patterns, the
//! registry client seam, a bounded worker pool for bulk operations, and the
//! summaries computed from API descriptions.

use clap::{ArgAction, Parser};

pub mod analysis;
pub mod cancel;
pub mod commands;
pub mod config;
pub mod constants;
pub mod labeling;
pub mod mime;
pub mod names;
pub mod pool;
pub mod registry;
pub mod visitor;

/// Command-line client for an API Registry
///
/// Lists, labels and deletes registry resources in bulk, uploads API
/// descriptions and computes derived artifacts such as complexity,
/// vocabulary and lint results.
#[derive(Parser)]
#[command(
    name = "apg",
    version,
    about = "Command-line client for an API Registry",
    long_about = "Command-line client for an API Registry.\n\nResource arguments are names or patterns such as\nprojects/demo/locations/global/apis/-/versions/-/specs, where `-` matches any identifier.\nRelative patterns are qualified with the configured project and location."
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: config::ConnectionArgs,

    /// Increase logging (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Option<commands::Commands>,
}
