//! modelpack CLI
//!
//! Command line front end over the bundle runtime.
//!
//! # Commands
//!
//! - `validate`: run the configuration validation pipeline on a bundle
//! - `checksum`: recompute (and optionally re-stamp) a bundle's manifest
//! - `predict`: run registered bundles over data, locally
//! - `serve`: expose a registry over the TCP predict protocol

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

/// modelpack - validated, integrity-checked estimator bundles
#[derive(Parser)]
#[command(name = "modelpack")]
#[command(version)]
#[command(about = "Validate, inspect and serve estimator bundles")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a bundle's configuration card
    Validate(commands::validate::ValidateArgs),
    /// Recompute a bundle's integrity checksums
    Checksum(commands::checksum::ChecksumArgs),
    /// Run bundles over data and print the results
    Predict(commands::predict::PredictArgs),
    /// Serve bundles over the TCP predict protocol
    Serve(commands::serve::ServeArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Checksum(args) => commands::checksum::run(args),
        Commands::Predict(args) => commands::predict::run(args),
        Commands::Serve(args) => commands::serve::run(args),
    }
}
