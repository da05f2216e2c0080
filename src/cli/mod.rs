//! Command-line interface.
//!
//! Unified CLI for Coffer operations.

pub mod commands;

use clap::{Parser, Subcommand};

/// Coffer - multi-tenant in-memory key-value store with signed requests.
#[derive(Parser, Debug)]
#[command(name = "coffer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Coffer server.
    Start(commands::StartArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
    /// Derive a keypair from a passphrase.
    Keygen(commands::KeygenArgs),
    /// Produce a signed request envelope.
    Sign(commands::SignArgs),
    /// Snapshot operations.
    Snapshot(commands::SnapshotArgs),
}
