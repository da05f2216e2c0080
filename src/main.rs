//! Coffer - unified CLI entrypoint.
//!
//! Usage:
//!   coffer start --config config/coffer.toml
//!   coffer config validate --config config/coffer.toml
//!   coffer config show [--config config/coffer.toml] [--format json]
//!   coffer keygen --passphrase <passphrase>
//!   coffer sign --passphrase <passphrase> --salt <hex> --body <json>
//!   coffer snapshot inspect <path>

use anyhow::Result;
use clap::Parser;
use coffer::cli::commands::{
    load_config, run_config, run_keygen, run_sign, run_snapshot, run_start,
};
use coffer::cli::{Cli, Commands};
use coffer::core::config::ConfigOverrides;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.map(PathBuf::from);

    match cli.command {
        Commands::Start(args) => run_start(args, config_path.as_deref(), cli.log_level).await,
        Commands::Config(args) => run_config(args),
        Commands::Keygen(args) => {
            let config = load_config(config_path.as_deref(), &ConfigOverrides::default())?;
            run_keygen(args, &config)
        }
        Commands::Sign(args) => run_sign(args),
        Commands::Snapshot(args) => run_snapshot(args),
    }
}
