//! Config command implementation.

use crate::core::config::Config;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate configuration file.
    Validate {
        /// Config file path.
        #[arg(short, long, default_value = "config/coffer.toml")]
        config: PathBuf,
    },
    /// Print configuration with defaults.
    Show {
        /// Config file path. Defaults only when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// Run the config command.
pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Validate { config } => validate_config(&config),
        ConfigCommand::Show { config, format } => show_config(config.as_ref(), &format),
    }
}

fn validate_config(path: &PathBuf) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {:?}", path);
    }
    let config = Config::from_file(path)?;
    println!("✓ Configuration is valid");
    println!("  tenants:   max {}", config.store.max_tenants);
    println!(
        "  tiers:     basic {} bytes, premium {} bytes",
        config.tiers.basic_bytes, config.tiers.premium_bytes
    );
    println!("  hosts:     {}", config.auth.hosts.join(", "));
    if !config.sweeper.enabled {
        println!("  ⚠ Warning: expiry sweeper disabled, expired blobs are reclaimed on access only");
    }
    Ok(())
}

fn show_config(path: Option<&PathBuf>, format: &str) -> Result<()> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        "toml" => println!("{}", toml::to_string_pretty(&config)?),
        other => anyhow::bail!("unknown format '{}', expected toml or json", other),
    }
    Ok(())
}
