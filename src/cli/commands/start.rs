//! Start command implementation.

use crate::core::config::{Config, ConfigOverrides};
use crate::core::runtime::Runtime;
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

/// Start the Coffer server.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Override the global tenant ceiling.
    #[arg(long)]
    pub max_tenants: Option<usize>,
}

/// Initialize tracing subscriber if the telemetry feature is enabled.
#[cfg(feature = "telemetry")]
fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(_level: &str) {}

/// Load configuration, falling back to defaults when no file is given.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_overrides(overrides);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Run the start command.
pub async fn run_start(
    args: StartArgs,
    config_path: Option<&Path>,
    log_level: Option<String>,
) -> Result<()> {
    let overrides = ConfigOverrides {
        log_level,
        max_tenants: args.max_tenants,
    };
    let config = load_config(config_path, &overrides)?;
    init_tracing(&config.telemetry.log_level);

    let mut runtime = Runtime::new(config)?;
    runtime.run().await
}
