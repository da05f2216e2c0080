//! Configuration parsing and validation.
//!
//! Coffer configuration is loaded from TOML files with CLI overrides.
//! Every section has defaults, so an empty file yields a usable single-host
//! configuration.

use crate::store::tier::{QuotaTable, SubscriptionTier};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level Coffer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store engine limits.
    #[serde(default)]
    pub store: StoreConfig,

    /// Subscription tier quotas.
    #[serde(default)]
    pub tiers: TiersConfig,

    /// Signed-request authentication.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Background expiry sweeper.
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Telemetry and logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Replica sync compatibility parameters.
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Snapshot import/export around the process lifetime.
    #[serde(default)]
    pub dr: DrConfig,
}

/// Store engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Global ceiling on the number of tenants.
    #[serde(default = "default_max_tenants")]
    pub max_tenants: usize,

    /// Largest single blob accepted, in bytes.
    #[serde(default = "default_max_blob_bytes")]
    pub max_blob_bytes: u64,

    /// Tier assigned to newly created tenants.
    #[serde(default = "default_tier")]
    pub default_tier: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_tenants: default_max_tenants(),
            max_blob_bytes: default_max_blob_bytes(),
            default_tier: default_tier(),
        }
    }
}

/// Storage limit per subscription tier, in bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiersConfig {
    #[serde(default = "default_basic_bytes")]
    pub basic_bytes: u64,

    #[serde(default = "default_premium_bytes")]
    pub premium_bytes: u64,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            basic_bytes: default_basic_bytes(),
            premium_bytes: default_premium_bytes(),
        }
    }
}

impl TiersConfig {
    /// Build the quota table used by the store.
    pub fn quota_table(&self) -> QuotaTable {
        QuotaTable::new(self.basic_bytes, self.premium_bytes)
    }
}

/// Signed-request authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Length of each issued salt in bytes.
    #[serde(default = "default_salt_bytes")]
    pub salt_bytes: usize,

    /// Hosts that tenants can be placed on at signup.
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// Hash seed for host placement.
    #[serde(default)]
    pub placement_seed: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            salt_bytes: default_salt_bytes(),
            hosts: default_hosts(),
            placement_seed: 0,
        }
    }
}

/// Background expiry sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Whether the sweeper task runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sweep period in milliseconds.
    #[serde(default = "default_sweep_period_ms")]
    pub period_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: default_sweep_period_ms(),
        }
    }
}

/// Telemetry and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Replica sync compatibility parameters.
///
/// These values are only echoed through CONFIG GET/SET and PSYNC; no actual
/// replication happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    #[serde(default = "default_replica_id")]
    pub master_replid: String,

    #[serde(default = "default_dir")]
    pub dir: String,

    #[serde(default = "default_dbfilename")]
    pub dbfilename: String,

    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default)]
    pub replicaof: String,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            master_replid: default_replica_id(),
            dir: default_dir(),
            dbfilename: default_dbfilename(),
            port: default_port(),
            replicaof: String::new(),
        }
    }
}

/// Snapshot import/export around the process lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrConfig {
    /// Snapshot merged into the store at startup.
    #[serde(default)]
    pub import_on_start: Option<String>,

    /// Destination for an all-tenants snapshot written at shutdown.
    #[serde(default)]
    pub export_on_shutdown: Option<String>,
}

// Default value functions

fn default_max_tenants() -> usize {
    10
}

fn default_max_blob_bytes() -> u64 {
    50_000_000
}

fn default_tier() -> String {
    "basic".to_string()
}

fn default_basic_bytes() -> u64 {
    75_000_000
}

fn default_premium_bytes() -> u64 {
    150_000_000
}

fn default_salt_bytes() -> usize {
    32
}

fn default_hosts() -> Vec<String> {
    vec!["127.0.0.1:8091".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_sweep_period_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_replica_id() -> String {
    "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb".to_string()
}

fn default_dir() -> String {
    "/tmp".to_string()
}

fn default_dbfilename() -> String {
    "dump.cfs".to_string()
}

fn default_port() -> String {
    "6379".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(max_tenants) = overrides.max_tenants {
            self.store.max_tenants = max_tenants;
        }
    }

    /// The tier assigned to new tenants.
    ///
    /// Falls back to basic when the configured name is unknown; `validate`
    /// rejects such configurations before they reach a store.
    pub fn default_tier(&self) -> SubscriptionTier {
        self.store
            .default_tier
            .parse()
            .unwrap_or(SubscriptionTier::Basic)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_store()?;
        self.validate_tiers()?;
        self.validate_auth()?;
        self.validate_sweeper()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_store(&self) -> Result<()> {
        if self.store.max_tenants == 0 {
            anyhow::bail!("store.max_tenants must be > 0");
        }
        if self.store.max_blob_bytes == 0 {
            anyhow::bail!("store.max_blob_bytes must be > 0");
        }
        if self.store.default_tier.parse::<SubscriptionTier>().is_err() {
            anyhow::bail!(
                "store.default_tier must be 'basic' or 'premium', got: {}",
                self.store.default_tier
            );
        }
        Ok(())
    }

    fn validate_tiers(&self) -> Result<()> {
        if self.tiers.basic_bytes == 0 || self.tiers.premium_bytes == 0 {
            anyhow::bail!("tier quotas must be > 0");
        }
        if self.tiers.premium_bytes < self.tiers.basic_bytes {
            anyhow::bail!(
                "tiers.premium_bytes ({}) cannot be below tiers.basic_bytes ({})",
                self.tiers.premium_bytes,
                self.tiers.basic_bytes
            );
        }
        Ok(())
    }

    fn validate_auth(&self) -> Result<()> {
        if self.auth.salt_bytes < 16 {
            anyhow::bail!(
                "auth.salt_bytes must be at least 16, got: {}",
                self.auth.salt_bytes
            );
        }
        if self.auth.hosts.is_empty() {
            anyhow::bail!("auth.hosts must list at least one host");
        }
        Ok(())
    }

    fn validate_sweeper(&self) -> Result<()> {
        if self.sweeper.period_ms == 0 {
            anyhow::bail!("sweeper.period_ms must be > 0");
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override the tenant ceiling.
    pub max_tenants: Option<usize>,
}
