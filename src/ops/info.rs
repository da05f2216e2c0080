//! Server info.

use crate::store::engine::{Store, StoreStatsSnapshot};

/// Crate version baked in at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Snapshot of server state for the INFO command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub tenant_count: usize,
    pub max_tenants: usize,
    pub uptime_ms: u64,
    pub features: Vec<&'static str>,
    pub stats: StoreStatsSnapshot,
}

impl ServerInfo {
    /// Collect info from a store.
    pub fn collect(store: &Store) -> Self {
        Self {
            name: "coffer",
            version: VERSION,
            tenant_count: store.tenant_count(),
            max_tenants: store.options().max_tenants,
            uptime_ms: store.started_at().ms_until(store.now()),
            features: enabled_features(),
            stats: store.stats(),
        }
    }
}

fn enabled_features() -> Vec<&'static str> {
    let mut features = Vec::new();
    if cfg!(feature = "telemetry") {
        features.push("telemetry");
    }
    features
}

impl std::fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# Server")?;
        writeln!(f, "server_name:{}", self.name)?;
        writeln!(f, "version:{}", self.version)?;
        writeln!(f, "uptime_in_seconds:{}", self.uptime_ms / 1000)?;
        writeln!(f, "features:{}", self.features.join(","))?;
        writeln!(f, "# Tenants")?;
        writeln!(f, "tenants:{}", self.tenant_count)?;
        writeln!(f, "max_tenants:{}", self.max_tenants)?;
        writeln!(f, "# Stats")?;
        writeln!(f, "sets:{}", self.stats.sets)?;
        writeln!(f, "blob_sets:{}", self.stats.blob_sets)?;
        writeln!(f, "gets:{}", self.stats.gets)?;
        writeln!(f, "deletes:{}", self.stats.deletes)?;
        writeln!(f, "expired_purged:{}", self.stats.expired_purged)?;
        write!(f, "quota_rejections:{}", self.stats.quota_rejections)
    }
}
