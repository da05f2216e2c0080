//! Main runtime orchestration.
//!
//! The runtime owns the store and the services built on it:
//! - Start order: store → snapshot import → auth → replication shim → sweeper
//! - Shutdown order: sweeper → snapshot export

use crate::auth::session::AuthSessionManager;
use crate::core::config::Config;
use crate::core::time::Clock;
use crate::ops::info::ServerInfo;
use crate::ops::replication::ReplicationShim;
use crate::ops::sweeper::ExpirySweeper;
use crate::snapshot::codec::SnapshotCodec;
use crate::store::engine::{Store, StoreOptions};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Coffer runtime holding all component handles.
pub struct Runtime {
    /// Configuration.
    config: Arc<Config>,

    /// Tenant store.
    store: Arc<Store>,

    /// Signed-request verification.
    auth: Arc<AuthSessionManager>,

    /// Snapshot export/import.
    snapshots: Arc<SnapshotCodec>,

    /// CONFIG/PSYNC shim.
    replication: Arc<ReplicationShim>,

    /// Whether the runtime is running.
    running: Arc<AtomicBool>,

    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,

    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,

    /// Sweeper task handle.
    sweeper_handle: Option<JoinHandle<()>>,
}

impl Runtime {
    /// Create a runtime reading wall-clock time.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let store = Arc::new(Store::new(StoreOptions::from_config(&config)));
        Self::assemble(config, store)
    }

    /// Create a runtime whose store reads time from `clock`.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let store = Arc::new(Store::with_clock(StoreOptions::from_config(&config), clock));
        Self::assemble(config, store)
    }

    fn assemble(config: Config, store: Arc<Store>) -> Result<Self> {
        let auth = AuthSessionManager::from_config(store.clone(), &config)
            .context("failed to build auth session manager")?;
        let snapshots = Arc::new(SnapshotCodec::new(store.clone(), config.auth.salt_bytes));
        let replication = ReplicationShim::new(&config.replication, snapshots.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            store,
            auth: Arc::new(auth),
            snapshots,
            replication: Arc::new(replication),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
            sweeper_handle: None,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tenant store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Auth session manager.
    pub fn auth(&self) -> &Arc<AuthSessionManager> {
        &self.auth
    }

    /// Snapshot codec.
    pub fn snapshots(&self) -> &Arc<SnapshotCodec> {
        &self.snapshots
    }

    /// Replication shim.
    pub fn replication(&self) -> &Arc<ReplicationShim> {
        &self.replication
    }

    /// Current server info.
    pub fn info(&self) -> ServerInfo {
        ServerInfo::collect(&self.store)
    }

    /// Check if the runtime is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Start the runtime components.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(
            max_tenants = self.config.store.max_tenants,
            default_tier = %self.config.store.default_tier,
            "starting Coffer runtime"
        );

        if let Some(path) = self.config.dr.import_on_start.clone() {
            self.import_from(Path::new(&path)).await?;
        }

        if self.config.sweeper.enabled {
            let sweeper = Arc::new(ExpirySweeper::from_config(
                self.store.clone(),
                &self.config.sweeper,
            ));
            self.sweeper_handle = Some(sweeper.spawn(self.shutdown_rx.clone()));
        }

        self.running.store(true, Ordering::Release);
        tracing::info!(hosts = ?self.config.auth.hosts, "Coffer runtime started");
        Ok(())
    }

    /// Merge a snapshot file into the store.
    pub async fn import_from(&self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
        let report = self
            .snapshots
            .import(&bytes, None)
            .with_context(|| format!("failed to import snapshot: {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            created = report.tenants_created,
            merged = report.tenants_merged,
            "startup snapshot imported"
        );
        Ok(())
    }

    /// Write an all-tenants snapshot file.
    pub async fn export_to(&self, path: &Path) -> Result<()> {
        let bytes = self
            .snapshots
            .export(None)
            .context("failed to export snapshot")?;
        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("failed to write snapshot: {}", path.display()))?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the runtime until ctrl-c or a shutdown request.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("shutdown signal received (SIGINT)");
            }
            _ = async {
                while !*shutdown_rx.borrow() {
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            } => {
                tracing::info!("shutdown requested by component");
            }
        }

        self.stop().await
    }

    /// Stop the runtime components.
    pub async fn stop(&mut self) -> Result<()> {
        tracing::info!("stopping Coffer runtime");
        self.running.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.sweeper_handle.take() {
            match tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
                Ok(Ok(())) => tracing::debug!("sweeper stopped"),
                Ok(Err(e)) => tracing::warn!(error = %e, "sweeper task panicked"),
                Err(_) => tracing::warn!("sweeper stop timed out"),
            }
        }

        if let Some(path) = self.config.dr.export_on_shutdown.clone() {
            self.export_to(Path::new(&path)).await?;
        }

        tracing::info!("Coffer runtime stopped");
        Ok(())
    }
}
