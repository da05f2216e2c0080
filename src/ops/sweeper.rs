//! Background expiry sweeper.
//!
//! Reads already purge expired entries lazily. The sweeper reclaims space
//! held by entries nobody reads, one tenant lock at a time.

use crate::core::config::SweeperConfig;
use crate::store::engine::{Store, SweepReport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Periodic sweeper task.
#[derive(Debug)]
pub struct ExpirySweeper {
    store: Arc<Store>,
    period: Duration,
    runs: AtomicU64,
}

impl ExpirySweeper {
    /// Create a sweeper running every `period`.
    pub fn new(store: Arc<Store>, period: Duration) -> Self {
        Self {
            store,
            period,
            runs: AtomicU64::new(0),
        }
    }

    /// Create a sweeper from configuration.
    pub fn from_config(store: Arc<Store>, config: &SweeperConfig) -> Self {
        Self::new(store, Duration::from_millis(config.period_ms))
    }

    /// Sweep period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Completed sweeps.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Run a single sweep.
    pub fn run_once(&self) -> SweepReport {
        let report = self.store.sweep_expired();
        self.runs.fetch_add(1, Ordering::Relaxed);
        report
    }

    /// Spawn the sweep loop. It exits when `shutdown` turns true or its
    /// sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_ms = self.period.as_millis() as u64, "expiry sweeper started");
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.run_once();
                        if report.entries_purged > 0 {
                            debug!(
                                tenants = report.tenants_scanned,
                                entries = report.entries_purged,
                                bytes = report.bytes_reclaimed,
                                "sweep complete"
                            );
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(runs = self.runs(), "expiry sweeper stopped");
        })
    }
}
