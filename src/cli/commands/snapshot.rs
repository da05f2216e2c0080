//! Snapshot command implementation.

use crate::snapshot::codec::inspect;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Snapshot operations.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

/// Snapshot subcommands.
#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Inspect a snapshot file.
    Inspect {
        /// Snapshot path.
        path: PathBuf,
    },
}

/// Run the snapshot command.
pub fn run_snapshot(args: SnapshotArgs) -> Result<()> {
    match args.command {
        SnapshotCommand::Inspect { path } => inspect_snapshot(&path),
    }
}

fn inspect_snapshot(path: &PathBuf) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read snapshot {:?}", path))?;
    let summary = inspect(&bytes).with_context(|| format!("invalid snapshot {:?}", path))?;

    println!("Snapshot: {:?}", path);
    println!("  version:     {}", summary.version);
    println!("  exported_at: {}", summary.exported_at.to_rfc3339());
    println!(
        "  scope:       {}",
        if summary.scoped { "single tenant" } else { "all tenants" }
    );
    println!("  size:        {} bytes", summary.size_bytes);
    println!("  tenants:     {}", summary.tenants.len());
    for tenant in &summary.tenants {
        println!(
            "    {} tier={} entries={} expiring={} blob_bytes={} registered={}",
            tenant.tenant_id,
            tenant.tier,
            tenant.entries,
            tenant.expiring_entries,
            tenant.storage_used,
            tenant.registered
        );
    }
    Ok(())
}
