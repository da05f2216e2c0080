//! Point-in-time snapshots.
//!
//! - [`format`] - Versioned binary schema
//! - [`codec`] - Export, merge-import and inspection against a live store

pub mod codec;
pub mod format;

pub use codec::{inspect, ImportReport, SnapshotCodec, SnapshotInspection, TenantInspection};
pub use format::{SnapshotImage, TenantImage, SNAPSHOT_VERSION};
