//! Multi-tenant store.
//!
//! This module contains:
//! - [`value`] - Typed values and declared-type conversion
//! - [`entry`] - Stored entries with optional expiry
//! - [`tier`] - Subscription tiers and quotas
//! - [`tenant`] - Per-tenant namespace state
//! - [`engine`] - The store engine and its tenant table

pub mod engine;
pub mod entry;
pub mod tenant;
pub mod tier;
pub mod value;

pub use engine::{
    BlobUpload, Store, StoreOptions, StoreStatsSnapshot, SweepReport, TenantSummary, UsageReport,
    ValueRecord,
};
pub use tier::SubscriptionTier;
pub use value::{Blob, TypedValue, ValueType};
