//! Coffer - multi-tenant in-memory key-value store.
//!
//! Coffer keeps one isolated namespace per tenant holding typed values and
//! binary blobs with optional time-to-live. Blob storage is metered against a
//! per-tenant quota set by the tenant's subscription tier. Snapshots capture
//! one or all tenants in a versioned binary format and merge back into live
//! state. Every request is authenticated with an ed25519 signature over the
//! canonical request body and a single-use salt that rotates on acceptance.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Gateway (external)                          │
//! │          request parsing │ tenant resolution │ responses        │
//! └─────────────────────────────────────────────────────────────────┘
//!                │                                   │
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │     Auth Session Manager     │   │   Snapshot Codec │ PSYNC     │
//! │  keys │ salts │ verification │   │  export │ merge-import       │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!                │                                   │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Store Engine                            │
//! │  tenant table │ per-tenant lock │ typed entries │ TTL │ quotas  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Main runtime orchestration
//! - [`core::time`] - Timestamps and clocks
//! - [`core::error`] - Error types and the stable error taxonomy
//!
//! ## Store
//! - [`store::value`] - Typed values and declared-type conversion
//! - [`store::entry`] - Entries with optional expiry
//! - [`store::tier`] - Subscription tiers and quotas
//! - [`store::tenant`] - Per-tenant state
//! - [`store::engine`] - The store engine
//!
//! ## Snapshots
//! - [`snapshot::format`] - Versioned binary schema
//! - [`snapshot::codec`] - Export, import and inspection
//!
//! ## Auth
//! - [`auth::keys`] - Passphrase-derived keypairs
//! - [`auth::salt`] - Single-use salts
//! - [`auth::canonical`] - Canonical request bytes
//! - [`auth::envelope`] - Signed request envelope
//! - [`auth::session`] - Salt rotation and verification
//!
//! ## Control
//! - [`control::placement`] - Tenant host placement
//!
//! ## Operations
//! - [`ops::info`] - Server info
//! - [`ops::replication`] - CONFIG/PSYNC shim
//! - [`ops::sweeper`] - Background expiry sweeper
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - A tenant's blob usage never exceeds its tier quota after an accepted write
//! - Expired entries are never returned by a read or listed
//! - A salt verifies at most one request

// Core infrastructure
pub mod core;

// Store engine
pub mod store;

// Snapshots
pub mod snapshot;

// Signed-request authentication
pub mod auth;

// Host placement
pub mod control;

// Operations
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime, time};
pub use auth::{AuthSessionManager, Keypair, PublicKey, Salt, SignedRequest};
pub use snapshot::SnapshotCodec;
pub use store::{Store, StoreOptions, SubscriptionTier, TypedValue, ValueType};
