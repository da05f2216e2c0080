//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

use coffer::auth::session::AuthSessionManager;
use coffer::control::placement::HostPlacement;
use coffer::core::time::{ManualClock, Timestamp};
use coffer::snapshot::codec::SnapshotCodec;
use coffer::store::engine::{BlobUpload, Store, StoreOptions};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Instant every test clock starts at.
pub const T0: Timestamp = Timestamp::from_millis(1_700_000_000_000);

/// A store with default limits and a manual clock.
pub fn create_store() -> (Arc<Store>, Arc<ManualClock>) {
    create_store_with(StoreOptions::default())
}

/// A store with custom limits and a manual clock.
pub fn create_store_with(options: StoreOptions) -> (Arc<Store>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(Store::with_clock(options, clock.clone()));
    (store, clock)
}

/// A store limited to `max_tenants` tenants.
pub fn create_store_with_ceiling(max_tenants: usize) -> (Arc<Store>, Arc<ManualClock>) {
    create_store_with(StoreOptions {
        max_tenants,
        ..StoreOptions::default()
    })
}

/// Auth session manager over `store` with a single host and 32-byte salts.
pub fn create_auth(store: Arc<Store>) -> AuthSessionManager {
    let placement = HostPlacement::new(vec!["127.0.0.1:8091".to_string()], 0)
        .expect("single host placement");
    AuthSessionManager::new(store, placement, 32)
}

/// Snapshot codec over `store`.
pub fn create_codec(store: Arc<Store>) -> SnapshotCodec {
    SnapshotCodec::new(store, 32)
}

/// An octet-stream blob of `len` bytes.
pub fn blob(len: usize) -> BlobUpload {
    BlobUpload::new(vec![0xabu8; len], "application/octet-stream")
}

/// Create a minimal valid configuration file.
pub fn create_minimal_config() -> NamedTempFile {
    let config_content = r#"
[store]
max_tenants = 4

[auth]
hosts = ["10.0.0.1:8091", "10.0.0.2:8091"]
"#;

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(config_content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Write arbitrary configuration text to a temp file.
pub fn create_config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}
