//! Snapshot export/import tests.

mod common;

use coffer::core::error::{CofferError, ErrorKind};
use coffer::snapshot::codec::inspect;
use coffer::snapshot::format::{MAX_NESTING, SNAPSHOT_VERSION};
use coffer::store::engine::BlobUpload;
use coffer::store::tier::SubscriptionTier;
use coffer::store::value::{TypedValue, ValueType};
use serde_json::json;

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn export_import_round_trip_drops_expired() {
    let (source, _) = common::create_store();
    source.set("alice", "n", &json!(7), None, None).unwrap();
    source
        .set("alice", "cfg", &json!({"depth": [1, 2, {"x": "y"}]}), None, Some(3600))
        .unwrap();
    source.set("alice", "soon", &json!("bye"), None, Some(5)).unwrap();
    source
        .set_blob(
            "alice",
            "doc",
            BlobUpload::new(vec![1u8, 2, 3], "application/pdf").with_filename("a.pdf"),
            None,
        )
        .unwrap();
    source.set_subscription("alice", "premium").unwrap();

    let bytes = common::create_codec(source.clone()).export(None).unwrap();

    let (target, target_clock) = common::create_store();
    target_clock.set(common::T0.add_secs(10));
    let report = common::create_codec(target.clone()).import(&bytes, None).unwrap();
    assert_eq!(report.tenants_created, 1);
    assert_eq!(report.entries_imported, 3);
    assert_eq!(report.entries_skipped_expired, 1);

    assert_eq!(target.list_keys("alice").unwrap(), vec!["cfg", "doc", "n"]);
    assert_eq!(target.get("alice", "n").unwrap().value, TypedValue::Int(7));
    let cfg = target.get("alice", "cfg").unwrap();
    assert_eq!(cfg.value.to_json(), json!({"depth": [1, 2, {"x": "y"}]}));
    assert_eq!(cfg.expires_at, source.get("alice", "cfg").unwrap().expires_at);

    let blob = target.get_blob("alice", "doc").unwrap();
    assert_eq!(&blob.data[..], &[1u8, 2, 3]);
    assert_eq!(blob.filename.as_deref(), Some("a.pdf"));

    let usage = target.usage("alice").unwrap();
    assert_eq!(usage.tier, SubscriptionTier::Premium);
    assert_eq!(usage.storage_used, 3);
}

#[test]
fn export_skips_entries_expired_at_export_time() {
    let (store, clock) = common::create_store();
    store.set("alice", "gone", &json!(1), None, Some(1)).unwrap();
    store.set("alice", "kept", &json!(2), None, None).unwrap();
    clock.advance_secs(2);

    let bytes = common::create_codec(store).export(Some("alice")).unwrap();
    let summary = inspect(&bytes).unwrap();
    assert!(summary.scoped);
    assert_eq!(summary.tenants.len(), 1);
    assert_eq!(summary.tenants[0].entries, 1);
}

#[test]
fn export_missing_tenant_is_not_found() {
    let (store, _) = common::create_store();
    let err = common::create_codec(store).export(Some("ghost")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn float_bits_survive_round_trip() {
    let (source, _) = common::create_store();
    source
        .set("alice", "pi", &json!(std::f64::consts::PI), None, None)
        .unwrap();
    let bytes = common::create_codec(source).export(None).unwrap();

    let (target, _) = common::create_store();
    common::create_codec(target.clone()).import(&bytes, None).unwrap();
    let record = target.get("alice", "pi").unwrap();
    assert_eq!(record.value_type, ValueType::Float);
    assert_eq!(record.value, TypedValue::Float(std::f64::consts::PI));
}

fn nested_list_text(levels: usize) -> String {
    format!("{}1{}", "[".repeat(levels), "]".repeat(levels))
}

#[test]
fn deepest_accepted_value_survives_round_trip() {
    let (source, _) = common::create_store();
    source
        .set("alice", "deep", &json!(nested_list_text(MAX_NESTING)), Some("list"), None)
        .unwrap();
    let err = source
        .set("alice", "deeper", &json!(nested_list_text(MAX_NESTING + 1)), Some("list"), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeConversionError);

    let bytes = common::create_codec(source.clone()).export(Some("alice")).unwrap();
    let (target, _) = common::create_store();
    common::create_codec(target.clone())
        .import(&bytes, Some("alice"))
        .unwrap();
    assert_eq!(
        target.get("alice", "deep").unwrap().value,
        source.get("alice", "deep").unwrap().value
    );
    assert_eq!(target.list_keys("alice").unwrap(), vec!["deep"]);
}

// ============================================================================
// Merge semantics
// ============================================================================

#[test]
fn import_merges_with_snapshot_winning() {
    let (source, _) = common::create_store();
    source.set("alice", "shared", &json!("snap"), None, None).unwrap();
    source.set("alice", "snap_only", &json!(1), None, None).unwrap();
    let bytes = common::create_codec(source).export(Some("alice")).unwrap();

    let (target, _) = common::create_store();
    target.set("alice", "shared", &json!("live"), None, None).unwrap();
    target.set("alice", "live_only", &json!(2), None, None).unwrap();
    target.set_subscription("alice", "premium").unwrap();

    let report = common::create_codec(target.clone())
        .import(&bytes, Some("alice"))
        .unwrap();
    assert_eq!(report.tenants_merged, 1);
    assert_eq!(report.tenants_created, 0);

    assert_eq!(
        target.list_keys("alice").unwrap(),
        vec!["live_only", "shared", "snap_only"]
    );
    assert_eq!(
        target.get("alice", "shared").unwrap().value,
        TypedValue::Str("snap".to_string())
    );
    // Tier comes from the snapshot too.
    assert_eq!(target.usage("alice").unwrap().tier, SubscriptionTier::Basic);
}

#[test]
fn scoped_import_picks_one_tenant_from_full_snapshot() {
    let (source, _) = common::create_store();
    source.set("alice", "k", &json!(1), None, None).unwrap();
    source.set("bob", "k", &json!(2), None, None).unwrap();
    let bytes = common::create_codec(source).export(None).unwrap();

    let (target, _) = common::create_store();
    common::create_codec(target.clone())
        .import(&bytes, Some("bob"))
        .unwrap();
    assert!(target.contains_tenant("bob"));
    assert!(!target.contains_tenant("alice"));
}

#[test]
fn scoped_import_of_absent_tenant_fails() {
    let (source, _) = common::create_store();
    source.set("alice", "k", &json!(1), None, None).unwrap();
    let bytes = common::create_codec(source).export(Some("alice")).unwrap();

    let (target, _) = common::create_store();
    target.set("carol", "k", &json!(1), None, None).unwrap();
    let err = common::create_codec(target.clone())
        .import(&bytes, Some("carol"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(target.list_keys("carol").unwrap(), vec!["k"]);
    assert!(!target.contains_tenant("alice"));
}

#[test]
fn import_respects_tenant_ceiling() {
    let (source, _) = common::create_store();
    for id in ["a", "b", "c"] {
        source.ping(id).unwrap();
    }
    let bytes = common::create_codec(source).export(None).unwrap();

    let (target, _) = common::create_store_with_ceiling(2);
    target.ping("z").unwrap();
    let err = common::create_codec(target.clone())
        .import(&bytes, None)
        .unwrap_err();
    assert!(matches!(err, CofferError::TooManyTenants { max_tenants: 2 }));
    assert_eq!(target.tenant_count(), 1);
}

#[test]
fn import_rejected_when_merge_exceeds_quota() {
    let (source, _) = common::create_store();
    source
        .set_blob("alice", "snap", common::blob(40_000_000), None)
        .unwrap();
    let bytes = common::create_codec(source).export(None).unwrap();

    let (target, _) = common::create_store();
    target
        .set_blob("alice", "live", common::blob(40_000_000), None)
        .unwrap();
    let err = common::create_codec(target.clone())
        .import(&bytes, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    assert_eq!(target.list_keys("alice").unwrap(), vec!["live"]);
    assert_eq!(target.usage("alice").unwrap().storage_used, 40_000_000);
}

#[test]
fn import_registers_snapshot_public_key() {
    let (source, _) = common::create_store();
    let receipt = common::create_auth(source.clone()).signup("hunter2").unwrap();
    let bytes = common::create_codec(source).export(None).unwrap();

    let (target, _) = common::create_store();
    common::create_codec(target.clone()).import(&bytes, None).unwrap();
    let auth = common::create_auth(target);
    let salt = auth.current_salt(&receipt.tenant_id).unwrap();
    assert_eq!(salt.len(), 32);
    assert_ne!(salt, receipt.salt);
}

// ============================================================================
// Malformed input
// ============================================================================

#[test]
fn unknown_version_rejected() {
    let (store, _) = common::create_store();
    store.ping("alice").unwrap();
    let mut bytes = common::create_codec(store).export(None).unwrap().to_vec();
    let bumped = (SNAPSHOT_VERSION + 1).to_be_bytes();
    bytes[4] = bumped[0];
    bytes[5] = bumped[1];

    let (target, _) = common::create_store();
    let err = common::create_codec(target.clone())
        .import(&bytes, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SnapshotFormatError);
    assert!(err.to_string().contains("version"));
    assert_eq!(target.tenant_count(), 0);
}

#[test]
fn corrupted_snapshot_rejected() {
    let (store, _) = common::create_store();
    store.set("alice", "k", &json!("value"), None, None).unwrap();
    let mut bytes = common::create_codec(store).export(None).unwrap().to_vec();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;

    let (target, _) = common::create_store();
    let err = common::create_codec(target).import(&bytes, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SnapshotFormatError);
}

#[test]
fn garbage_rejected() {
    let (target, _) = common::create_store();
    let codec = common::create_codec(target);
    assert!(codec.import(b"", None).is_err());
    assert!(codec.import(b"not a snapshot at all, just text", None).is_err());
    assert!(inspect(b"CFSN").is_err());
}

// ============================================================================
// Inspection
// ============================================================================

#[test]
fn inspect_summarizes_tenants() {
    let (store, _) = common::create_store();
    store.set_blob("alice", "b", common::blob(64), Some(60)).unwrap();
    store.set("alice", "n", &json!(1), None, None).unwrap();
    store.ping("bob").unwrap();
    let bytes = common::create_codec(store).export(None).unwrap();

    let summary = inspect(&bytes).unwrap();
    assert_eq!(summary.version, SNAPSHOT_VERSION);
    assert_eq!(summary.exported_at, common::T0);
    assert!(!summary.scoped);
    assert_eq!(summary.size_bytes, bytes.len());
    assert_eq!(summary.tenants.len(), 2);
    let alice = &summary.tenants[0];
    assert_eq!(alice.tenant_id, "alice");
    assert_eq!(alice.entries, 2);
    assert_eq!(alice.expiring_entries, 1);
    assert_eq!(alice.storage_used, 64);
    assert!(!alice.registered);
}
