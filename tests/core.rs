//! Core infrastructure tests.

mod common;

use coffer::core::config::{Config, ConfigOverrides};
use coffer::core::error::{AuthFailureReason, CofferError, ErrorKind};
use coffer::core::time::{Clock, ManualClock, Timestamp};
use coffer::store::tier::SubscriptionTier;

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_minimal_config() {
    let file = common::create_minimal_config();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.store.max_tenants, 4);
    assert_eq!(config.auth.hosts.len(), 2);
    assert_eq!(config.tiers.basic_bytes, 75_000_000);
    assert_eq!(config.tiers.premium_bytes, 150_000_000);
    assert_eq!(config.store.max_blob_bytes, 50_000_000);
    assert_eq!(config.auth.salt_bytes, 32);
    assert!(config.sweeper.enabled);
}

#[test]
fn empty_config_uses_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.store.max_tenants, 10);
    assert_eq!(config.default_tier(), SubscriptionTier::Basic);
    assert_eq!(config.telemetry.log_level, "info");
    assert_eq!(config.replication.port, "6379");
    assert!(config.dr.import_on_start.is_none());
}

#[test]
fn validate_rejects_zero_tenant_ceiling() {
    let file = common::create_config_file("[store]\nmax_tenants = 0\n");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_tenants"));
}

#[test]
fn validate_rejects_unknown_default_tier() {
    let err = Config::from_toml("[store]\ndefault_tier = \"gold\"\n").unwrap_err();
    assert!(err.to_string().contains("default_tier"));
}

#[test]
fn validate_rejects_premium_below_basic() {
    let err = Config::from_toml("[tiers]\nbasic_bytes = 100\npremium_bytes = 50\n").unwrap_err();
    assert!(err.to_string().contains("premium_bytes"));
}

#[test]
fn validate_rejects_short_salts_and_empty_hosts() {
    assert!(Config::from_toml("[auth]\nsalt_bytes = 8\n").is_err());
    assert!(Config::from_toml("[auth]\nhosts = []\n").is_err());
}

#[test]
fn validate_rejects_bad_log_level_and_sweep_period() {
    assert!(Config::from_toml("[telemetry]\nlog_level = \"verbose\"\n").is_err());
    assert!(Config::from_toml("[sweeper]\nperiod_ms = 0\n").is_err());
}

#[test]
fn overrides_apply() {
    let mut config = Config::default();
    config.apply_overrides(&ConfigOverrides {
        log_level: Some("debug".to_string()),
        max_tenants: Some(3),
    });
    assert_eq!(config.telemetry.log_level, "debug");
    assert_eq!(config.store.max_tenants, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn missing_config_file_is_an_error() {
    let err = Config::from_file(std::path::Path::new("/nonexistent/coffer.toml")).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

// ============================================================================
// Error taxonomy tests
// ============================================================================

#[test]
fn error_kinds_are_stable() {
    assert_eq!(CofferError::tenant_not_found("t").kind(), ErrorKind::NotFound);
    assert_eq!(CofferError::key_not_found("k").kind(), ErrorKind::NotFound);
    assert_eq!(
        CofferError::KeyExpired { key: "k".into() }.kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        CofferError::QuotaExceeded {
            requested: 1,
            available: 0,
            limit: 1
        }
        .kind()
        .as_str(),
        "QuotaExceeded"
    );
    assert_eq!(
        CofferError::type_conversion("int", "bad").kind().as_str(),
        "TypeConversionError"
    );
    assert_eq!(
        CofferError::snapshot_format("bad").kind().as_str(),
        "SnapshotFormatError"
    );
    assert_eq!(
        CofferError::TooManyTenants { max_tenants: 10 }.kind(),
        ErrorKind::TooManyTenants
    );
}

#[test]
fn auth_failure_carries_reason() {
    let err = CofferError::auth(AuthFailureReason::StaleSalt);
    assert_eq!(err.kind(), ErrorKind::AuthFailure);
    assert_eq!(err.auth_reason(), Some(AuthFailureReason::StaleSalt));
    assert!(err.to_string().contains("StaleSalt"));
    assert!(!err.is_not_found());
}

// ============================================================================
// Time tests
// ============================================================================

#[test]
fn manual_clock_advances() {
    let clock = ManualClock::new(Timestamp::from_millis(1_000));
    clock.advance_secs(2);
    assert_eq!(clock.now(), Timestamp::from_millis(3_000));
    clock.advance_ms(5);
    assert_eq!(clock.now().ms, 3_005);
    clock.set(Timestamp::zero());
    assert_eq!(clock.now(), Timestamp::zero());
}

#[test]
fn timestamp_arithmetic_saturates() {
    let ts = Timestamp::from_millis(u64::MAX - 1);
    assert_eq!(ts.add_secs(10).ms, u64::MAX);
    assert_eq!(Timestamp::from_millis(10).ms_until(Timestamp::from_millis(4)), 0);
    assert!(Timestamp::from_millis(5).is_at_or_after(Timestamp::from_millis(5)));
    assert_eq!(
        Timestamp::zero().to_rfc3339(),
        "1970-01-01T00:00:00+00:00"
    );
}
