//! Store engine.
//!
//! The [`Store`] owns the tenant table. The table lock is held only to look
//! up, insert or remove a tenant handle; every operation then runs under that
//! tenant's own mutex, so requests for different tenants never contend beyond
//! the lookup. Value parsing happens before the tenant lock is taken.

use crate::core::config::Config;
use crate::core::error::{CofferError, CofferResult};
use crate::core::time::{Clock, SystemClock, Timestamp};
use crate::store::entry::Entry;
use crate::store::tenant::TenantState;
use crate::store::tier::{QuotaTable, SubscriptionTier};
use crate::store::value::{parse_declared, Blob, TypedValue, ValueType};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared handle to one tenant's state.
pub(crate) type TenantHandle = Arc<Mutex<TenantState>>;

/// Limits applied by the store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Global ceiling on the number of tenants.
    pub max_tenants: usize,
    /// Largest single blob accepted.
    pub max_blob_bytes: u64,
    /// Tier assigned to new tenants.
    pub default_tier: SubscriptionTier,
    /// Quota per tier.
    pub quotas: QuotaTable,
}

impl StoreOptions {
    /// Options derived from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tenants: config.store.max_tenants,
            max_blob_bytes: config.store.max_blob_bytes,
            default_tier: config.default_tier(),
            quotas: config.tiers.quota_table(),
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A blob upload as delivered by the transport.
#[derive(Debug, Clone)]
pub struct BlobUpload {
    pub data: Bytes,
    pub content_type: String,
    pub filename: Option<String>,
}

impl BlobUpload {
    /// Create an upload without a filename.
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            filename: None,
        }
    }

    /// Attach the original filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// A value read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRecord {
    pub value: TypedValue,
    pub value_type: ValueType,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

/// Storage accounting for one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageReport {
    pub storage_used: u64,
    pub storage_limit: u64,
    pub tier: SubscriptionTier,
}

/// Summary row for tenant listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSummary {
    pub tenant_id: String,
    pub tier: SubscriptionTier,
    pub storage_used: u64,
    pub live_keys: usize,
    pub registered: bool,
    pub created_at: Timestamp,
}

/// Outcome of one sweep across all tenants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub tenants_scanned: usize,
    pub entries_purged: usize,
    pub bytes_reclaimed: u64,
}

/// Store operation counters.
#[derive(Debug, Default)]
struct StoreStats {
    sets: AtomicU64,
    blob_sets: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
    expired_purged: AtomicU64,
    quota_rejections: AtomicU64,
}

/// Point-in-time copy of the store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatsSnapshot {
    pub sets: u64,
    pub blob_sets: u64,
    pub gets: u64,
    pub deletes: u64,
    pub expired_purged: u64,
    pub quota_rejections: u64,
}

/// Multi-tenant in-memory store.
pub struct Store {
    tenants: RwLock<HashMap<String, TenantHandle>>,
    options: StoreOptions,
    clock: Arc<dyn Clock>,
    started_at: Timestamp,
    stats: StoreStats,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("tenants", &self.tenant_count())
            .field("options", &self.options)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl Store {
    /// Create a store reading wall-clock time.
    pub fn new(options: StoreOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`.
    pub fn with_clock(options: StoreOptions, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            tenants: RwLock::new(HashMap::new()),
            options,
            clock,
            started_at,
            stats: StoreStats::default(),
        }
    }

    /// Configured limits.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Current instant according to the store clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Instant the store was created.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Number of tenants in the table.
    pub fn tenant_count(&self) -> usize {
        self.tenants.read().len()
    }

    /// Check if a tenant exists.
    pub fn contains_tenant(&self, tenant_id: &str) -> bool {
        self.tenants.read().contains_key(tenant_id)
    }

    /// Quota for a tier.
    pub fn limit_for(&self, tier: SubscriptionTier) -> u64 {
        self.options.quotas.limit_for(tier)
    }

    // ========================================================================
    // Tenant access
    // ========================================================================

    fn handle(&self, tenant_id: &str) -> Option<TenantHandle> {
        self.tenants.read().get(tenant_id).cloned()
    }

    fn handle_or_create(&self, tenant_id: &str) -> CofferResult<TenantHandle> {
        if let Some(handle) = self.handle(tenant_id) {
            return Ok(handle);
        }
        let mut tenants = self.tenants.write();
        if let Some(handle) = tenants.get(tenant_id) {
            return Ok(handle.clone());
        }
        if tenants.len() >= self.options.max_tenants {
            warn!(
                tenant_id = %tenant_id,
                max_tenants = self.options.max_tenants,
                "tenant ceiling reached"
            );
            return Err(CofferError::TooManyTenants {
                max_tenants: self.options.max_tenants,
            });
        }
        let state = TenantState::new(tenant_id, self.options.default_tier, self.clock.now());
        let handle = Arc::new(Mutex::new(state));
        tenants.insert(tenant_id.to_string(), handle.clone());
        info!(tenant_id = %tenant_id, tier = %self.options.default_tier, "tenant created");
        Ok(handle)
    }

    /// Run `f` under the lock of an existing tenant.
    pub(crate) fn with_tenant<R>(
        &self,
        tenant_id: &str,
        f: impl FnOnce(&mut TenantState) -> CofferResult<R>,
    ) -> CofferResult<R> {
        let handle = self
            .handle(tenant_id)
            .ok_or_else(|| CofferError::tenant_not_found(tenant_id))?;
        let mut state = handle.lock();
        if state.is_retired() {
            return Err(CofferError::tenant_not_found(tenant_id));
        }
        f(&mut state)
    }

    /// Run `f` under the lock of a tenant, creating it if absent.
    pub(crate) fn with_tenant_or_create<R>(
        &self,
        tenant_id: &str,
        f: impl FnOnce(&mut TenantState) -> CofferResult<R>,
    ) -> CofferResult<R> {
        loop {
            let handle = self.handle_or_create(tenant_id)?;
            let mut state = handle.lock();
            if state.is_retired() {
                // Deleted between lookup and lock; the table no longer holds it.
                drop(state);
                continue;
            }
            return f(&mut state);
        }
    }

    /// Handles of every tenant, sorted by id.
    pub(crate) fn handles(&self) -> Vec<(String, TenantHandle)> {
        let mut handles: Vec<_> = self
            .tenants
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
    }

    fn check_key(key: &str) -> CofferResult<()> {
        if key.is_empty() {
            return Err(CofferError::invalid_request("key must not be empty"));
        }
        Ok(())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Liveness check; creates the tenant if absent.
    pub fn ping(&self, tenant_id: &str) -> CofferResult<&'static str> {
        self.with_tenant_or_create(tenant_id, |_| Ok(()))?;
        Ok("PONG")
    }

    /// Return `message`; creates the tenant if absent.
    pub fn echo(&self, tenant_id: &str, message: &str) -> CofferResult<String> {
        self.with_tenant_or_create(tenant_id, |_| Ok(()))?;
        Ok(message.to_string())
    }

    /// Store a typed value.
    ///
    /// `declared` names the target type; `None` infers it from the input.
    /// A `ttl_secs` of zero means no expiry.
    pub fn set(
        &self,
        tenant_id: &str,
        key: &str,
        input: &JsonValue,
        declared: Option<&str>,
        ttl_secs: Option<u64>,
    ) -> CofferResult<ValueType> {
        Self::check_key(key)?;
        let value = parse_declared(declared, input)?;
        let value_type = value.value_type();

        self.with_tenant_or_create(tenant_id, |tenant| {
            let entry = Entry::with_ttl(value, self.clock.now(), ttl_secs);
            tenant.insert(key, entry);
            Ok(())
        })?;

        self.stats.sets.fetch_add(1, Ordering::Relaxed);
        debug!(tenant_id = %tenant_id, key = %key, value_type = %value_type, "set");
        Ok(value_type)
    }

    /// Store a blob, charging its size against the tenant quota.
    ///
    /// Returns the tenant's usage after the write.
    pub fn set_blob(
        &self,
        tenant_id: &str,
        key: &str,
        upload: BlobUpload,
        ttl_secs: Option<u64>,
    ) -> CofferResult<u64> {
        Self::check_key(key)?;
        let size = upload.data.len() as u64;
        if size > self.options.max_blob_bytes {
            return Err(CofferError::invalid_request(format!(
                "blob of {} bytes exceeds the {} byte upload limit",
                size, self.options.max_blob_bytes
            )));
        }
        let blob = Blob {
            data: upload.data,
            content_type: upload.content_type,
            filename: upload.filename,
        };

        let result = self.with_tenant_or_create(tenant_id, |tenant| {
            let now = self.clock.now();
            tenant.purge_expired(now);

            let limit = self.limit_for(tenant.tier());
            let base = tenant
                .storage_used()
                .saturating_sub(tenant.metered_size_of(key));
            if base.saturating_add(size) > limit {
                return Err(CofferError::QuotaExceeded {
                    requested: size,
                    available: limit.saturating_sub(base),
                    limit,
                });
            }

            tenant.insert(key, Entry::with_ttl(TypedValue::Blob(blob), now, ttl_secs));
            Ok(tenant.storage_used())
        });

        match &result {
            Ok(used) => {
                self.stats.blob_sets.fetch_add(1, Ordering::Relaxed);
                debug!(tenant_id = %tenant_id, key = %key, size, storage_used = *used, "blob stored");
            }
            Err(CofferError::QuotaExceeded { .. }) => {
                self.stats.quota_rejections.fetch_add(1, Ordering::Relaxed);
                warn!(tenant_id = %tenant_id, key = %key, size, "blob rejected over quota");
            }
            Err(_) => {}
        }
        result
    }

    /// Read a value.
    pub fn get(&self, tenant_id: &str, key: &str) -> CofferResult<ValueRecord> {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        let result = self.with_tenant(tenant_id, |tenant| {
            let entry = tenant.get_live(key, now)?;
            Ok(ValueRecord {
                value: entry.value.clone(),
                value_type: entry.value_type(),
                created_at: entry.created_at,
                expires_at: entry.expires_at,
            })
        });
        if let Err(CofferError::KeyExpired { .. }) = result {
            self.stats.expired_purged.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Read a blob with its metadata.
    pub fn get_blob(&self, tenant_id: &str, key: &str) -> CofferResult<Blob> {
        let record = self.get(tenant_id, key)?;
        match record.value {
            TypedValue::Blob(blob) => Ok(blob),
            other => Err(CofferError::invalid_request(format!(
                "key '{}' holds a {} value, not a blob",
                key,
                other.value_type()
            ))),
        }
    }

    /// Sorted keys of live entries.
    pub fn list_keys(&self, tenant_id: &str) -> CofferResult<Vec<String>> {
        let now = self.clock.now();
        self.with_tenant(tenant_id, |tenant| Ok(tenant.live_keys(now)))
    }

    /// Delete one key.
    pub fn delete_key(&self, tenant_id: &str, key: &str) -> CofferResult<()> {
        let now = self.clock.now();
        self.with_tenant(tenant_id, |tenant| {
            let removed = tenant
                .remove(key)
                .ok_or_else(|| CofferError::key_not_found(key))?;
            if removed.is_expired_at(now) {
                return Err(CofferError::KeyExpired {
                    key: key.to_string(),
                });
            }
            Ok(())
        })?;
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        debug!(tenant_id = %tenant_id, key = %key, "key deleted");
        Ok(())
    }

    /// Delete a tenant and all its entries.
    pub fn delete_tenant(&self, tenant_id: &str) -> CofferResult<()> {
        let handle = self
            .tenants
            .write()
            .remove(tenant_id)
            .ok_or_else(|| CofferError::tenant_not_found(tenant_id))?;
        handle.lock().retire();
        info!(tenant_id = %tenant_id, "tenant deleted");
        Ok(())
    }

    /// Delete every tenant. Returns how many were removed.
    pub fn delete_all(&self) -> usize {
        let drained: Vec<TenantHandle> = self.tenants.write().drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.lock().retire();
        }
        info!(tenants = drained.len(), "all tenants deleted");
        drained.len()
    }

    /// Change a tenant's subscription tier.
    pub fn set_subscription(&self, tenant_id: &str, tier: &str) -> CofferResult<SubscriptionTier> {
        let tier: SubscriptionTier = tier.parse()?;
        let now = self.clock.now();
        self.with_tenant(tenant_id, |tenant| {
            tenant.purge_expired(now);
            let usage = tenant.recompute_usage();
            let limit = self.limit_for(tier);
            if usage > limit {
                warn!(
                    tenant_id = %tenant_id,
                    tier = %tier,
                    usage,
                    limit,
                    "subscription change rejected"
                );
                return Err(CofferError::QuotaViolation {
                    tier: tier.to_string(),
                    usage,
                    limit,
                });
            }
            let previous = tenant.tier();
            tenant.set_tier(tier);
            info!(tenant_id = %tenant_id, from = %previous, to = %tier, "subscription changed");
            Ok(tier)
        })
    }

    /// Storage usage, recomputed from live blobs.
    pub fn usage(&self, tenant_id: &str) -> CofferResult<UsageReport> {
        let now = self.clock.now();
        self.with_tenant(tenant_id, |tenant| {
            tenant.purge_expired(now);
            let storage_used = tenant.recompute_usage();
            Ok(UsageReport {
                storage_used,
                storage_limit: self.limit_for(tenant.tier()),
                tier: tenant.tier(),
            })
        })
    }

    /// Summaries of every tenant, sorted by id.
    pub fn list_tenants(&self) -> Vec<TenantSummary> {
        let now = self.clock.now();
        self.handles()
            .into_iter()
            .filter_map(|(_, handle)| {
                let tenant = handle.lock();
                if tenant.is_retired() {
                    return None;
                }
                Some(TenantSummary {
                    tenant_id: tenant.id().to_string(),
                    tier: tenant.tier(),
                    storage_used: tenant.storage_used(),
                    live_keys: tenant.live_entry_count(now),
                    registered: tenant.registration().is_some(),
                    created_at: tenant.created_at(),
                })
            })
            .collect()
    }

    /// Purge expired entries across all tenants, one tenant lock at a time.
    pub fn sweep_expired(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for (_, handle) in self.handles() {
            let now = self.clock.now();
            let mut tenant = handle.lock();
            if tenant.is_retired() {
                continue;
            }
            let outcome = tenant.purge_expired(now);
            report.tenants_scanned += 1;
            report.entries_purged += outcome.entries;
            report.bytes_reclaimed += outcome.bytes;
        }
        self.stats
            .expired_purged
            .fetch_add(report.entries_purged as u64, Ordering::Relaxed);
        if report.entries_purged > 0 {
            debug!(
                entries = report.entries_purged,
                bytes = report.bytes_reclaimed,
                "expired entries swept"
            );
        }
        report
    }

    /// Current operation counters.
    pub fn stats(&self) -> StoreStatsSnapshot {
        StoreStatsSnapshot {
            sets: self.stats.sets.load(Ordering::Relaxed),
            blob_sets: self.stats.blob_sets.load(Ordering::Relaxed),
            gets: self.stats.gets.load(Ordering::Relaxed),
            deletes: self.stats.deletes.load(Ordering::Relaxed),
            expired_purged: self.stats.expired_purged.load(Ordering::Relaxed),
            quota_rejections: self.stats.quota_rejections.load(Ordering::Relaxed),
        }
    }
}
