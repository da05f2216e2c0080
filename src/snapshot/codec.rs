//! Snapshot export, import and inspection.
//!
//! Export copies tenant state under each tenant lock and encodes after the
//! lock is released. Import decodes and validates the whole payload before
//! touching live state, then merges one tenant at a time under that tenant's
//! lock. Each tenant merge is all-or-nothing; an all-tenants import is not
//! atomic across tenants.

use crate::auth::salt::Salt;
use crate::core::error::{CofferError, CofferResult};
use crate::core::time::Timestamp;
use crate::snapshot::format::{
    decode, encode, SnapshotFlags, SnapshotImage, TenantImage, SNAPSHOT_VERSION,
};
use crate::store::engine::Store;
use crate::store::entry::Entry;
use crate::store::tenant::{Registration, TenantState};
use crate::store::tier::SubscriptionTier;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Tenants absent live and created from the snapshot.
    pub tenants_created: usize,
    /// Live tenants merged with snapshot entries.
    pub tenants_merged: usize,
    /// Entries written into live state.
    pub entries_imported: usize,
    /// Snapshot entries already expired at import time.
    pub entries_skipped_expired: usize,
}

/// Per-tenant line of a snapshot inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantInspection {
    pub tenant_id: String,
    pub tier: SubscriptionTier,
    pub storage_used: u64,
    pub entries: usize,
    pub expiring_entries: usize,
    pub registered: bool,
}

/// Summary of a snapshot without applying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInspection {
    pub version: u16,
    pub exported_at: Timestamp,
    pub scoped: bool,
    pub size_bytes: usize,
    pub tenants: Vec<TenantInspection>,
}

/// Decode a snapshot and summarize it.
pub fn inspect(bytes: &[u8]) -> CofferResult<SnapshotInspection> {
    let image = decode(bytes)?;
    Ok(SnapshotInspection {
        version: image.version,
        exported_at: image.exported_at,
        scoped: image.is_scoped(),
        size_bytes: bytes.len(),
        tenants: image
            .tenants
            .iter()
            .map(|t| TenantInspection {
                tenant_id: t.tenant_id.clone(),
                tier: t.tier,
                storage_used: t.storage_used,
                entries: t.entries.len(),
                expiring_entries: t
                    .entries
                    .iter()
                    .filter(|(_, e)| e.expires_at.is_some())
                    .count(),
                registered: t.public_key.is_some(),
            })
            .collect(),
    })
}

#[derive(Debug, Default)]
struct CodecStats {
    exports: AtomicU64,
    imports: AtomicU64,
    imports_failed: AtomicU64,
}

/// Snapshot codec bound to a store.
#[derive(Debug)]
pub struct SnapshotCodec {
    store: Arc<Store>,
    salt_len: usize,
    stats: CodecStats,
}

impl SnapshotCodec {
    /// Create a codec. Registrations created by import get salts of `salt_len` bytes.
    pub fn new(store: Arc<Store>, salt_len: usize) -> Self {
        Self {
            store,
            salt_len,
            stats: CodecStats::default(),
        }
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Export one tenant, or every tenant when `tenant_id` is `None`.
    ///
    /// Entries already expired are left out.
    pub fn export(&self, tenant_id: Option<&str>) -> CofferResult<Bytes> {
        let now = self.store.now();
        let (flags, tenants) = match tenant_id {
            Some(id) => {
                let image = self.store.with_tenant(id, |tenant| Ok(capture(tenant, now)))?;
                (SnapshotFlags::SCOPED, vec![image])
            }
            None => {
                let mut images = Vec::new();
                for (_, handle) in self.store.handles() {
                    let tenant = handle.lock();
                    if tenant.is_retired() {
                        continue;
                    }
                    images.push(capture(&tenant, now));
                }
                (SnapshotFlags::empty(), images)
            }
        };

        let image = SnapshotImage {
            version: SNAPSHOT_VERSION,
            flags,
            exported_at: now,
            tenants,
        };
        let bytes = encode(&image)?;
        self.stats.exports.fetch_add(1, Ordering::Relaxed);
        info!(
            scope = tenant_id.unwrap_or("all"),
            tenants = image.tenants.len(),
            bytes = bytes.len(),
            "snapshot exported"
        );
        Ok(bytes)
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Merge a snapshot into live state.
    ///
    /// With `tenant_id`, only that tenant is imported and the snapshot must
    /// contain it. Snapshot entries win on key collisions; live keys absent
    /// from the snapshot are kept. The snapshot's tier replaces the live tier.
    pub fn import(&self, bytes: &[u8], tenant_id: Option<&str>) -> CofferResult<ImportReport> {
        let result = self.import_inner(bytes, tenant_id);
        match &result {
            Ok(report) => {
                self.stats.imports.fetch_add(1, Ordering::Relaxed);
                info!(
                    scope = tenant_id.unwrap_or("all"),
                    created = report.tenants_created,
                    merged = report.tenants_merged,
                    entries = report.entries_imported,
                    "snapshot imported"
                );
            }
            Err(err) => {
                self.stats.imports_failed.fetch_add(1, Ordering::Relaxed);
                warn!(scope = tenant_id.unwrap_or("all"), error = %err, "snapshot import failed");
            }
        }
        result
    }

    fn import_inner(&self, bytes: &[u8], tenant_id: Option<&str>) -> CofferResult<ImportReport> {
        let image = decode(bytes)?;
        let selected: Vec<TenantImage> = match tenant_id {
            Some(id) => {
                let tenant = image
                    .tenants
                    .into_iter()
                    .find(|t| t.tenant_id == id)
                    .ok_or_else(|| {
                        CofferError::invalid_request(format!(
                            "snapshot does not contain tenant '{}'",
                            id
                        ))
                    })?;
                vec![tenant]
            }
            None => image.tenants,
        };

        let now = self.store.now();
        let mut plans = Vec::with_capacity(selected.len());
        for tenant in selected {
            plans.push(ImportPlan::new(tenant, now));
        }

        // Validate everything before the first mutation.
        let new_tenants = plans
            .iter()
            .filter(|p| !self.store.contains_tenant(&p.tenant_id))
            .count();
        let max_tenants = self.store.options().max_tenants;
        if self.store.tenant_count() + new_tenants > max_tenants {
            return Err(CofferError::TooManyTenants { max_tenants });
        }
        for plan in &plans {
            if self.store.contains_tenant(&plan.tenant_id) {
                self.store
                    .with_tenant(&plan.tenant_id, |tenant| plan.check_quota(tenant, &self.store, now))
                    .or_else(|err| if err.is_not_found() { Ok(()) } else { Err(err) })?;
            } else {
                plan.check_quota_fresh(&self.store)?;
            }
        }

        let mut report = ImportReport::default();
        for plan in plans {
            let existed = self.store.contains_tenant(&plan.tenant_id);
            let tenant_id = plan.tenant_id.clone();
            let imported = self.store.with_tenant_or_create(&tenant_id, |tenant| {
                plan.check_quota(tenant, &self.store, now)?;
                Ok(plan.apply(tenant, existed, now, self.salt_len))
            })?;
            if existed {
                report.tenants_merged += 1;
            } else {
                report.tenants_created += 1;
            }
            report.entries_imported += imported.0;
            report.entries_skipped_expired += imported.1;
        }
        Ok(report)
    }
}

/// Copy a tenant's live state.
fn capture(tenant: &TenantState, now: Timestamp) -> TenantImage {
    let mut entries: Vec<(String, Entry)> = tenant
        .entries()
        .filter(|(_, entry)| !entry.is_expired_at(now))
        .map(|(key, entry)| (key.clone(), entry.clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let storage_used = entries.iter().map(|(_, e)| e.metered_size()).sum();
    TenantImage {
        tenant_id: tenant.id().to_string(),
        tier: tenant.tier(),
        storage_used,
        created_at: tenant.created_at(),
        public_key: tenant.registration().map(|r| r.public_key),
        entries,
    }
}

/// A decoded tenant ready to merge.
struct ImportPlan {
    tenant_id: String,
    tier: SubscriptionTier,
    created_at: Timestamp,
    public_key: Option<[u8; 32]>,
    /// Live snapshot entries; later duplicates of a key win.
    entries: BTreeMap<String, Entry>,
    skipped_expired: usize,
}

impl ImportPlan {
    fn new(image: TenantImage, now: Timestamp) -> Self {
        let mut entries = BTreeMap::new();
        let mut skipped_expired = 0;
        for (key, entry) in image.entries {
            if entry.is_expired_at(now) {
                skipped_expired += 1;
                continue;
            }
            entries.insert(key, entry);
        }
        Self {
            tenant_id: image.tenant_id,
            tier: image.tier,
            created_at: image.created_at,
            public_key: image.public_key,
            entries,
            skipped_expired,
        }
    }

    fn incoming_bytes(&self) -> u64 {
        self.entries.values().map(Entry::metered_size).sum()
    }

    fn check_quota_fresh(&self, store: &Store) -> CofferResult<()> {
        let limit = store.limit_for(self.tier);
        let incoming = self.incoming_bytes();
        if incoming > limit {
            return Err(CofferError::QuotaExceeded {
                requested: incoming,
                available: limit,
                limit,
            });
        }
        Ok(())
    }

    /// Reject the merge if post-merge blob usage exceeds the resulting tier.
    fn check_quota(&self, tenant: &TenantState, store: &Store, now: Timestamp) -> CofferResult<()> {
        let limit = store.limit_for(self.tier);
        let live: u64 = tenant
            .entries()
            .filter(|(key, entry)| !entry.is_expired_at(now) && !self.entries.contains_key(*key))
            .map(|(_, entry)| entry.metered_size())
            .sum();
        let incoming = self.incoming_bytes();
        if live.saturating_add(incoming) > limit {
            return Err(CofferError::QuotaExceeded {
                requested: incoming,
                available: limit.saturating_sub(live),
                limit,
            });
        }
        Ok(())
    }

    /// Merge into `tenant`. Returns (imported, skipped-expired) counts.
    fn apply(
        self,
        tenant: &mut TenantState,
        existed: bool,
        now: Timestamp,
        salt_len: usize,
    ) -> (usize, usize) {
        tenant.purge_expired(now);
        if !existed {
            tenant.set_created_at(self.created_at);
        }
        tenant.set_tier(self.tier);
        if tenant.registration().is_none() {
            if let Some(public_key) = self.public_key {
                tenant.set_registration(Registration {
                    public_key,
                    salt: Salt::random(salt_len),
                });
            }
        }
        let imported = self.entries.len();
        for (key, entry) in self.entries {
            tenant.insert(key, entry);
        }
        tenant.recompute_usage();
        (imported, self.skipped_expired)
    }
}
