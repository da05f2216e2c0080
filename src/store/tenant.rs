//! Per-tenant state.
//!
//! A [`TenantState`] is always accessed behind its tenant lock. Methods here
//! assume the caller holds it, so read-then-write sequences such as quota
//! check plus charge are atomic with respect to other requests for the same
//! tenant.

use crate::auth::salt::Salt;
use crate::core::error::{CofferError, CofferResult};
use crate::core::time::Timestamp;
use crate::store::entry::Entry;
use crate::store::tier::SubscriptionTier;
use std::collections::HashMap;

/// Length of an ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Registered signing identity of a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Registered ed25519 public key.
    pub public_key: [u8; PUBLIC_KEY_LEN],

    /// Current unconsumed salt.
    pub salt: Salt,
}

/// Result of purging expired entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Entries removed.
    pub entries: usize,
    /// Metered bytes credited back.
    pub bytes: u64,
}

/// State of one tenant namespace.
#[derive(Debug)]
pub struct TenantState {
    id: String,
    tier: SubscriptionTier,
    storage_used: u64,
    created_at: Timestamp,
    entries: HashMap<String, Entry>,
    registration: Option<Registration>,

    /// Set once the tenant is removed from the table; handles still held by
    /// in-flight requests must treat the tenant as gone.
    retired: bool,
}

impl TenantState {
    /// Create an empty tenant.
    pub fn new(id: impl Into<String>, tier: SubscriptionTier, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            tier,
            storage_used: 0,
            created_at,
            entries: HashMap::new(),
            registration: None,
            retired: false,
        }
    }

    /// Tenant id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current subscription tier.
    pub fn tier(&self) -> SubscriptionTier {
        self.tier
    }

    pub(crate) fn set_tier(&mut self, tier: SubscriptionTier) {
        self.tier = tier;
    }

    pub(crate) fn set_created_at(&mut self, created_at: Timestamp) {
        self.created_at = created_at;
    }

    /// Metered bytes currently charged to this tenant.
    pub fn storage_used(&self) -> u64 {
        self.storage_used
    }

    /// Creation instant.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Registered identity, if any.
    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    pub(crate) fn registration_mut(&mut self) -> Option<&mut Registration> {
        self.registration.as_mut()
    }

    pub(crate) fn set_registration(&mut self, registration: Registration) {
        self.registration = Some(registration);
    }

    /// Check if the tenant has been removed from the table.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Mark the tenant removed and drop its entries.
    pub(crate) fn retire(&mut self) {
        self.retired = true;
        self.entries.clear();
        self.storage_used = 0;
        self.registration = None;
    }

    /// Metered size of the entry stored under `key`, expired or not.
    pub fn metered_size_of(&self, key: &str) -> u64 {
        self.entries.get(key).map(Entry::metered_size).unwrap_or(0)
    }

    /// Look up a live entry.
    ///
    /// An expired entry is purged and reported as `KeyExpired`.
    pub fn get_live(&mut self, key: &str, now: Timestamp) -> CofferResult<&Entry> {
        let expired = match self.entries.get(key) {
            None => return Err(CofferError::key_not_found(key)),
            Some(entry) => entry.is_expired_at(now),
        };
        if expired {
            self.remove(key);
            return Err(CofferError::KeyExpired {
                key: key.to_string(),
            });
        }
        self.entries
            .get(key)
            .ok_or_else(|| CofferError::key_not_found(key))
    }

    /// Insert or overwrite an entry, adjusting metered usage.
    ///
    /// Quota checks are the caller's responsibility and must happen before
    /// this call under the same lock.
    pub fn insert(&mut self, key: impl Into<String>, entry: Entry) -> Option<Entry> {
        let added = entry.metered_size();
        let previous = self.entries.insert(key.into(), entry);
        let credited = previous.as_ref().map(Entry::metered_size).unwrap_or(0);
        self.storage_used = self.storage_used.saturating_sub(credited).saturating_add(added);
        previous
    }

    /// Remove an entry, crediting back its metered size.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let removed = self.entries.remove(key)?;
        self.storage_used = self.storage_used.saturating_sub(removed.metered_size());
        Some(removed)
    }

    /// Drop every entry expired at `now`.
    pub fn purge_expired(&mut self, now: Timestamp) -> PurgeOutcome {
        let mut outcome = PurgeOutcome::default();
        self.entries.retain(|_, entry| {
            if entry.is_expired_at(now) {
                outcome.entries += 1;
                outcome.bytes += entry.metered_size();
                false
            } else {
                true
            }
        });
        self.storage_used = self.storage_used.saturating_sub(outcome.bytes);
        outcome
    }

    /// Recompute metered usage from the stored blobs.
    pub fn recompute_usage(&mut self) -> u64 {
        self.storage_used = self.entries.values().map(Entry::metered_size).sum();
        self.storage_used
    }

    /// Sorted keys of live entries. Expired entries are purged first.
    pub fn live_keys(&mut self, now: Timestamp) -> Vec<String> {
        self.purge_expired(now);
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of entries not yet expired at `now`.
    pub fn live_entry_count(&self, now: Timestamp) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    /// Iterate over all stored entries, including not-yet-purged expired ones.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::value::{Blob, TypedValue};

    fn blob(len: usize) -> TypedValue {
        TypedValue::Blob(Blob::new(vec![7u8; len], "application/octet-stream"))
    }

    #[test]
    fn test_overwrite_credits_old_blob() {
        let mut tenant = TenantState::new("t", SubscriptionTier::Basic, Timestamp::zero());
        tenant.insert("k", Entry::new(blob(1000), Timestamp::zero()));
        assert_eq!(tenant.storage_used(), 1000);
        tenant.insert("k", Entry::new(blob(500), Timestamp::zero()));
        assert_eq!(tenant.storage_used(), 500);
        tenant.insert("k", Entry::new(TypedValue::Int(1), Timestamp::zero()));
        assert_eq!(tenant.storage_used(), 0);
    }

    #[test]
    fn test_get_live_purges_expired() {
        let mut tenant = TenantState::new("t", SubscriptionTier::Basic, Timestamp::zero());
        tenant.insert(
            "k",
            Entry::with_ttl(blob(10), Timestamp::zero(), Some(1)),
        );
        assert!(tenant.get_live("k", Timestamp::from_millis(999)).is_ok());

        let err = tenant.get_live("k", Timestamp::from_millis(1000)).unwrap_err();
        assert!(matches!(err, CofferError::KeyExpired { .. }));
        assert_eq!(tenant.storage_used(), 0);

        let err = tenant.get_live("k", Timestamp::from_millis(1000)).unwrap_err();
        assert!(matches!(err, CofferError::KeyNotFound { .. }));
    }

    #[test]
    fn test_live_keys_sorted_and_purged() {
        let mut tenant = TenantState::new("t", SubscriptionTier::Basic, Timestamp::zero());
        tenant.insert("b", Entry::new(TypedValue::Int(1), Timestamp::zero()));
        tenant.insert("a", Entry::new(TypedValue::Int(2), Timestamp::zero()));
        tenant.insert(
            "c",
            Entry::with_ttl(TypedValue::Int(3), Timestamp::zero(), Some(1)),
        );
        assert_eq!(tenant.live_entry_count(Timestamp::from_millis(5_000)), 2);
        assert_eq!(tenant.live_keys(Timestamp::from_millis(5_000)), vec!["a", "b"]);
        assert_eq!(tenant.entries().count(), 2);
    }
}
