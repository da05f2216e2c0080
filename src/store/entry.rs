//! Stored entries.

use crate::core::time::Timestamp;
use crate::store::value::{TypedValue, ValueType};

/// One stored item within a tenant namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The value.
    pub value: TypedValue,

    /// When the entry was created or last overwritten.
    pub created_at: Timestamp,

    /// Absolute expiry instant (if TTL set).
    pub expires_at: Option<Timestamp>,
}

bitflags::bitflags! {
    /// Per-entry flags written into snapshots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u8 {
        /// Entry carries an absolute expiry instant.
        const HAS_EXPIRY = 0b0000_0001;
    }
}

impl Entry {
    /// Create an entry with no expiry.
    pub fn new(value: TypedValue, created_at: Timestamp) -> Self {
        Self {
            value,
            created_at,
            expires_at: None,
        }
    }

    /// Create an entry expiring `ttl_secs` after `created_at`.
    ///
    /// A TTL of zero means no expiry.
    pub fn with_ttl(value: TypedValue, created_at: Timestamp, ttl_secs: Option<u64>) -> Self {
        let expires_at = match ttl_secs {
            Some(secs) if secs > 0 => Some(created_at.add_secs(secs)),
            _ => None,
        };
        Self {
            value,
            created_at,
            expires_at,
        }
    }

    /// Type tag of the stored value.
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Bytes this entry contributes to the tenant's usage.
    pub fn metered_size(&self) -> u64 {
        self.value.metered_size()
    }

    /// Check if this entry has expired at the given instant.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at
            .is_some_and(|deadline| now.is_at_or_after(deadline))
    }

    /// Snapshot flags for this entry.
    pub fn flags(&self) -> EntryFlags {
        let mut flags = EntryFlags::empty();
        if self.expires_at.is_some() {
            flags |= EntryFlags::HAS_EXPIRY;
        }
        flags
    }
}
