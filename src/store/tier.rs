//! Subscription tiers and their storage quotas.

use crate::core::error::CofferError;
use serde::{Deserialize, Serialize};

/// Subscription tier of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Basic,
    Premium,
}

impl SubscriptionTier {
    /// Tier name as used in configuration and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }

    /// Snapshot tag byte.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Basic => 0,
            Self::Premium => 1,
        }
    }

    /// Tier for a snapshot tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Basic),
            1 => Some(Self::Premium),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = CofferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            other => Err(CofferError::InvalidTier {
                tier: other.to_string(),
            }),
        }
    }
}

/// Blob storage limit per tier, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaTable {
    basic: u64,
    premium: u64,
}

impl QuotaTable {
    /// Create a quota table.
    pub fn new(basic: u64, premium: u64) -> Self {
        Self { basic, premium }
    }

    /// Limit for a tier.
    pub fn limit_for(&self, tier: SubscriptionTier) -> u64 {
        match tier {
            SubscriptionTier::Basic => self.basic,
            SubscriptionTier::Premium => self.premium,
        }
    }
}

impl Default for QuotaTable {
    fn default() -> Self {
        Self::new(75_000_000, 150_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tiers() {
        assert_eq!("basic".parse::<SubscriptionTier>().unwrap(), SubscriptionTier::Basic);
        assert_eq!(
            "premium".parse::<SubscriptionTier>().unwrap(),
            SubscriptionTier::Premium
        );
        let err = "gold".parse::<SubscriptionTier>().unwrap_err();
        assert!(matches!(err, CofferError::InvalidTier { ref tier } if tier == "gold"));
    }

    #[test]
    fn test_tag_roundtrip() {
        for tier in [SubscriptionTier::Basic, SubscriptionTier::Premium] {
            assert_eq!(SubscriptionTier::from_tag(tier.tag()), Some(tier));
        }
        assert_eq!(SubscriptionTier::from_tag(7), None);
    }

    #[test]
    fn test_default_quotas() {
        let table = QuotaTable::default();
        assert_eq!(table.limit_for(SubscriptionTier::Basic), 75_000_000);
        assert_eq!(table.limit_for(SubscriptionTier::Premium), 150_000_000);
    }
}
