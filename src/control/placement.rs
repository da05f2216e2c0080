//! Tenant host placement.
//!
//! Signup binds each tenant to one of the configured hosts. The choice is
//! `hash64(tenant_id, seed) % host_count`, so it is stable for a given host
//! list and seed and needs no placement table.

use crate::core::config::AuthConfig;
use crate::core::error::{CofferError, CofferResult};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Deterministic tenant-to-host assignment.
#[derive(Debug, Clone)]
pub struct HostPlacement {
    hosts: Vec<String>,
    seed: u64,
}

impl HostPlacement {
    /// Create a placement over `hosts`.
    pub fn new(hosts: Vec<String>, seed: u64) -> CofferResult<Self> {
        if hosts.is_empty() {
            return Err(CofferError::invalid_request(
                "host placement requires at least one host",
            ));
        }
        Ok(Self { hosts, seed })
    }

    /// Placement from the auth configuration.
    pub fn from_config(config: &AuthConfig) -> CofferResult<Self> {
        Self::new(config.hosts.clone(), config.placement_seed)
    }

    /// Configured hosts.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Index of the host a tenant is placed on.
    pub fn host_index(&self, tenant_id: &str) -> usize {
        (compute_placement_hash(tenant_id, self.seed) % self.hosts.len() as u64) as usize
    }

    /// Host a tenant is placed on.
    pub fn host_for(&self, tenant_id: &str) -> &str {
        &self.hosts[self.host_index(tenant_id)]
    }
}

/// Placement hash of a tenant id.
pub fn compute_placement_hash(tenant_id: &str, seed: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(tenant_id.as_bytes());
    hasher.finish()
}
